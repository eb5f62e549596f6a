//! TZif decoder — converts a compiled zone file into raw transition arrays.
//!
//! The decoder reads the RFC 8536 layout:
//!
//! - 44-byte header: `TZif`, a version byte, 15 reserved bytes and six
//!   big-endian `u32` counts
//! - transition times, type indices, local time type records, abbreviation blob
//! - leap second / standard-wall / UT-local indicator tables (skipped)
//! - for version 2 and later, a footer `\n<POSIX TZ string>\n`
//!
//! # Key design decisions
//!
//! - **Version 1 block is skipped, not parsed**: a v2+ file carries a complete
//!   32-bit copy of the data ahead of the 64-bit one. Its size is computed from
//!   the first header and the bytes are discarded unread.
//! - **Lazy abbreviation lookup**: records point at a byte offset in the
//!   abbreviation blob and strings may share suffixes (`"EST"` can be read from
//!   the middle of `"AEST\0"`), so each abbreviation is cut at the next NUL
//!   starting from its own index.
//! - **Bounded reads**: every section is read through `take` so that a corrupt
//!   count cannot force a huge up-front allocation.

use crate::error::{Result, ZoneInfoError};
use std::io::{self, BufRead, BufReader, Read};

/// The four bytes every TZif stream starts with.
pub const MAGIC: &[u8; 4] = b"TZif";

/// Parsed 44-byte TZif header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub isutcnt: u32,
    pub isstdcnt: u32,
    pub leapcnt: u32,
    pub timecnt: u32,
    pub typecnt: u32,
    pub charcnt: u32,
}

impl Header {
    /// Byte length of the body that follows this header when transition
    /// times are `time_size` bytes wide. Leap records are `time_size + 4`.
    fn body_len(&self, time_size: u64) -> u64 {
        self.timecnt as u64 * (time_size + 1)
            + self.typecnt as u64 * 6
            + self.charcnt as u64
            + self.leapcnt as u64 * (time_size + 4)
            + self.isstdcnt as u64
            + self.isutcnt as u64
    }
}

/// A local time type record as stored in the file, with its abbreviation resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Seconds east of UTC.
    pub utc_offset: i64,
    pub is_dst: bool,
    pub abbreviation: String,
}

/// Everything the decoder extracts from a TZif stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawZone {
    /// Header of the block that was actually decoded (the v2 block for v2+ files).
    pub header: Header,
    /// Transition instants in seconds since the epoch, in file order.
    pub trans_utc: Vec<i64>,
    /// For each transition, the index of the record that applies from it onwards.
    pub trans_idx: Vec<usize>,
    pub records: Vec<RawRecord>,
    /// Footer rule string, present only for version 2+ files with a non-empty footer.
    pub tz_str: Option<String>,
}

impl RawZone {
    pub fn version(&self) -> u8 {
        self.header.version
    }
}

/// Decode a TZif stream.
///
/// # Errors
/// Returns `ZoneInfoError::InvalidMagic` if the stream is not TZif at all,
/// `ZoneInfoError::UnexpectedEof` if it is truncated, and
/// `ZoneInfoError::Format` for structurally invalid content.
pub fn decode<R: Read>(reader: R) -> Result<RawZone> {
    let mut reader = BufReader::new(reader);

    let mut header = read_header(&mut reader)?;
    let time_size = if header.version < 2 {
        4
    } else {
        skip(&mut reader, header.body_len(4))?;
        let second = read_header(&mut reader)?;
        header = Header {
            version: header.version,
            ..second
        };
        8
    };

    let timecnt = header.timecnt as usize;
    let typecnt = header.typecnt as usize;

    let times = read_bytes(&mut reader, timecnt as u64 * time_size)?;
    let trans_utc: Vec<i64> = if time_size == 4 {
        times
            .chunks_exact(4)
            .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]) as i64)
            .collect()
    } else {
        times
            .chunks_exact(8)
            .map(|c| i64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect()
    };

    let trans_idx: Vec<usize> = read_bytes(&mut reader, timecnt as u64)?
        .into_iter()
        .map(usize::from)
        .collect();
    if let Some(&bad) = trans_idx.iter().find(|&&idx| idx >= typecnt) {
        return Err(ZoneInfoError::Format(format!(
            "transition type index {} out of range (typecnt = {})",
            bad, typecnt
        )));
    }

    let raw_types = read_bytes(&mut reader, typecnt as u64 * 6)?;
    let abbr_blob = read_bytes(&mut reader, header.charcnt as u64)?;

    let mut records = Vec::with_capacity(typecnt);
    for chunk in raw_types.chunks_exact(6) {
        let utc_offset = i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as i64;
        records.push(RawRecord {
            utc_offset,
            is_dst: chunk[4] != 0,
            abbreviation: abbreviation_at(&abbr_blob, chunk[5] as usize)?,
        });
    }

    let tz_str = if header.version >= 2 {
        skip(
            &mut reader,
            header.isutcnt as u64 + header.isstdcnt as u64 + header.leapcnt as u64 * 12,
        )?;
        read_footer(&mut reader)?
    } else {
        None
    };

    tracing::debug!(
        version = header.version,
        transitions = trans_utc.len(),
        records = records.len(),
        footer = tz_str.as_deref().unwrap_or(""),
        "decoded TZif data"
    );

    Ok(RawZone {
        header,
        trans_utc,
        trans_idx,
        records,
        tz_str,
    })
}

/// Decode a TZif file held in memory.
pub fn decode_bytes(bytes: &[u8]) -> Result<RawZone> {
    decode(bytes)
}

/// Cheap probe: does the stream start with the TZif magic marker?
///
/// Used when enumerating search paths to tell zone files apart from the
/// other data files (`zone.tab`, `leapseconds`, ...) that live next to them.
pub fn is_tzif<R: Read>(mut reader: R) -> bool {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).is_ok() && &magic == MAGIC
}

fn read_header<R: Read>(reader: &mut R) -> Result<Header> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(|err| {
        // Too short to even hold the marker: that's not a TZif file.
        if err.kind() == io::ErrorKind::UnexpectedEof {
            ZoneInfoError::InvalidMagic
        } else {
            ZoneInfoError::from(err)
        }
    })?;
    if &magic != MAGIC {
        return Err(ZoneInfoError::InvalidMagic);
    }

    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    let version = match version[0] {
        0 => 1,
        b if b.is_ascii_digit() => b - b'0',
        other => {
            return Err(ZoneInfoError::Format(format!(
                "unsupported version byte 0x{:02x}",
                other
            )))
        }
    };

    let mut rest = [0u8; 15 + 24];
    reader.read_exact(&mut rest)?;
    let count = |i: usize| {
        let at = 15 + i * 4;
        u32::from_be_bytes([rest[at], rest[at + 1], rest[at + 2], rest[at + 3]])
    };

    Ok(Header {
        version,
        isutcnt: count(0),
        isstdcnt: count(1),
        leapcnt: count(2),
        timecnt: count(3),
        typecnt: count(4),
        charcnt: count(5),
    })
}

/// Read exactly `len` bytes without trusting `len` for the allocation size.
fn read_bytes<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.take(len).read_to_end(&mut buf)?;
    if (buf.len() as u64) < len {
        return Err(ZoneInfoError::UnexpectedEof);
    }
    Ok(buf)
}

fn skip<R: Read>(reader: &mut R, len: u64) -> Result<()> {
    let copied = io::copy(&mut reader.take(len), &mut io::sink())?;
    if copied < len {
        return Err(ZoneInfoError::UnexpectedEof);
    }
    Ok(())
}

fn abbreviation_at(blob: &[u8], index: usize) -> Result<String> {
    let tail = blob.get(index..).ok_or_else(|| {
        ZoneInfoError::Format(format!(
            "abbreviation index {} out of range (charcnt = {})",
            index,
            blob.len()
        ))
    })?;
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
}

/// Read the `\n<rule>\n` footer. An empty rule line means "no rule".
fn read_footer<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut newline = [0u8; 1];
    reader.read_exact(&mut newline)?;
    if newline[0] != b'\n' {
        return Err(ZoneInfoError::Format(
            "footer does not start with a newline".to_string(),
        ));
    }

    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    if line.pop() != Some(b'\n') {
        return Err(ZoneInfoError::UnexpectedEof);
    }
    if line.is_empty() {
        return Ok(None);
    }

    String::from_utf8(line)
        .map(Some)
        .map_err(|_| ZoneInfoError::Format("footer is not valid UTF-8".to_string()))
}
