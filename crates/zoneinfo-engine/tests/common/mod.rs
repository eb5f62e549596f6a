//! Shared helpers for the zoneinfo-engine integration tests.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use std::path::PathBuf;
use zoneinfo_engine::ZoneInfo;

/// Directory laid out like `/usr/share/zoneinfo`, holding the compiled fixtures.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/zoneinfo"))
}

/// Raw bytes of a compiled fixture such as `"America/New_York"`.
pub fn fixture(key: &str) -> Vec<u8> {
    let path = fixtures_dir().join(key);
    std::fs::read(&path).unwrap_or_else(|e| panic!("fixture {} must exist: {}", path.display(), e))
}

pub fn fixture_zone(key: &str) -> ZoneInfo {
    ZoneInfo::from_bytes(&fixture(key), Some(key)).expect("fixture should decode")
}

/// Every compiled fixture key.
pub const FIXTURE_KEYS: &[&str] = &[
    "America/New_York",
    "Europe/Dublin",
    "Australia/Sydney",
    "Asia/Tokyo",
    "Etc/UTC",
];

pub fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, mi, s))
        .expect("valid test datetime")
}

/// Seconds since the epoch of a wall-clock reading taken as UTC.
pub fn ts(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
    dt(y, m, d, h, mi, s).and_utc().timestamp()
}

/// Builds synthetic TZif files.
///
/// Version 2+ output carries a v1 block followed by the v2 block and footer.
/// By default the v1 block holds the same data; `build_with_legacy` lets a
/// test put something different there to prove it is skipped.
#[derive(Debug, Clone)]
pub struct TzifBuilder {
    version: u8,
    transitions: Vec<(i64, u8)>,
    types: Vec<(i32, bool, u8)>,
    chars: Vec<u8>,
    leapcnt: u32,
    isstdcnt: u32,
    isutcnt: u32,
    footer: String,
}

impl TzifBuilder {
    pub fn new(version: u8) -> Self {
        Self {
            version,
            transitions: Vec::new(),
            types: Vec::new(),
            chars: Vec::new(),
            leapcnt: 0,
            isstdcnt: 0,
            isutcnt: 0,
            footer: String::new(),
        }
    }

    /// Add a local time type; identical abbreviations share blob storage.
    pub fn record(mut self, utc_offset: i32, is_dst: bool, abbreviation: &str) -> Self {
        let index = self.abbreviation_index(abbreviation);
        self.types.push((utc_offset, is_dst, index));
        self
    }

    /// Add a local time type pointing at an arbitrary byte of the blob.
    pub fn record_at(mut self, utc_offset: i32, is_dst: bool, abbr_index: u8) -> Self {
        self.types.push((utc_offset, is_dst, abbr_index));
        self
    }

    /// Replace the abbreviation blob wholesale.
    pub fn chars(mut self, blob: &[u8]) -> Self {
        self.chars = blob.to_vec();
        self
    }

    pub fn transition(mut self, at: i64, type_index: u8) -> Self {
        self.transitions.push((at, type_index));
        self
    }

    pub fn footer(mut self, tz_str: &str) -> Self {
        self.footer = tz_str.to_string();
        self
    }

    /// Declare (zero-filled) leap second and indicator tables.
    pub fn metadata(mut self, leapcnt: u32, isstdcnt: u32, isutcnt: u32) -> Self {
        self.leapcnt = leapcnt;
        self.isstdcnt = isstdcnt;
        self.isutcnt = isutcnt;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with_legacy(self)
    }

    pub fn build_with_legacy(&self, legacy: &TzifBuilder) -> Vec<u8> {
        if self.version < 2 {
            return self.block(4);
        }
        let mut out = legacy.block_with_version(4, self.version);
        out.extend(self.block(8));
        out.push(b'\n');
        out.extend(self.footer.as_bytes());
        out.push(b'\n');
        out
    }

    fn abbreviation_index(&mut self, abbreviation: &str) -> u8 {
        let needle: Vec<u8> = abbreviation.bytes().chain(std::iter::once(0)).collect();
        if let Some(pos) = self
            .chars
            .windows(needle.len())
            .position(|w| w == needle.as_slice())
        {
            return pos as u8;
        }
        let pos = self.chars.len();
        self.chars.extend(needle);
        pos as u8
    }

    fn block(&self, time_size: usize) -> Vec<u8> {
        self.block_with_version(time_size, self.version)
    }

    fn block_with_version(&self, time_size: usize, version: u8) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(b"TZif");
        out.push(if version == 1 { 0 } else { b'0' + version });
        out.extend([0u8; 15]);
        for count in [
            self.isutcnt,
            self.isstdcnt,
            self.leapcnt,
            self.transitions.len() as u32,
            self.types.len() as u32,
            self.chars.len() as u32,
        ] {
            out.extend(count.to_be_bytes());
        }

        for &(at, _) in &self.transitions {
            if time_size == 4 {
                out.extend((at as i32).to_be_bytes());
            } else {
                out.extend(at.to_be_bytes());
            }
        }
        out.extend(self.transitions.iter().map(|&(_, idx)| idx));
        for &(offset, is_dst, abbr) in &self.types {
            out.extend(offset.to_be_bytes());
            out.push(is_dst as u8);
            out.push(abbr);
        }
        out.extend(&self.chars);
        out.extend(vec![0u8; self.leapcnt as usize * (time_size + 4)]);
        out.extend(vec![0u8; self.isstdcnt as usize]);
        out.extend(vec![0u8; self.isutcnt as usize]);
        out
    }
}

/// A single-record EST zone with no transitions and no footer (version 1).
pub fn static_est() -> Vec<u8> {
    TzifBuilder::new(1).record(-18000, false, "EST").build()
}

/// A small version 2 zone with EST/EDT transitions in 2020 and a US footer rule.
pub fn synthetic_new_york() -> TzifBuilder {
    TzifBuilder::new(2)
        .record(-17762, false, "LMT")
        .record(-14400, true, "EDT")
        .record(-18000, false, "EST")
        .transition(-2717650800, 2)
        .transition(ts(2020, 3, 8, 7, 0, 0), 1)
        .transition(ts(2020, 11, 1, 6, 0, 0), 2)
        .footer("EST5EDT,M3.2.0,M11.1.0")
}
