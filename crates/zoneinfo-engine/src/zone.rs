//! `ZoneInfo` -- the assembled transition engine for one zone.
//!
//! A `ZoneInfo` is built once from decoded TZif data and is immutable
//! afterwards; every query is a pure function over its tables, so a single
//! instance can be shared across threads behind an `Arc` without locking.
//!
//! # Resolution
//!
//! - **Local → record** ([`ZoneInfo::find_trans`]): binary search over the
//!   local projection selected by the fold bit. Before the first transition
//!   the "before" record applies; after the last one the [`Fallback`] does.
//! - **UTC → local** ([`ZoneInfo::from_utc_timestamp`]): binary search over the
//!   raw UTC transitions. The fold bit is set when the wall time produced is
//!   the second occurrence of a repeated local time, i.e. when the transition
//!   moved clocks back by more than the time elapsed since it.

use crate::decoder::{self, RawZone};
use crate::dst::infer_dst_offsets;
use crate::error::{Result, ZoneInfoError};
use crate::projection::project_local;
use crate::rule::{parse_tz_str, year_of_timestamp, Fallback};
use crate::tzpath::ZoneSource;
use crate::types::{Fold, LocalDateTime, OffsetRecord};
use chrono::{Datelike, Duration, NaiveDateTime};
use std::fmt;
use std::io::Read;

/// The interface a calendar/datetime layer needs from a time zone.
///
/// Every query accepts `None` to mean "no particular datetime": zones with a
/// single fixed offset answer with that offset, all others answer `None`.
pub trait TzInfo {
    /// Offset from UTC of the given wall-clock time.
    fn utc_offset(&self, dt: Option<&LocalDateTime>) -> Option<Duration>;

    /// Daylight saving component of [`TzInfo::utc_offset`].
    fn dst(&self, dt: Option<&LocalDateTime>) -> Option<Duration>;

    /// Abbreviation in effect at the given wall-clock time.
    fn tzname(&self, dt: Option<&LocalDateTime>) -> Option<&str>;

    /// Convert a UTC datetime to wall-clock time, with the fold bit set on the
    /// second occurrence of a repeated time. `None` if the result is not
    /// representable.
    fn from_utc(&self, utc: NaiveDateTime) -> Option<LocalDateTime>;
}

/// Transition tables and fallback rule for a single time zone.
#[derive(Debug, Clone)]
pub struct ZoneInfo {
    key: Option<String>,
    version: u8,
    trans_utc: Vec<i64>,
    /// Local projections of `trans_utc`, indexed by [`Fold::index`].
    trans_local: [Vec<i64>; 2],
    /// Record index for each transition.
    trans_idx: Vec<usize>,
    records: Vec<OffsetRecord>,
    /// Record used before the first transition. Only meaningful when
    /// `trans_utc` is non-empty.
    before: usize,
    fallback: Fallback,
    fixed_offset: bool,
}

impl ZoneInfo {
    /// Build the engine from decoded TZif data.
    ///
    /// # Errors
    /// Returns `ZoneInfoError::InvalidRule` if the footer TZ string is invalid
    /// and `ZoneInfoError::Format` if the data contains no records at all.
    pub fn from_raw(raw: RawZone, key: Option<&str>) -> Result<Self> {
        let dst_offsets = infer_dst_offsets(&raw.trans_idx, &raw.records);
        let trans_local = project_local(&raw.trans_utc, &raw.trans_idx, &raw.records);

        let records: Vec<OffsetRecord> = raw
            .records
            .iter()
            .zip(&dst_offsets)
            .map(|(r, &dst)| OffsetRecord::new(r.utc_offset, dst, r.abbreviation.as_str()))
            .collect();

        // First standard record in file order; otherwise whatever the first
        // transition switches to.
        let before = raw
            .records
            .iter()
            .position(|r| !r.is_dst)
            .or_else(|| raw.trans_idx.first().copied())
            .unwrap_or(0);

        let fallback = match raw.tz_str.as_deref() {
            Some(tz_str) => parse_tz_str(tz_str)?,
            // Without a rule the last transition's record stays in force. With no
            // transitions at all, local time type 0 applies everywhere.
            None => {
                let idx = raw
                    .trans_idx
                    .last()
                    .copied()
                    .or_else(|| (!records.is_empty()).then_some(0))
                    .ok_or_else(|| {
                        ZoneInfoError::Format("no time zone information found".to_string())
                    })?;
                Fallback::Fixed(records[idx].clone())
            }
        };

        let fixed_offset = match &fallback {
            Fallback::Rule(_) => false,
            Fallback::Fixed(_) if records.len() > 1 => false,
            Fallback::Fixed(fixed) => records.first().map_or(true, |only| only == fixed),
        };

        tracing::debug!(
            key = key.unwrap_or("<none>"),
            transitions = raw.trans_utc.len(),
            fixed_offset,
            "built zone"
        );

        Ok(Self {
            key: key.map(str::to_string),
            version: raw.header.version,
            trans_utc: raw.trans_utc,
            trans_local,
            trans_idx: raw.trans_idx,
            records,
            before,
            fallback,
            fixed_offset,
        })
    }

    /// Decode and build from any TZif byte stream.
    pub fn from_reader<R: Read>(reader: R, key: Option<&str>) -> Result<Self> {
        Self::from_raw(decoder::decode(reader)?, key)
    }

    pub fn from_bytes(bytes: &[u8], key: Option<&str>) -> Result<Self> {
        Self::from_raw(decoder::decode_bytes(bytes)?, key)
    }

    /// Resolve `key` through `source` and build a fresh, uncached instance.
    pub fn load(key: &str, source: &dyn ZoneSource) -> Result<Self> {
        let bytes = source.load(key)?;
        Self::from_bytes(&bytes, Some(key))
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// TZif version of the decoded data.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// True when one record applies at every instant.
    pub fn is_fixed_offset(&self) -> bool {
        self.fixed_offset
    }

    pub fn records(&self) -> &[OffsetRecord] {
        &self.records
    }

    pub fn utc_transitions(&self) -> &[i64] {
        &self.trans_utc
    }

    pub fn local_transitions(&self, fold: Fold) -> &[i64] {
        &self.trans_local[fold.index()]
    }

    /// Each explicit transition as `(UTC instant, record switched to)`.
    pub fn transitions(&self) -> impl Iterator<Item = (i64, &OffsetRecord)> + '_ {
        self.trans_utc
            .iter()
            .zip(&self.trans_idx)
            .map(move |(&ts, &idx)| (ts, &self.records[idx]))
    }

    pub fn fallback(&self) -> &Fallback {
        &self.fallback
    }

    /// Record in effect before the first explicit transition.
    pub fn before_record(&self) -> Option<&OffsetRecord> {
        if self.trans_utc.is_empty() {
            None
        } else {
            self.records.get(self.before)
        }
    }

    /// Record for a wall-clock timestamp (local seconds since the epoch) in `year`.
    pub fn find_trans(&self, ts: i64, year: i64, fold: Fold) -> &OffsetRecord {
        let local = &self.trans_local[fold.index()];
        let (Some(&first), Some(&last)) = (local.first(), local.last()) else {
            return self.fallback_local(ts, year, fold);
        };

        if ts < first {
            return &self.records[self.before];
        }
        if ts > last {
            return self.fallback_local(ts, year, fold);
        }

        // bisect_right: index of the first transition strictly after ts.
        let idx = local.partition_point(|&t| t <= ts);
        &self.records[self.trans_idx[idx - 1]]
    }

    /// Record for a wall-clock timestamp, deriving the calendar year from it.
    pub fn find_trans_at(&self, ts: i64, fold: Fold) -> &OffsetRecord {
        self.find_trans(ts, year_of_timestamp(ts), fold)
    }

    /// Record and fold bit for a UTC timestamp in `year`.
    pub fn from_utc_timestamp(&self, ts: i64, year: i64) -> (&OffsetRecord, Fold) {
        let (first, last) = match (self.trans_utc.first(), self.trans_utc.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return self.fallback_utc(ts, year),
        };

        if ts < first {
            return (&self.records[self.before], Fold::Earlier);
        }
        if ts > last {
            if let Fallback::Rule(rule) = &self.fallback {
                tracing::trace!(ts, year, "UTC time beyond table, using TZ rule");
                return rule.get_trans_info_fromutc(ts, year);
            }
        }

        // A fixed fallback still needs the fold check against the last
        // transition, which may have turned the clocks back.
        let idx = self.trans_utc.partition_point(|&t| t <= ts);
        let (prev, cur) = match &self.fallback {
            _ if idx >= 2 => (
                &self.records[self.trans_idx[idx - 2]],
                &self.records[self.trans_idx[idx - 1]],
            ),
            Fallback::Fixed(after) if ts > last => (&self.records[self.trans_idx[0]], after),
            _ => (&self.records[self.before], &self.records[self.trans_idx[0]]),
        };

        let shift = prev.utc_offset_seconds() - cur.utc_offset_seconds();
        let fold = Fold::from(shift > ts - self.trans_utc[idx - 1]);
        (cur, fold)
    }

    /// Record and fold bit for a UTC timestamp, deriving the calendar year from it.
    pub fn from_utc_timestamp_at(&self, ts: i64) -> (&OffsetRecord, Fold) {
        self.from_utc_timestamp(ts, year_of_timestamp(ts))
    }

    /// The record to use for an optional wall-clock time.
    pub fn find_record(&self, dt: Option<&LocalDateTime>) -> Option<&OffsetRecord> {
        match dt {
            Some(dt) => Some(self.find_trans(
                dt.local_timestamp(),
                dt.datetime.year() as i64,
                dt.fold,
            )),
            None if self.fixed_offset => match &self.fallback {
                Fallback::Fixed(record) => Some(record),
                Fallback::Rule(_) => None,
            },
            None => None,
        }
    }

    /// Convert a wall-clock time back to UTC using the record its fold selects.
    pub fn to_utc(&self, local: &LocalDateTime) -> Option<NaiveDateTime> {
        let record = self.find_record(Some(local))?;
        local.datetime.checked_sub_signed(record.utc_offset())
    }

    fn fallback_local(&self, ts: i64, year: i64, fold: Fold) -> &OffsetRecord {
        match &self.fallback {
            Fallback::Fixed(record) => record,
            Fallback::Rule(rule) => {
                tracing::trace!(ts, year, "local time beyond table, using TZ rule");
                rule.get_trans_info(ts, year, fold)
            }
        }
    }

    fn fallback_utc(&self, ts: i64, year: i64) -> (&OffsetRecord, Fold) {
        match &self.fallback {
            Fallback::Fixed(record) => (record, Fold::Earlier),
            Fallback::Rule(rule) => rule.get_trans_info_fromutc(ts, year),
        }
    }
}

impl TzInfo for ZoneInfo {
    fn utc_offset(&self, dt: Option<&LocalDateTime>) -> Option<Duration> {
        self.find_record(dt).map(OffsetRecord::utc_offset)
    }

    fn dst(&self, dt: Option<&LocalDateTime>) -> Option<Duration> {
        self.find_record(dt).map(OffsetRecord::dst)
    }

    fn tzname(&self, dt: Option<&LocalDateTime>) -> Option<&str> {
        self.find_record(dt).map(OffsetRecord::abbreviation)
    }

    fn from_utc(&self, utc: NaiveDateTime) -> Option<LocalDateTime> {
        let ts = utc.and_utc().timestamp();
        let (record, fold) = self.from_utc_timestamp(ts, utc.year() as i64);
        let local = utc.checked_add_signed(record.utc_offset())?;
        Some(LocalDateTime::new(local, fold))
    }
}

impl fmt::Display for ZoneInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => f.write_str(key),
            None => f.write_str("<unnamed zone>"),
        }
    }
}
