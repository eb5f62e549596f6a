//! Value types shared by the decoder, the rule interpreter and the resolver.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

/// An immutable `{UTC offset, DST delta, abbreviation}` record.
///
/// One record exists per local time type in the file (or per half of a POSIX
/// rule). Transitions refer to records by index, so a record is shared by every
/// transition that switches to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OffsetRecord {
    utc_offset: i64,
    dst: i64,
    abbreviation: String,
}

impl OffsetRecord {
    /// Build a record from offsets in seconds east of UTC.
    pub fn new(utc_offset: i64, dst: i64, abbreviation: impl Into<String>) -> Self {
        Self {
            utc_offset,
            dst,
            abbreviation: abbreviation.into(),
        }
    }

    pub fn utc_offset(&self) -> Duration {
        Duration::seconds(self.utc_offset)
    }

    pub fn utc_offset_seconds(&self) -> i64 {
        self.utc_offset
    }

    /// The part of the UTC offset attributable to daylight saving (zero for standard time).
    pub fn dst(&self) -> Duration {
        Duration::seconds(self.dst)
    }

    pub fn dst_seconds(&self) -> i64 {
        self.dst
    }

    pub fn is_dst(&self) -> bool {
        self.dst != 0
    }

    pub fn abbreviation(&self) -> &str {
        &self.abbreviation
    }
}

/// Disambiguates a wall-clock time that occurs twice (a fold) or not at all (a gap).
///
/// `Earlier` selects the offset in effect before the transition, `Later` the
/// one in effect after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Fold {
    #[default]
    Earlier,
    Later,
}

impl Fold {
    /// 0 for `Earlier`, 1 for `Later`.
    pub fn index(self) -> usize {
        match self {
            Fold::Earlier => 0,
            Fold::Later => 1,
        }
    }

    pub fn is_later(self) -> bool {
        self == Fold::Later
    }
}

impl From<bool> for Fold {
    fn from(later: bool) -> Self {
        if later {
            Fold::Later
        } else {
            Fold::Earlier
        }
    }
}

/// A naive wall-clock datetime plus the fold bit needed to make it unambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalDateTime {
    pub datetime: NaiveDateTime,
    pub fold: Fold,
}

impl LocalDateTime {
    pub fn new(datetime: NaiveDateTime, fold: Fold) -> Self {
        Self { datetime, fold }
    }

    /// The wall-clock reading as if it were UTC, in seconds since the epoch.
    pub fn local_timestamp(&self) -> i64 {
        self.datetime.and_utc().timestamp()
    }
}

impl From<NaiveDateTime> for LocalDateTime {
    fn from(datetime: NaiveDateTime) -> Self {
        Self::new(datetime, Fold::Earlier)
    }
}
