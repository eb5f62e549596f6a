//! # zoneinfo-engine
//!
//! TZif time zone engine: decodes compiled zone files, builds the transition
//! table, and answers UTC offset / DST / abbreviation queries for any instant,
//! including instants past the end of the table via the POSIX TZ rule in the
//! file footer.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use zoneinfo_engine::{Fold, LocalDateTime, TzInfo};
//!
//! let zone = zoneinfo_engine::zone("America/New_York")?;
//!
//! // Wall clock -> offset (the second 01:30 on 2024-11-03 is EST)
//! let dt = NaiveDate::from_ymd_opt(2024, 11, 3).unwrap().and_hms_opt(1, 30, 0).unwrap();
//! let second = LocalDateTime::new(dt, Fold::Later);
//! assert_eq!(zone.tzname(Some(&second)), Some("EST"));
//!
//! // UTC -> wall clock, with the fold bit
//! let utc = NaiveDate::from_ymd_opt(2024, 11, 3).unwrap().and_hms_opt(6, 30, 0).unwrap();
//! let local = zone.from_utc(utc).unwrap();
//! assert_eq!(local.fold, Fold::Later);
//! # Ok::<(), zoneinfo_engine::ZoneInfoError>(())
//! ```
//!
//! ## Modules
//!
//! - [`decoder`] — TZif bytes → raw transition arrays
//! - [`dst`] — DST delta inference for each local time type
//! - [`projection`] — transition instants projected into local time
//! - [`rule`] — POSIX TZ rule parsing and evaluation
//! - [`zone`] — `ZoneInfo`, the assembled resolver, and the `TzInfo` trait
//! - [`cache`] — shared per-key instance cache
//! - [`tzpath`] — zone key → TZif bytes (search path, in-memory data)
//! - [`config`] — cache and search path configuration
//! - [`error`] — error types

pub mod cache;
pub mod config;
pub mod decoder;
pub mod dst;
pub mod error;
pub mod projection;
pub mod rule;
pub mod types;
pub mod tzpath;
pub mod zone;

pub use cache::ZoneCache;
pub use config::EngineConfig;
pub use decoder::{decode, RawZone};
pub use error::{Result, ZoneInfoError};
pub use rule::{parse_tz_str, Fallback, PosixRule};
pub use types::{Fold, LocalDateTime, OffsetRecord};
pub use tzpath::{ChainSource, MemorySource, TzPath, ZoneSource};
pub use zone::{TzInfo, ZoneInfo};

use std::collections::BTreeSet;
use std::sync::Arc;

/// The shared instance for `key` from the process-wide cache.
pub fn zone(key: &str) -> Result<Arc<ZoneInfo>> {
    cache::global().get(key)
}

/// Every zone key the process-wide cache's source can load.
pub fn available_keys() -> BTreeSet<String> {
    cache::global().source().available_keys()
}
