//! `zoneinfo` CLI — inspect TZif zone files and resolve instants from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Summarize a zone from the search path
//! zoneinfo inspect America/New_York
//!
//! # Summarize a compiled file directly
//! zoneinfo inspect --file /usr/share/zoneinfo/Europe/Dublin
//!
//! # Offset of a wall-clock time (second occurrence of a repeated time)
//! zoneinfo offset America/New_York 2024-11-03T01:30:00 --fold
//!
//! # Wall-clock time of a UTC instant
//! zoneinfo from-utc Australia/Sydney 2080-04-06T16:30:00Z
//!
//! # List every zone key under a custom search path, as JSON
//! zoneinfo --tzpath /opt/tzdata --json keys
//! ```

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use zoneinfo_engine::decoder;
use zoneinfo_engine::rule::Fallback;
use zoneinfo_engine::{
    EngineConfig, Fold, LocalDateTime, OffsetRecord, TzInfo, ZoneCache, ZoneInfo, ZoneSource,
};

/// Accepted spellings of a datetime argument, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Parser)]
#[command(
    name = "zoneinfo",
    version,
    about = "Inspect TZif zone files and resolve instants"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Colon-separated zoneinfo directories (overrides config and environment)
    #[arg(long, global = true)]
    tzpath: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a zone: header, records, recent transitions and footer rule
    Inspect {
        /// Zone key, e.g. America/New_York
        #[arg(required_unless_present = "file")]
        key: Option<String>,
        /// Read a compiled TZif file instead of looking up a key
        #[arg(long, conflicts_with = "key")]
        file: Option<PathBuf>,
        /// Number of trailing transitions to show
        #[arg(long, default_value_t = 5)]
        transitions: usize,
    },
    /// UTC offset, DST and abbreviation of a wall-clock time
    Offset {
        /// Zone key
        key: String,
        /// Local datetime, e.g. 2024-11-03T01:30:00
        datetime: String,
        /// Select the second occurrence of a repeated (or the later side of a skipped) time
        #[arg(long)]
        fold: bool,
    },
    /// Wall-clock time of a UTC instant
    FromUtc {
        /// Zone key
        key: String,
        /// UTC datetime (trailing `Z` optional) or seconds since the epoch
        datetime: String,
    },
    /// List every available zone key
    Keys,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cache = build_cache(&cli)?;

    match &cli.command {
        Commands::Inspect {
            key,
            file,
            transitions,
        } => {
            let (bytes, key) = match (file, key) {
                (Some(path), _) => (
                    std::fs::read(path)
                        .with_context(|| format!("Failed to read file: {}", path.display()))?,
                    None,
                ),
                (None, Some(key)) => (
                    cache
                        .source()
                        .load(key)
                        .with_context(|| format!("Failed to load zone '{}'", key))?,
                    Some(key.as_str()),
                ),
                (None, None) => bail!("Either a zone key or --file is required"),
            };
            let report = inspect(&bytes, key, *transitions)?;
            emit(cli.json, &report, render_inspect)?;
        }
        Commands::Offset {
            key,
            datetime,
            fold,
        } => {
            let zone = load_zone(&cache, key)?;
            let local = LocalDateTime::new(parse_datetime(datetime)?, Fold::from(*fold));
            let report = offset(&zone, &local)?;
            emit(cli.json, &report, render_offset)?;
        }
        Commands::FromUtc { key, datetime } => {
            let zone = load_zone(&cache, key)?;
            let utc = parse_utc(datetime)?;
            let report = from_utc(&zone, utc)?;
            emit(cli.json, &report, render_from_utc)?;
        }
        Commands::Keys => {
            let keys: Vec<String> = cache.source().available_keys().into_iter().collect();
            emit(cli.json, &keys, |keys| keys.join("\n"))?;
        }
    }

    Ok(())
}

/// Assemble the engine configuration: file, then environment, then `--tzpath`.
fn build_cache(cli: &Cli) -> Result<ZoneCache> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let mut config = config
        .merge_env()
        .context("Invalid configuration in environment")?;

    if let Some(raw) = &cli.tzpath {
        let paths: Vec<PathBuf> = raw
            .split(':')
            .filter(|part| !part.is_empty())
            .map(PathBuf::from)
            .collect();
        if let Some(relative) = paths.iter().find(|p| !p.is_absolute()) {
            bail!("--tzpath entries must be absolute, got {}", relative.display());
        }
        config.tzpath.search_paths = paths;
    }

    tracing::debug!(
        search_paths = ?config.tzpath.search_paths,
        capacity = config.cache.strong_capacity,
        "configured zone cache"
    );
    Ok(ZoneCache::from_config(&config))
}

fn load_zone(cache: &ZoneCache, key: &str) -> Result<std::sync::Arc<ZoneInfo>> {
    cache
        .get(key)
        .with_context(|| format!("Failed to load zone '{}'", key))
}

fn parse_datetime(raw: &str) -> Result<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .with_context(|| format!("Invalid datetime '{}', expected YYYY-MM-DDTHH:MM[:SS]", raw))
}

/// A UTC datetime, with or without a trailing `Z`, or integer epoch seconds.
fn parse_utc(raw: &str) -> Result<NaiveDateTime> {
    if let Ok(seconds) = raw.parse::<i64>() {
        return DateTime::from_timestamp(seconds, 0)
            .map(|dt| dt.naive_utc())
            .with_context(|| format!("Timestamp {} is out of range", seconds));
    }
    parse_datetime(raw.strip_suffix('Z').unwrap_or(raw))
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct TransitionReport {
    at: i64,
    utc: Option<String>,
    #[serde(flatten)]
    record: OffsetRecord,
}

#[derive(Serialize)]
struct InspectReport {
    key: Option<String>,
    version: u8,
    transition_count: usize,
    fixed_offset: bool,
    records: Vec<OffsetRecord>,
    before: Option<OffsetRecord>,
    last_transitions: Vec<TransitionReport>,
    footer: Option<String>,
    fallback: String,
}

#[derive(Serialize)]
struct OffsetReport {
    key: String,
    local: NaiveDateTime,
    fold: usize,
    abbreviation: String,
    utc_offset: i64,
    dst: i64,
    utc: Option<NaiveDateTime>,
}

#[derive(Serialize)]
struct FromUtcReport {
    key: String,
    utc: NaiveDateTime,
    local: NaiveDateTime,
    fold: usize,
    abbreviation: String,
    utc_offset: i64,
    dst: i64,
}

fn inspect(bytes: &[u8], key: Option<&str>, shown: usize) -> Result<InspectReport> {
    let raw = decoder::decode_bytes(bytes).context("Failed to decode TZif data")?;
    let footer = raw.tz_str.clone();
    let zone = ZoneInfo::from_raw(raw, key).context("Failed to build zone")?;

    let all: Vec<(i64, &OffsetRecord)> = zone.transitions().collect();
    let last_transitions = all[all.len().saturating_sub(shown)..]
        .iter()
        .map(|&(at, record)| TransitionReport {
            at,
            utc: DateTime::from_timestamp(at, 0).map(|dt| dt.to_rfc3339()),
            record: record.clone(),
        })
        .collect();

    Ok(InspectReport {
        key: zone.key().map(str::to_string),
        version: zone.version(),
        transition_count: all.len(),
        fixed_offset: zone.is_fixed_offset(),
        records: zone.records().to_vec(),
        before: zone.before_record().cloned(),
        last_transitions,
        footer,
        fallback: describe_fallback(zone.fallback()),
    })
}

fn offset(zone: &ZoneInfo, local: &LocalDateTime) -> Result<OffsetReport> {
    let record = zone
        .find_record(Some(local))
        .context("Zone has no record for this time")?;
    Ok(OffsetReport {
        key: zone.to_string(),
        local: local.datetime,
        fold: local.fold.index(),
        abbreviation: record.abbreviation().to_string(),
        utc_offset: record.utc_offset_seconds(),
        dst: record.dst_seconds(),
        utc: zone.to_utc(local),
    })
}

fn from_utc(zone: &ZoneInfo, utc: NaiveDateTime) -> Result<FromUtcReport> {
    let local = zone
        .from_utc(utc)
        .context("Local time is out of the representable range")?;
    let record = zone
        .find_record(Some(&local))
        .context("Zone has no record for this time")?;
    Ok(FromUtcReport {
        key: zone.to_string(),
        utc,
        local: local.datetime,
        fold: local.fold.index(),
        abbreviation: record.abbreviation().to_string(),
        utc_offset: record.utc_offset_seconds(),
        dst: record.dst_seconds(),
    })
}

fn describe_fallback(fallback: &Fallback) -> String {
    match fallback {
        Fallback::Fixed(record) => format!(
            "fixed {} ({})",
            record.abbreviation(),
            format_offset(record.utc_offset_seconds())
        ),
        Fallback::Rule(rule) => format!(
            "{} ({}) / {} ({}), DST {}",
            rule.std().abbreviation(),
            format_offset(rule.std().utc_offset_seconds()),
            rule.dst().abbreviation(),
            format_offset(rule.dst().utc_offset_seconds()),
            format_offset(rule.dst_diff()),
        ),
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Print `value` as pretty JSON, or through `render` as text.
fn emit<T, F>(json: bool, value: &T, render: F) -> Result<()>
where
    T: Serialize,
    F: Fn(&T) -> String,
{
    if json {
        let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
        println!("{}", out);
    } else {
        let out = render(value);
        if !out.is_empty() {
            println!("{}", out);
        }
    }
    Ok(())
}

/// `+HH:MM`, or `+HH:MM:SS` when the offset has a seconds part.
fn format_offset(seconds: i64) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    let abs = seconds.unsigned_abs();
    let (h, m, s) = (abs / 3600, abs % 3600 / 60, abs % 60);
    if s == 0 {
        format!("{}{:02}:{:02}", sign, h, m)
    } else {
        format!("{}{:02}:{:02}:{:02}", sign, h, m, s)
    }
}

fn render_record(record: &OffsetRecord) -> String {
    format!(
        "{:<8} UTC{}  dst {}",
        record.abbreviation(),
        format_offset(record.utc_offset_seconds()),
        format_offset(record.dst_seconds())
    )
}

fn render_inspect(report: &InspectReport) -> String {
    let mut lines = vec![
        format!("Zone:        {}", report.key.as_deref().unwrap_or("<file>")),
        format!("Version:     {}", report.version),
        format!("Transitions: {}", report.transition_count),
        format!("Fixed:       {}", report.fixed_offset),
        format!("Footer:      {}", report.footer.as_deref().unwrap_or("<none>")),
        format!("Fallback:    {}", report.fallback),
        "Records:".to_string(),
    ];
    lines.extend(report.records.iter().map(|r| format!("  {}", render_record(r))));
    if let Some(before) = &report.before {
        lines.push(format!("Before first transition: {}", render_record(before)));
    }
    if !report.last_transitions.is_empty() {
        lines.push("Last transitions:".to_string());
        lines.extend(report.last_transitions.iter().map(|t| {
            format!(
                "  {}  -> {}",
                t.utc.clone().unwrap_or_else(|| t.at.to_string()),
                render_record(&t.record)
            )
        }));
    }
    lines.join("\n")
}

fn render_offset(report: &OffsetReport) -> String {
    let utc = report
        .utc
        .map(|utc| format!("{}Z", utc.format("%Y-%m-%dT%H:%M:%S")))
        .unwrap_or_else(|| "out of range".to_string());
    format!(
        "{} fold={}  {}  UTC{}  dst {}  ({})",
        report.local.format("%Y-%m-%dT%H:%M:%S"),
        report.fold,
        report.abbreviation,
        format_offset(report.utc_offset),
        format_offset(report.dst),
        utc
    )
}

fn render_from_utc(report: &FromUtcReport) -> String {
    format!(
        "{} fold={}  {}  UTC{}  dst {}",
        report.local.format("%Y-%m-%dT%H:%M:%S"),
        report.fold,
        report.abbreviation,
        format_offset(report.utc_offset),
        format_offset(report.dst)
    )
}
