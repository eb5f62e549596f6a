//! Tests for POSIX TZ rule parsing and evaluation.

mod common;

use chrono::NaiveDate;
use common::ts;
use zoneinfo_engine::rule::{
    days_before_year, is_leap_year, parse_tz_str, year_of_timestamp, Fallback, PosixRule, RuleDay,
    TransitionRule,
};
use zoneinfo_engine::{Fold, OffsetRecord, ZoneInfoError};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn posix(tz_str: &str) -> PosixRule {
    match parse_tz_str(tz_str) {
        Ok(Fallback::Rule(rule)) => rule,
        other => panic!("{tz_str:?} should parse to a DST rule, got {other:?}"),
    }
}

fn fixed(tz_str: &str) -> OffsetRecord {
    match parse_tz_str(tz_str) {
        Ok(Fallback::Fixed(record)) => record,
        other => panic!("{tz_str:?} should parse to a fixed offset, got {other:?}"),
    }
}

/// Days from the epoch to a calendar date, computed independently with chrono.
fn epoch_days(y: i32, m: u32, d: u32) -> i64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    (NaiveDate::from_ymd_opt(y, m, d).unwrap() - epoch).num_days()
}

fn abbr_local(rule: &PosixRule, local: i64, year: i64, fold: Fold) -> &str {
    rule.get_trans_info(local, year, fold).abbreviation()
}

// ── Parsing: fixed offsets ──────────────────────────────────────────────────

#[test]
fn parses_fixed_offsets() {
    assert_eq!(fixed("JST-9"), OffsetRecord::new(32400, 0, "JST"));
    assert_eq!(fixed("UTC0"), OffsetRecord::new(0, 0, "UTC"));
    assert_eq!(fixed("EST+5"), OffsetRecord::new(-18000, 0, "EST"));
    assert_eq!(fixed("NPT-5:45"), OffsetRecord::new(20700, 0, "NPT"));
    assert_eq!(fixed("LMT0:01:15"), OffsetRecord::new(-75, 0, "LMT"));
}

#[test]
fn parses_quoted_abbreviations() {
    assert_eq!(fixed("<+0330>-3:30"), OffsetRecord::new(12600, 0, "+0330"));
    assert_eq!(fixed("<-03>3"), OffsetRecord::new(-10800, 0, "-03"));
}

#[test]
fn offsets_just_under_a_day_are_accepted() {
    assert_eq!(fixed("XXX23:59:59").utc_offset_seconds(), -86399);
    assert_eq!(fixed("XXX-23:59:59").utc_offset_seconds(), 86399);
}

// ── Parsing: DST rules ──────────────────────────────────────────────────────

#[test]
fn parses_us_eastern_rule() {
    let rule = posix("EST5EDT,M3.2.0,M11.1.0");

    assert_eq!(rule.std(), &OffsetRecord::new(-18000, 0, "EST"));
    assert_eq!(rule.dst(), &OffsetRecord::new(-14400, 3600, "EDT"));
    assert_eq!(rule.dst_diff(), 3600);
    assert_eq!(
        rule.start(),
        TransitionRule {
            day: RuleDay::MonthWeekDay {
                month: 3,
                week: 2,
                weekday: 0
            },
            time: 7200,
        }
    );
    assert_eq!(rule.end().time, 7200);
}

#[test]
fn parses_negative_dst_rule() {
    let rule = posix("IST-1GMT0,M10.5.0,M3.5.0/1");

    assert_eq!(rule.std(), &OffsetRecord::new(3600, 0, "IST"));
    assert_eq!(rule.dst(), &OffsetRecord::new(0, -3600, "GMT"));
    assert_eq!(rule.dst_diff(), -3600);
    assert_eq!(rule.end().time, 3600);
}

#[test]
fn parses_explicit_dst_offset() {
    let rule = posix("AAA3BBB1:30,J60,J300");
    assert_eq!(rule.std().utc_offset_seconds(), -10800);
    assert_eq!(rule.dst().utc_offset_seconds(), -5400);
    assert_eq!(rule.dst_diff(), 5400);
    assert_eq!(rule.start().day, RuleDay::Julian1WithoutLeap(60));
}

#[test]
fn parses_quoted_dst_rule_with_default_dst_offset() {
    let rule = posix("<+13>-13<+14>,M9.5.0/3,M4.1.0/4");
    assert_eq!(rule.std(), &OffsetRecord::new(46800, 0, "+13"));
    assert_eq!(rule.dst(), &OffsetRecord::new(50400, 3600, "+14"));
}

#[test]
fn parses_zero_based_julian_days() {
    let rule = posix("XXX0YYY,0,365");
    assert_eq!(rule.start().day, RuleDay::Julian0WithLeap(0));
    assert_eq!(rule.end().day, RuleDay::Julian0WithLeap(365));
}

#[test]
fn transition_times_may_leave_the_day() {
    let rule = posix("EST5EDT,M3.2.0/-1,M11.1.0/26");
    assert_eq!(
        rule.transitions(2024),
        (ts(2024, 3, 9, 23, 0, 0), ts(2024, 11, 4, 2, 0, 0))
    );

    let extreme = posix("EST5EDT,M3.2.0/167,M11.1.0/-167:59:59");
    assert_eq!(extreme.start().time, 167 * 3600);
    assert_eq!(extreme.end().time, -(167 * 3600 + 59 * 60 + 59));
}

#[test]
fn rejects_malformed_rules() {
    let cases = [
        "",
        "5EST",
        "<>5",
        "EST5<EDT",
        "EST24",
        "EST-24",
        "EST5:60",
        "EST5:00:60",
        "EST5EDT",
        "EST5,M3.2.0,M11.1.0",
        "EST5EDT,M3.2.0",
        "EST5EDT4x,M3.2.0,M11.1.0",
        "EST5EDT,M13.2.0,M11.1.0",
        "EST5EDT,M0.2.0,M11.1.0",
        "EST5EDT,M3.6.0,M11.1.0",
        "EST5EDT,M3.0.0,M11.1.0",
        "EST5EDT,M3.2.7,M11.1.0",
        "EST5EDT,M3.2,M11.1.0",
        "EST5EDT,J0,J365",
        "EST5EDT,J1,J366",
        "EST5EDT,0,366",
        "EST5EDT,M3.2.0/168,M11.1.0",
        "EST5EDT,M3.2.0/2:60,M11.1.0",
        "EST5EDT,M3.2.0/2x,M11.1.0",
        "EST5EDT,M3.2.0,M11.1.0,M12.1.0",
    ];

    for tz_str in cases {
        match parse_tz_str(tz_str) {
            Err(ZoneInfoError::InvalidRule { rule, .. }) => assert_eq!(rule, tz_str),
            other => panic!("{tz_str:?} should be rejected, got {other:?}"),
        }
    }
}

// ── Boundary days ───────────────────────────────────────────────────────────

#[test]
fn month_week_day_boundaries() {
    let second_sunday_march = RuleDay::MonthWeekDay {
        month: 3,
        week: 2,
        weekday: 0,
    };
    let last_sunday_march = RuleDay::MonthWeekDay {
        month: 3,
        week: 5,
        weekday: 0,
    };
    let last_thursday_feb = RuleDay::MonthWeekDay {
        month: 2,
        week: 5,
        weekday: 4,
    };

    assert_eq!(second_sunday_march.days_since_epoch(2024), epoch_days(2024, 3, 10));
    assert_eq!(last_sunday_march.days_since_epoch(2024), epoch_days(2024, 3, 31));
    assert_eq!(last_sunday_march.days_since_epoch(2090), epoch_days(2090, 3, 26));
    assert_eq!(last_thursday_feb.days_since_epoch(2024), epoch_days(2024, 2, 29));
    assert_eq!(last_thursday_feb.days_since_epoch(2023), epoch_days(2023, 2, 23));
}

#[test]
fn julian_without_leap_never_counts_february_29() {
    let j59 = RuleDay::Julian1WithoutLeap(59);
    let j60 = RuleDay::Julian1WithoutLeap(60);
    let j365 = RuleDay::Julian1WithoutLeap(365);

    assert_eq!(j59.days_since_epoch(2024), epoch_days(2024, 2, 28));
    assert_eq!(j60.days_since_epoch(2024), epoch_days(2024, 3, 1));
    assert_eq!(j60.days_since_epoch(2023), epoch_days(2023, 3, 1));
    assert_eq!(j365.days_since_epoch(2024), epoch_days(2024, 12, 31));
    assert_eq!(RuleDay::Julian1WithoutLeap(1).days_since_epoch(2024), epoch_days(2024, 1, 1));
}

#[test]
fn julian_with_leap_counts_february_29() {
    let day59 = RuleDay::Julian0WithLeap(59);

    assert_eq!(day59.days_since_epoch(2024), epoch_days(2024, 2, 29));
    assert_eq!(day59.days_since_epoch(2023), epoch_days(2023, 3, 1));
    assert_eq!(RuleDay::Julian0WithLeap(0).days_since_epoch(1969), epoch_days(1969, 1, 1));
    assert_eq!(RuleDay::Julian0WithLeap(365).days_since_epoch(2024), epoch_days(2024, 12, 31));
}

// ── Evaluation ──────────────────────────────────────────────────────────────

#[test]
fn northern_rule_resolves_gap_and_fold_by_fold_bit() {
    let rule = posix("EST5EDT,M3.2.0,M11.1.0");

    // 02:30 on 2024-03-10 does not exist.
    let gap = ts(2024, 3, 10, 2, 30, 0);
    assert_eq!(abbr_local(&rule, gap, 2024, Fold::Earlier), "EST");
    assert_eq!(abbr_local(&rule, gap, 2024, Fold::Later), "EDT");

    // 01:30 on 2024-11-03 happens twice.
    let fold = ts(2024, 11, 3, 1, 30, 0);
    assert_eq!(abbr_local(&rule, fold, 2024, Fold::Earlier), "EDT");
    assert_eq!(abbr_local(&rule, fold, 2024, Fold::Later), "EST");

    // Unambiguous times ignore the fold bit.
    for fold_bit in [Fold::Earlier, Fold::Later] {
        assert_eq!(abbr_local(&rule, ts(2024, 7, 1, 12, 0, 0), 2024, fold_bit), "EDT");
        assert_eq!(abbr_local(&rule, ts(2024, 1, 15, 12, 0, 0), 2024, fold_bit), "EST");
        assert_eq!(abbr_local(&rule, ts(2024, 3, 10, 1, 59, 59), 2024, fold_bit), "EST");
        assert_eq!(abbr_local(&rule, ts(2024, 3, 10, 3, 0, 0), 2024, fold_bit), "EDT");
    }
}

#[test]
fn northern_rule_from_utc() {
    let rule = posix("EST5EDT,M3.2.0,M11.1.0");
    let at = |t: i64| {
        let (record, fold) = rule.get_trans_info_fromutc(t, 2024);
        (record.abbreviation().to_string(), fold)
    };

    assert_eq!(at(ts(2024, 3, 10, 6, 59, 59)), ("EST".into(), Fold::Earlier));
    assert_eq!(at(ts(2024, 3, 10, 7, 0, 0)), ("EDT".into(), Fold::Earlier));
    assert_eq!(at(1730613599), ("EDT".into(), Fold::Earlier));
    assert_eq!(at(1730613600), ("EST".into(), Fold::Later));
    assert_eq!(at(1730617199), ("EST".into(), Fold::Later));
    assert_eq!(at(1730617200), ("EST".into(), Fold::Earlier));
}

#[test]
fn negative_dst_rule_resolves_gap_and_fold() {
    let rule = posix("IST-1GMT0,M10.5.0,M3.5.0/1");

    let gap = ts(2090, 3, 26, 1, 30, 0);
    assert_eq!(abbr_local(&rule, gap, 2090, Fold::Earlier), "GMT");
    assert_eq!(abbr_local(&rule, gap, 2090, Fold::Later), "IST");

    let fold = ts(2090, 10, 29, 1, 30, 0);
    assert_eq!(abbr_local(&rule, fold, 2090, Fold::Earlier), "IST");
    assert_eq!(abbr_local(&rule, fold, 2090, Fold::Later), "GMT");

    assert_eq!(abbr_local(&rule, ts(2090, 7, 1, 12, 0, 0), 2090, Fold::Earlier), "IST");
    assert_eq!(abbr_local(&rule, ts(2090, 12, 1, 12, 0, 0), 2090, Fold::Earlier), "GMT");
}

#[test]
fn negative_dst_rule_from_utc() {
    let rule = posix("IST-1GMT0,M10.5.0,M3.5.0/1");
    let at = |t: i64| {
        let (record, fold) = rule.get_trans_info_fromutc(t, 2090);
        (record.abbreviation().to_string(), fold)
    };

    assert_eq!(at(3812921999), ("IST".into(), Fold::Earlier));
    assert_eq!(at(3812922000), ("GMT".into(), Fold::Later));
    assert_eq!(at(3812925599), ("GMT".into(), Fold::Later));
    assert_eq!(at(3812925600), ("GMT".into(), Fold::Earlier));
    assert_eq!(at(3794173199), ("GMT".into(), Fold::Earlier));
    assert_eq!(at(3794173200), ("IST".into(), Fold::Earlier));
}

#[test]
fn southern_rule_spans_the_new_year() {
    let rule = posix("AEST-10AEDT,M10.1.0,M4.1.0/3");

    assert_eq!(abbr_local(&rule, ts(2080, 1, 1, 12, 0, 0), 2080, Fold::Earlier), "AEDT");
    assert_eq!(abbr_local(&rule, ts(2080, 7, 1, 12, 0, 0), 2080, Fold::Earlier), "AEST");
    assert_eq!(abbr_local(&rule, ts(2080, 12, 25, 12, 0, 0), 2080, Fold::Earlier), "AEDT");

    let fold = ts(2080, 4, 7, 2, 30, 0);
    assert_eq!(abbr_local(&rule, fold, 2080, Fold::Earlier), "AEDT");
    assert_eq!(abbr_local(&rule, fold, 2080, Fold::Later), "AEST");

    let gap = ts(2080, 10, 6, 2, 30, 0);
    assert_eq!(abbr_local(&rule, gap, 2080, Fold::Earlier), "AEST");
    assert_eq!(abbr_local(&rule, gap, 2080, Fold::Later), "AEDT");

    let (record, fold_bit) = rule.get_trans_info_fromutc(3479646600, 2080);
    assert_eq!((record.abbreviation(), fold_bit), ("AEST", Fold::Later));
    let (record, fold_bit) = rule.get_trans_info_fromutc(3479643000, 2080);
    assert_eq!((record.abbreviation(), fold_bit), ("AEDT", Fold::Earlier));
}

#[test]
fn evaluation_saturates_at_the_ends_of_the_timestamp_range() {
    for tz_str in ["EST5EDT,M3.2.0,M11.1.0", "EST5EDT,J60,300/25", "IST-1GMT0,M10.5.0,M3.5.0/1"] {
        let rule = posix(tz_str);
        let known = [rule.std().abbreviation(), rule.dst().abbreviation()];

        for ts in [i64::MIN, i64::MIN + 10, i64::MAX - 10, i64::MAX] {
            let year = year_of_timestamp(ts);
            for fold in [Fold::Earlier, Fold::Later] {
                assert!(known.contains(&abbr_local(&rule, ts, year, fold)), "{tz_str} ts={ts}");
            }
            let (record, _) = rule.get_trans_info_fromutc(ts, year);
            assert!(known.contains(&record.abbreviation()), "{tz_str} ts={ts}");
        }

        for year in [i64::MIN, i64::MAX] {
            let _ = rule.transitions(year);
            let record = rule.get_trans_info(0, year, Fold::Earlier);
            assert!(known.contains(&record.abbreviation()), "{tz_str} year={year}");
        }
    }
}

// ── Calendar helpers ────────────────────────────────────────────────────────

#[test]
fn leap_years() {
    assert!(is_leap_year(2000));
    assert!(is_leap_year(2024));
    assert!(!is_leap_year(1900));
    assert!(!is_leap_year(2023));
    assert!(is_leap_year(-4));
}

#[test]
fn days_before_year_matches_chrono() {
    for year in [1, 1600, 1900, 1969, 1970, 1971, 2000, 2024, 2100, 9999] {
        assert_eq!(days_before_year(year as i64), epoch_days(year, 1, 1), "{year}");
    }
}

#[test]
fn year_of_timestamp_handles_year_edges() {
    assert_eq!(year_of_timestamp(0), 1970);
    assert_eq!(year_of_timestamp(-1), 1969);
    assert_eq!(year_of_timestamp(ts(2024, 12, 31, 23, 59, 59)), 2024);
    assert_eq!(year_of_timestamp(ts(2025, 1, 1, 0, 0, 0)), 2025);
    assert_eq!(year_of_timestamp(ts(2024, 2, 29, 12, 0, 0)), 2024);
    assert_eq!(year_of_timestamp(ts(1600, 1, 1, 0, 0, 0)), 1600);
    assert_eq!(year_of_timestamp(ts(1600, 3, 1, 0, 0, 0)), 1600);
    assert_eq!(year_of_timestamp(ts(1599, 12, 31, 23, 59, 59)), 1599);
    assert_eq!(year_of_timestamp(ts(2400, 12, 31, 0, 0, 0)), 2400);
}
