//! POSIX TZ rule interpreter -- the fallback used beyond the explicit transition table.
//!
//! Grammar (RFC 8536 section 3.3, POSIX `TZ` with the RFC extensions):
//!
//! ```text
//! std offset [dst [offset] , start[/time] , end[/time]]
//! ```
//!
//! - `std` / `dst`: alphabetic abbreviation, or any `<...>` quoted token
//!   (`<+0330>`); the angle brackets are not part of the abbreviation.
//! - `offset`: `[+-]h[:mm[:ss]]`, west of UTC positive, so `EST5` is UTC-5.
//!   A missing DST offset means one hour ahead of standard time.
//! - `start` / `end`: `Jn` (1-365, February 29 never counted), `n` (0-365,
//!   February 29 counted) or `Mm.w.d` (weekday `d` of week `w` of month `m`,
//!   week 5 meaning the last one).
//! - `time`: `[+-]h[:mm[:ss]]` with hours up to 167, default `02:00:00`,
//!   in the local time in effect before the boundary.
//!
//! Parsing is two-phase: the text is tokenized into a [`RawRule`] and only
//! then validated and turned into an immutable [`Fallback`].

use crate::error::{Result, ZoneInfoError};
use crate::types::{Fold, OffsetRecord};

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3600;
const SECONDS_PER_DAY: i64 = 86_400;
const DAYS_PER_WEEK: i64 = 7;

/// Default boundary time: 02:00:00 local.
const DEFAULT_TRANSITION_TIME: i64 = 2 * SECONDS_PER_HOUR;
/// UTC offsets must stay strictly below one day.
const MAX_OFFSET_SECONDS: i64 = 24 * SECONDS_PER_HOUR;
/// RFC 8536 allows transition times from -167h to +167h.
const MAX_TRANSITION_HOURS: i64 = 167;

/// Cumulated days before each month in a normal year.
const DAYS_BEFORE_MONTH: [i64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];
/// Days in each month in a normal year.
const DAYS_IN_MONTH: [i64; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// What the resolver falls back to after the last explicit transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// A single record that applies forever (no DST).
    Fixed(OffsetRecord),
    /// Standard and daylight records switched by yearly boundaries.
    Rule(PosixRule),
}

/// The day of the year on which a rule boundary falls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleDay {
    /// `Jn`: 1-based day of year, February 29 is never counted (J60 is always March 1).
    Julian1WithoutLeap(u16),
    /// `n`: 0-based day of year, February 29 is counted in leap years.
    Julian0WithLeap(u16),
    /// `Mm.w.d`: weekday `weekday` (0 = Sunday) of week `week` (5 = last) of `month`.
    MonthWeekDay { month: u8, week: u8, weekday: u8 },
}

impl RuleDay {
    /// Days between 1970-01-01 and this boundary's date in `year`.
    pub fn days_since_epoch(&self, year: i64) -> i64 {
        let year_start = days_before_year(year);
        match *self {
            RuleDay::Julian1WithoutLeap(day) => {
                let mut ordinal = day as i64 - 1;
                if day >= 60 && is_leap_year(year) {
                    ordinal += 1;
                }
                year_start.saturating_add(ordinal)
            }
            RuleDay::Julian0WithLeap(day) => year_start.saturating_add(day as i64),
            RuleDay::MonthWeekDay {
                month,
                week,
                weekday,
            } => {
                let month_start = year_start.saturating_add(days_before_month(year, month));
                let first_weekday = weekday_of(month_start);
                // 1-based day of the first `weekday` in the month.
                let mut month_day = (weekday as i64 - first_weekday).rem_euclid(DAYS_PER_WEEK) + 1;
                month_day += (week as i64 - 1) * DAYS_PER_WEEK;
                // Only reachable with week 5 ("last"), which may overshoot by one week.
                if month_day > days_in_month(year, month) {
                    month_day -= DAYS_PER_WEEK;
                }
                month_start.saturating_add(month_day - 1)
            }
        }
    }
}

/// A rule boundary: a day of the year plus a local time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub day: RuleDay,
    /// Seconds after local midnight; may be negative or exceed one day.
    pub time: i64,
}

impl TransitionRule {
    /// The boundary in `year`, as local seconds since the epoch.
    ///
    /// Saturates at the ends of the `i64` range instead of overflowing.
    pub fn year_to_epoch(&self, year: i64) -> i64 {
        self.day
            .days_since_epoch(year)
            .saturating_mul(SECONDS_PER_DAY)
            .saturating_add(self.time)
    }
}

/// A structured rule with both standard and daylight saving time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosixRule {
    std: OffsetRecord,
    dst: OffsetRecord,
    /// `dst.utc_offset - std.utc_offset`, negative for "winter time" zones.
    dst_diff: i64,
    start: TransitionRule,
    end: TransitionRule,
}

impl PosixRule {
    pub fn new(
        std_abbr: &str,
        std_offset: i64,
        dst_abbr: &str,
        dst_offset: i64,
        start: TransitionRule,
        end: TransitionRule,
    ) -> Self {
        let dst_diff = dst_offset - std_offset;
        Self {
            std: OffsetRecord::new(std_offset, 0, std_abbr),
            dst: OffsetRecord::new(dst_offset, dst_diff, dst_abbr),
            dst_diff,
            start,
            end,
        }
    }

    pub fn std(&self) -> &OffsetRecord {
        &self.std
    }

    pub fn dst(&self) -> &OffsetRecord {
        &self.dst
    }

    pub fn dst_diff(&self) -> i64 {
        self.dst_diff
    }

    pub fn start(&self) -> TransitionRule {
        self.start
    }

    pub fn end(&self) -> TransitionRule {
        self.end
    }

    /// DST start and end in `year`, each in the local time in effect before it.
    pub fn transitions(&self, year: i64) -> (i64, i64) {
        (self.start.year_to_epoch(year), self.end.year_to_epoch(year))
    }

    /// Record for a local wall-clock timestamp in `year`.
    ///
    /// With `Fold::Earlier` a time in the gap or the fold resolves to the
    /// record in effect before the boundary, with `Fold::Later` to the one
    /// after it. Which boundary needs shifting by `dst_diff` to get there
    /// depends on the fold and on the sign of `dst_diff`.
    pub fn get_trans_info(&self, ts: i64, year: i64, fold: Fold) -> &OffsetRecord {
        let (mut start, mut end) = self.transitions(year);

        if fold.is_later() == (self.dst_diff >= 0) {
            end = end.saturating_sub(self.dst_diff);
        } else {
            start = start.saturating_add(self.dst_diff);
        }

        if self.in_dst(start, end, ts) {
            &self.dst
        } else {
            &self.std
        }
    }

    /// Record for a UTC timestamp in `year`, plus whether the resulting wall
    /// time is the second occurrence of a repeated local time.
    pub fn get_trans_info_fromutc(&self, ts: i64, year: i64) -> (&OffsetRecord, Fold) {
        let (mut start, mut end) = self.transitions(year);
        start = start.saturating_sub(self.std.utc_offset_seconds());
        end = end.saturating_sub(self.dst.utc_offset_seconds());

        let record = if self.in_dst(start, end, ts) {
            &self.dst
        } else {
            &self.std
        };

        // Positive DST repeats the hour after DST ends; negative DST repeats
        // the hour before DST starts.
        let (ambig_start, ambig_end) = if self.dst_diff > 0 {
            (end, end.saturating_add(self.dst_diff))
        } else {
            (start, start.saturating_sub(self.dst_diff))
        };
        let fold = Fold::from(ambig_start <= ts && ts < ambig_end);

        (record, fold)
    }

    fn in_dst(&self, start: i64, end: i64, ts: i64) -> bool {
        if start < end {
            start <= ts && ts < end
        } else {
            // DST spans the new year (southern hemisphere).
            !(end <= ts && ts < start)
        }
    }
}

/// Tokens of a TZ string, before any cross-field validation.
#[derive(Debug, Default)]
struct RawRule<'a> {
    std_abbr: &'a str,
    std_offset: Option<i64>,
    dst_abbr: Option<&'a str>,
    dst_offset: Option<i64>,
    start_end: Option<&'a str>,
}

impl RawRule<'_> {
    fn build(self, tz_str: &str) -> Result<Fallback> {
        let std_offset = self.std_offset.unwrap_or(0);

        let Some(dst_abbr) = self.dst_abbr else {
            if self.start_end.is_some() {
                return Err(ZoneInfoError::rule(tz_str, "transition rule present without DST"));
            }
            return Ok(Fallback::Fixed(OffsetRecord::new(std_offset, 0, self.std_abbr)));
        };

        let dst_offset = self.dst_offset.unwrap_or(std_offset + SECONDS_PER_HOUR);
        let start_end = self
            .start_end
            .ok_or_else(|| ZoneInfoError::rule(tz_str, "missing transition rules"))?;
        let (start, end) = start_end
            .split_once(',')
            .ok_or_else(|| ZoneInfoError::rule(tz_str, "expected both a start and an end rule"))?;

        let start = parse_transition_rule(start, tz_str)?;
        let end = parse_transition_rule(end, tz_str)?;

        Ok(Fallback::Rule(PosixRule::new(
            self.std_abbr,
            std_offset,
            dst_abbr,
            dst_offset,
            start,
            end,
        )))
    }
}

/// Parse a TZ string from a TZif footer.
///
/// # Errors
/// Returns `ZoneInfoError::InvalidRule` for any syntax error, for offsets of
/// 24 hours or more, for a DST abbreviation without start/end rules and for
/// start/end rules without a DST abbreviation.
pub fn parse_tz_str(tz_str: &str) -> Result<Fallback> {
    let (offsets, start_end) = match tz_str.split_once(',') {
        Some((offsets, rest)) => (offsets, Some(rest)),
        None => (tz_str, None),
    };

    let mut cursor = Cursor::new(offsets);
    let mut raw = RawRule {
        start_end,
        ..RawRule::default()
    };

    raw.std_abbr = cursor
        .abbreviation()
        .ok_or_else(|| ZoneInfoError::rule(tz_str, "missing standard time abbreviation"))?;

    if !cursor.is_empty() {
        raw.std_offset = Some(parse_offset(&mut cursor, tz_str)?);

        if !cursor.is_empty() {
            raw.dst_abbr = Some(
                cursor
                    .abbreviation()
                    .ok_or_else(|| ZoneInfoError::rule(tz_str, "invalid DST abbreviation"))?,
            );
            if !cursor.is_empty() {
                raw.dst_offset = Some(parse_offset(&mut cursor, tz_str)?);
            }
        }
    }

    if !cursor.is_empty() {
        return Err(ZoneInfoError::rule(
            tz_str,
            format!("unexpected trailing characters {:?}", cursor.rest()),
        ));
    }

    raw.build(tz_str)
}

fn parse_offset(cursor: &mut Cursor<'_>, tz_str: &str) -> Result<i64> {
    let (sign, hours, minutes, seconds) = cursor
        .hms()
        .ok_or_else(|| ZoneInfoError::rule(tz_str, "malformed UTC offset"))?;
    let total = hours * SECONDS_PER_HOUR + minutes * SECONDS_PER_MINUTE + seconds;
    if total >= MAX_OFFSET_SECONDS {
        return Err(ZoneInfoError::rule(tz_str, "UTC offset must be less than 24 hours"));
    }
    // POSIX offsets count hours west of Greenwich: "EST5" is UTC-5.
    Ok(if sign < 0 { total } else { -total })
}

fn parse_transition_rule(text: &str, tz_str: &str) -> Result<TransitionRule> {
    let (date, time) = match text.split_once('/') {
        Some((date, time)) => (date, Some(time)),
        None => (text, None),
    };

    let day = parse_rule_day(date)
        .ok_or_else(|| ZoneInfoError::rule(tz_str, format!("invalid start/end date {:?}", text)))?;

    let time = match time {
        None => DEFAULT_TRANSITION_TIME,
        Some(time) => {
            let mut cursor = Cursor::new(time);
            let (sign, hours, minutes, seconds) = cursor
                .hms()
                .filter(|_| cursor.is_empty())
                .ok_or_else(|| ZoneInfoError::rule(tz_str, format!("invalid time {:?}", time)))?;
            if hours > MAX_TRANSITION_HOURS {
                return Err(ZoneInfoError::rule(
                    tz_str,
                    format!("transition hour must be in [0, 167]: {:?}", time),
                ));
            }
            sign * (hours * SECONDS_PER_HOUR + minutes * SECONDS_PER_MINUTE + seconds)
        }
    };

    Ok(TransitionRule { day, time })
}

fn parse_rule_day(date: &str) -> Option<RuleDay> {
    if let Some(spec) = date.strip_prefix('M') {
        let mut parts = spec.split('.');
        let month = parse_digits(parts.next()?, 2)?;
        let week = parse_digits(parts.next()?, 1)?;
        let weekday = parse_digits(parts.next()?, 1)?;
        if parts.next().is_some()
            || !(1..=12).contains(&month)
            || !(1..=5).contains(&week)
            || weekday > 6
        {
            return None;
        }
        return Some(RuleDay::MonthWeekDay {
            month: month as u8,
            week: week as u8,
            weekday: weekday as u8,
        });
    }

    if let Some(day) = date.strip_prefix('J') {
        let day = parse_digits(day, 3)?;
        return (1..=365)
            .contains(&day)
            .then_some(RuleDay::Julian1WithoutLeap(day as u16));
    }

    let day = parse_digits(date, 3)?;
    (day <= 365).then_some(RuleDay::Julian0WithLeap(day as u16))
}

/// Parse 1 to `max_len` ASCII digits making up the whole of `text`.
fn parse_digits(text: &str, max_len: usize) -> Option<i64> {
    if text.is_empty() || text.len() > max_len || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Minimal byte cursor over the `std offset dst offset` part of a TZ string.
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    /// An unquoted run of abbreviation characters, or a `<...>` quoted token
    /// (returned without the brackets).
    fn abbreviation(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        if let Some(quoted) = rest.strip_prefix('<') {
            let close = quoted.find('>')?;
            let inner = &quoted[..close];
            if inner.is_empty()
                || !inner
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-')
            {
                return None;
            }
            self.pos += close + 2;
            return Some(inner);
        }

        let len = rest
            .bytes()
            .take_while(|&b| !b.is_ascii_digit() && !b"<>:.,+-".contains(&b))
            .count();
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(&rest[..len])
    }

    fn digits(&mut self, min: usize, max: usize) -> Option<i64> {
        let rest = self.rest();
        let len = rest
            .bytes()
            .take(max)
            .take_while(u8::is_ascii_digit)
            .count();
        if len < min {
            return None;
        }
        self.pos += len;
        rest[..len].parse().ok()
    }

    /// `[+-]h[:mm[:ss]]` with 1-3 hour digits, as `(sign, h, m, s)`.
    fn hms(&mut self) -> Option<(i64, i64, i64, i64)> {
        let sign = match self.peek() {
            Some(b'+') => {
                self.pos += 1;
                1
            }
            Some(b'-') => {
                self.pos += 1;
                -1
            }
            _ => 1,
        };

        let hours = self.digits(1, 3)?;
        let mut minutes = 0;
        let mut seconds = 0;
        if self.peek() == Some(b':') {
            self.pos += 1;
            minutes = self.digits(2, 2)?;
            if self.peek() == Some(b':') {
                self.pos += 1;
                seconds = self.digits(2, 2)?;
            }
        }
        if minutes >= 60 || seconds >= 60 {
            return None;
        }

        Some((sign, hours, minutes, seconds))
    }
}

/// Whether `year` is a Gregorian leap year.
pub fn is_leap_year(year: i64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Days between 1970-01-01 and January 1 of `year`.
pub fn days_before_year(year: i64) -> i64 {
    let y = year.saturating_sub(1);
    // 719_162 = days from 0001-01-01 to 1970-01-01 in the proleptic Gregorian calendar.
    y.saturating_mul(365)
        .saturating_add(y.div_euclid(4) - y.div_euclid(100) + y.div_euclid(400) - 719_162)
}

fn days_before_month(year: i64, month: u8) -> i64 {
    let leap_day = (month > 2 && is_leap_year(year)) as i64;
    DAYS_BEFORE_MONTH[month as usize - 1] + leap_day
}

fn days_in_month(year: i64, month: u8) -> i64 {
    let leap_day = (month == 2 && is_leap_year(year)) as i64;
    DAYS_IN_MONTH[month as usize - 1] + leap_day
}

/// Day of the week for a day count since the epoch, 0 = Sunday (1970-01-01 was a Thursday).
fn weekday_of(days_since_epoch: i64) -> i64 {
    (days_since_epoch.rem_euclid(DAYS_PER_WEEK) + 4).rem_euclid(DAYS_PER_WEEK)
}

/// Gregorian year containing the given second since the epoch.
pub fn year_of_timestamp(ts: i64) -> i64 {
    // Days-to-civil conversion over 400-year eras starting on March 1.
    let days = ts.div_euclid(SECONDS_PER_DAY) + 719_468;
    let era = days.div_euclid(146_097);
    let day_of_era = days - era * 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let month_index = (5 * day_of_year + 2) / 153;
    let year = year_of_era + era * 400;
    // Month indices 10 and 11 are January and February of the next civil year.
    if month_index >= 10 {
        year + 1
    } else {
        year
    }
}
