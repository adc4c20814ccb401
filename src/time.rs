//! Absolute-instant time model (§4.1). All instants are compared as absolute
//! UTC; midnight crossing is an emergent property of comparing two instants,
//! never a special case in the arithmetic below.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};

use crate::clock::Clock;
use crate::error::{AppError, AppResult};

pub type Instant = DateTime<Utc>;

const HHMM_PATTERN_HOURS_MAX: u32 = 23;

/// Parses `"HH:MM"` relative to a date anchor into an absolute instant.
/// The date anchor is either "today" (new form entries) or the date already
/// embedded in an existing task — callers choose which by what `date` they pass.
pub fn time_to_datetime(hhmm: &str, date: NaiveDate) -> AppResult<Instant> {
    let naive_time = parse_hhmm(hhmm)?;
    let naive_dt = date.and_time(naive_time);
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive_dt, Utc))
}

fn parse_hhmm(hhmm: &str) -> AppResult<NaiveTime> {
    let (h, m) = hhmm
        .split_once(':')
        .ok_or_else(|| AppError::validation("Invalid start time format. Use HH:MM format."))?;
    let hour: u32 = h
        .parse()
        .map_err(|_| AppError::validation("Invalid start time format. Use HH:MM format."))?;
    let minute: u32 = m
        .parse()
        .map_err(|_| AppError::validation("Invalid start time format. Use HH:MM format."))?;
    if hour > HHMM_PATTERN_HOURS_MAX || minute > 59 {
        return Err(AppError::validation(
            "Invalid start time format. Use HH:MM format.",
        ));
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| AppError::validation("Invalid start time format. Use HH:MM format."))
}

pub fn calculate_end_datetime(start: Instant, duration_min: i64) -> Instant {
    start + Duration::minutes(duration_min)
}

pub fn extract_time(instant: Instant) -> String {
    instant.format("%H:%M").to_string()
}

pub fn extract_date(instant: Instant) -> String {
    instant.format("%Y-%m-%d").to_string()
}

/// Signed minutes from `a` to `b` (positive when `b` is later).
pub fn duration_between(a: Instant, b: Instant) -> i64 {
    b.signed_duration_since(a).num_minutes()
}

/// Current wall clock rounded up to the next 5-minute boundary, formatted `"HH:MM"`.
pub fn get_current_time_rounded(clock: &dyn Clock) -> String {
    let now = clock.now();
    let minute_of_day = now.hour() as i64 * 60 + now.minute() as i64;
    let rounded = ((minute_of_day + 4) / 5) * 5;
    let rounded = rounded.rem_euclid(24 * 60);
    format!("{:02}:{:02}", rounded / 60, rounded % 60)
}

/// Formats an instant as `"h:mm AM/PM"` (no leading zero on the hour), used by
/// the conflict diagnostic (§4.4.8) and nowhere else — that format is not the
/// canonical persisted or compared representation.
pub fn format_12h(instant: Instant) -> String {
    instant.format("%l:%M %p").to_string().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 28).unwrap()
    }

    #[test]
    fn parses_hhmm_into_instant() {
        let dt = time_to_datetime("09:30", date()).unwrap();
        assert_eq!(extract_time(dt), "09:30");
        assert_eq!(extract_date(dt), "2026-07-28");
    }

    #[test]
    fn rejects_malformed_time() {
        assert!(time_to_datetime("9:3", date()).is_err());
        assert!(time_to_datetime("24:00", date()).is_err());
        assert!(time_to_datetime("12:60", date()).is_err());
    }

    #[test]
    fn end_datetime_crosses_midnight() {
        let start = time_to_datetime("23:00", date()).unwrap();
        let end = calculate_end_datetime(start, 90);
        assert_eq!(extract_date(end), "2026-07-29");
        assert_eq!(extract_time(end), "00:30");
        assert_eq!(duration_between(start, end), 90);
    }

    #[test]
    fn rounds_up_to_next_five_minutes() {
        use crate::clock::FixedClock;
        let at = |hm: &str| FixedClock(time_to_datetime(hm, date()).unwrap());
        assert_eq!(get_current_time_rounded(&at("14:35")), "14:35");
        assert_eq!(get_current_time_rounded(&at("14:31")), "14:35");
        assert_eq!(get_current_time_rounded(&at("23:58")), "00:00");
    }
}
