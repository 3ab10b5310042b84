//! Timestamp generation and validation for the `timestamp` envelope field.
//!
//! Format is fixed: `YYYY-MM-DDTHH:MM:SS.sssZ`, UTC only, exactly three
//! fractional-second digits, no offset, never microseconds. Sub-millisecond
//! precision is truncated, not rounded, so a generated timestamp never claims
//! a later instant than the clock reading it was derived from.

use time::OffsetDateTime;

/// Returns the current UTC time formatted as `YYYY-MM-DDTHH:MM:SS.sssZ`,
/// truncating (never rounding) to millisecond precision.
#[must_use]
pub fn now_truncated_ms() -> String {
    format_truncated_ms(OffsetDateTime::now_utc())
}

fn format_truncated_ms(when: OffsetDateTime) -> String {
    let millis = when.nanosecond() / 1_000_000;
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        when.year(),
        when.month() as u8,
        when.day(),
        when.hour(),
        when.minute(),
        when.second(),
        millis
    )
}

/// Validates that `s` matches the envelope's fixed timestamp format exactly:
/// four-digit year, two-digit month/day/hour/minute/second, a literal `.`,
/// exactly three fractional digits, and a trailing `Z`. Rejects missing
/// fractional digits and microsecond-precision (6-digit) timestamps.
#[must_use]
pub fn is_valid_gef_timestamp(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() != 24 {
        return false;
    }
    let digit = |i: usize| b[i].is_ascii_digit();
    let digits_in = |range: std::ops::Range<usize>| range.clone().all(digit) && !range.is_empty();

    digits_in(0..4)
        && b[4] == b'-'
        && digits_in(5..7)
        && b[7] == b'-'
        && digits_in(8..10)
        && b[10] == b'T'
        && digits_in(11..13)
        && b[13] == b':'
        && digits_in(14..16)
        && b[16] == b':'
        && digits_in(17..19)
        && b[19] == b'.'
        && digits_in(20..23)
        && b[23] == b'Z'
        && month_in_range(s)
        && day_in_range(s)
        && hour_minute_second_in_range(s)
}

fn month_in_range(s: &str) -> bool {
    s[5..7].parse::<u8>().is_ok_and(|m| (1..=12).contains(&m))
}

fn day_in_range(s: &str) -> bool {
    s[8..10].parse::<u8>().is_ok_and(|d| (1..=31).contains(&d))
}

fn hour_minute_second_in_range(s: &str) -> bool {
    let hour_ok = s[11..13].parse::<u8>().is_ok_and(|h| h <= 23);
    let minute_ok = s[14..16].parse::<u8>().is_ok_and(|m| m <= 59);
    let second_ok = s[17..19].parse::<u8>().is_ok_and(|sec| sec <= 59);
    hour_ok && minute_ok && second_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_normative_example() {
        assert!(is_valid_gef_timestamp("2026-02-26T00:00:00.000Z"));
    }

    #[test]
    fn rejects_missing_fractional_digits() {
        assert!(!is_valid_gef_timestamp("2026-02-26T00:00:00Z"));
    }

    #[test]
    fn rejects_microsecond_precision() {
        assert!(!is_valid_gef_timestamp("2026-02-26T00:00:00.000000Z"));
    }

    #[test]
    fn rejects_offsets() {
        assert!(!is_valid_gef_timestamp("2026-02-26T00:00:00.000+00:00"));
    }

    #[test]
    fn rejects_out_of_range_month() {
        assert!(!is_valid_gef_timestamp("2026-13-01T00:00:00.000Z"));
    }

    #[test]
    fn now_truncated_ms_is_well_formed() {
        let ts = now_truncated_ms();
        assert!(is_valid_gef_timestamp(&ts), "{ts} must be well-formed");
    }

    #[test]
    fn truncates_rather_than_rounds() {
        let date = time::Date::from_calendar_date(2026, time::Month::February, 26).unwrap();
        let when = date.with_hms_nano(0, 0, 0, 999_999_999).unwrap().assume_utc();
        assert_eq!(format_truncated_ms(when), "2026-02-26T00:00:00.999Z");
    }
}
