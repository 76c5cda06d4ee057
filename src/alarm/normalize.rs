use chrono::{NaiveTime, Timelike};

use crate::error::AlarmError;

/// Parse an upstream time string such as `"05:12"` or `"05:12 (PKT)"` into a
/// wall-clock time of day. Anything after the first space is ignored.
pub fn normalize(raw: &str) -> Result<NaiveTime, AlarmError> {
    let token = raw.split(' ').next().unwrap_or("").trim();

    let (hours, minutes) = token.split_once(':').ok_or_else(|| AlarmError::parse(raw))?;
    if !is_digits(hours, 1, 2) || !is_digits(minutes, 2, 2) {
        return Err(AlarmError::parse(raw));
    }

    let hour: u32 = hours.parse().map_err(|_| AlarmError::parse(raw))?;
    let minute: u32 = minutes.parse().map_err(|_| AlarmError::parse(raw))?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| AlarmError::parse(raw))
}

/// Canonical `HH:MM` rendering used for storage and display.
pub fn format_hhmm(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

fn is_digits(s: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}
