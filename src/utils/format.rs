use chrono::NaiveTime;

use crate::alarm::normalize::normalize;

/// Format a duration in seconds to "Xh Ym" or "Ym" string
pub fn format_duration_secs(secs: i64) -> String {
    if secs <= 0 {
        return "now".to_string();
    }
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Format a NaiveTime as "HH:MM" or "h:MM AM"
pub fn format_time(t: NaiveTime, use_24h: bool) -> String {
    if use_24h {
        t.format("%H:%M").to_string()
    } else {
        t.format("%-I:%M %p").to_string()
    }
}

/// Re-render a stored `HH:MM` string for display; anything unparseable
/// (`--` placeholders included) is shown as-is.
pub fn display_time(raw: &str, use_24h: bool) -> String {
    normalize(raw)
        .map(|t| format_time(t, use_24h))
        .unwrap_or_else(|_| raw.to_string())
}

/// Apply `display_time` to every `Name: HH:MM` line of a rendered list.
pub fn display_time_lines(all_times: &str, use_24h: bool) -> String {
    all_times
        .lines()
        .map(|line| match line.split_once(": ") {
            Some((name, time)) => format!("{}: {}", name, display_time(time, use_24h)),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration_secs(0), "now");
        assert_eq!(format_duration_secs(59 * 60), "59m");
        assert_eq!(format_duration_secs(3 * 3600 + 12 * 60 + 5), "3h 12m");
    }

    #[test]
    fn twelve_hour_rendering() {
        assert_eq!(display_time("05:07", false), "5:07 AM");
        assert_eq!(display_time("18:40", false), "6:40 PM");
        assert_eq!(display_time("18:40", true), "18:40");
        assert_eq!(display_time("--", false), "--");
    }

    #[test]
    fn rendered_lists_are_reformatted_per_line() {
        let lines = display_time_lines("Fajr: 05:12\nTahajjud: --", false);
        assert_eq!(lines, "Fajr: 5:12 AM\nTahajjud: --");
    }
}
