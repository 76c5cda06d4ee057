use anyhow::{Context, Result};
use notify_rust::{Notification, Timeout};

use crate::alarm::FireEvent;
use crate::utils::format::{display_time, display_time_lines};

pub fn title(event: &FireEvent) -> String {
    format!("{} Prayer Time", event.name)
}

pub fn body(event: &FireEvent, use_24h: bool) -> String {
    format!(
        "It's time for {} prayer ({})\n\nToday's Prayer Times:\n{}",
        event.name,
        display_time(&event.time, use_24h),
        display_time_lines(&event.all_times, use_24h)
    )
}

/// Post a desktop notification for a fired alarm.
pub fn post(event: &FireEvent, use_24h: bool) -> Result<()> {
    let mut notification = Notification::new();
    notification
        .summary(&title(event))
        .body(&body(event, use_24h))
        .appname("azan-alarm")
        .icon("alarm-clock")
        .timeout(Timeout::Never);

    #[cfg(all(unix, not(target_os = "macos")))]
    notification.urgency(notify_rust::Urgency::Critical);

    notification
        .show()
        .with_context(|| format!("Showing notification for {}", event.name))?;
    Ok(())
}
