pub mod prayer;

pub use prayer::{PrayerEntry, PrayerName, TimerId};
