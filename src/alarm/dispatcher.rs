use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;

use crate::alarm::normalize::normalize;
use crate::alarm::state::{AlarmBoard, AlarmState};
use crate::alarm::store::AlarmStore;
use crate::alarm::timer::{TimerHandler, TimerPayload};
use crate::models::{PrayerEntry, PrayerName};

/// Everything the presentation layer needs to show a fired alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FireEvent {
    pub name: PrayerName,
    pub time: String,
    /// One `Name: HH:MM` line per prayer, `--` where nothing is stored.
    pub all_times: String,
    pub fired_at: DateTime<Local>,
}

/// The full-screen alarm, ringing and notification live behind this.
pub trait Presenter: Send + Sync {
    fn present(&self, event: FireEvent) -> anyhow::Result<()>;

    /// Stop ringing and close the alarm experience.
    fn stop(&self);
}

pub struct Dispatcher {
    store: Arc<dyn AlarmStore>,
    board: Arc<AlarmBoard>,
    presenter: Arc<dyn Presenter>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn AlarmStore>, board: Arc<AlarmBoard>, presenter: Arc<dyn Presenter>) -> Self {
        Self {
            store,
            board,
            presenter,
        }
    }

    /// Wrap this dispatcher as the callback a timer backend invokes.
    pub fn handler(self: &Arc<Self>) -> TimerHandler {
        let dispatcher = Arc::clone(self);
        Arc::new(move |payload: TimerPayload| dispatcher.on_trigger(payload))
    }

    /// Called at the trigger instant. Never reschedules and never fails
    /// outward: whatever happens, the prayer ends up back in `Idle`.
    pub fn on_trigger(&self, payload: TimerPayload) {
        self.board.set(payload.name, AlarmState::Fired);
        let _settle = Settle {
            board: &self.board,
            name: payload.name,
        };

        if !self.still_wanted(&payload) {
            return;
        }

        log::info!("{} alarm fired ({})", payload.name, payload.time);
        let event = FireEvent {
            name: payload.name,
            time: payload.time,
            all_times: self.all_times(),
            fired_at: Local::now(),
        };

        if let Err(err) = self.presenter.present(event) {
            log::error!("Could not present {} alarm: {:#}", payload.name, err);
        }
    }

    pub fn dismiss(&self) {
        log::info!("Alarm dismissed");
        self.presenter.stop();
    }

    /// Snoozing does not re-arm anything; it behaves exactly like dismiss.
    pub fn snooze(&self) {
        log::info!("Alarm snoozed");
        self.presenter.stop();
    }

    /// The store may have been edited by another process since the timer
    /// was armed. An unreadable store still rings.
    fn still_wanted(&self, payload: &TimerPayload) -> bool {
        match self.store.get(payload.name) {
            Ok(Some(entry)) if !entry.enabled => {
                log::info!("{} was switched off; not ringing", payload.name);
                false
            }
            Ok(Some(entry)) if normalize(&entry.time).ok() != normalize(&payload.time).ok() => {
                log::info!(
                    "{} moved from {} to {}; not ringing the old time",
                    payload.name,
                    payload.time,
                    entry.time
                );
                false
            }
            Ok(Some(_)) => true,
            Ok(None) => {
                log::info!("{} is no longer stored; not ringing", payload.name);
                false
            }
            Err(err) => {
                log::error!("Could not check {} before ringing: {}", payload.name, err);
                true
            }
        }
    }

    fn all_times(&self) -> String {
        match self.store.entries() {
            Ok(entries) => render_all_times(&entries),
            Err(err) => {
                log::error!("Could not read stored times: {}", err);
                render_all_times(&[])
            }
        }
    }
}

struct Settle<'a> {
    board: &'a AlarmBoard,
    name: PrayerName,
}

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        self.board.settle_fired(self.name);
    }
}

pub fn render_all_times(entries: &[PrayerEntry]) -> String {
    PrayerName::all()
        .iter()
        .map(|name| {
            let time = entries
                .iter()
                .find(|e| e.name == *name)
                .map(|e| e.time.as_str())
                .unwrap_or("--");
            format!("{}: {}", name, time)
        })
        .collect::<Vec<_>>()
        .join("\n")
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingPresenter;
    use super::*;
    use crate::alarm::store::SqliteAlarmStore;

    fn payload(name: PrayerName, time: &str) -> TimerPayload {
        TimerPayload {
            name,
            time: time.to_string(),
        }
    }

    fn dispatcher(store: Arc<SqliteAlarmStore>, presenter: Arc<RecordingPresenter>) -> (Dispatcher, Arc<AlarmBoard>) {
        let board = Arc::new(AlarmBoard::new());
        (Dispatcher::new(store, board.clone(), presenter), board)
    }

    #[test]
    fn fire_builds_payload_with_all_times() {
        let store = Arc::new(SqliteAlarmStore::open_in_memory().unwrap());
        store
            .put_all(&[
                PrayerEntry::new(PrayerName::Fajr, "05:12", true),
                PrayerEntry::new(PrayerName::Maghrib, "18:40", false),
            ])
            .unwrap();
        let presenter = Arc::new(RecordingPresenter::default());
        let (dispatcher, board) = dispatcher(store, presenter.clone());

        dispatcher.on_trigger(payload(PrayerName::Fajr, "05:12"));

        let events = presenter.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, PrayerName::Fajr);
        assert_eq!(events[0].time, "05:12");
        assert_eq!(
            events[0].all_times,
            "Fajr: 05:12\nDhuhr: --\nAsr: --\nMaghrib: 18:40\nIsha: --\nTahajjud: --"
        );
        assert_eq!(board.state(PrayerName::Fajr), AlarmState::Idle);
    }

    fn stored(entries: &[PrayerEntry]) -> Arc<SqliteAlarmStore> {
        let store = Arc::new(SqliteAlarmStore::open_in_memory().unwrap());
        store.put_all(entries).unwrap();
        store
    }

    #[test]
    fn presenter_failure_still_returns_to_idle() {
        let store = stored(&[PrayerEntry::new(PrayerName::Isha, "20:05", true)]);
        let presenter = Arc::new(RecordingPresenter::failing());
        let (dispatcher, board) = dispatcher(store, presenter.clone());

        dispatcher.on_trigger(payload(PrayerName::Isha, "20:05"));
        assert!(presenter.events().is_empty());
        assert_eq!(board.state(PrayerName::Isha), AlarmState::Idle);
    }

    #[test]
    fn unreadable_store_renders_placeholders() {
        let store = Arc::new(SqliteAlarmStore::open_in_memory().unwrap());
        store.break_for_tests();
        let presenter = Arc::new(RecordingPresenter::default());
        let (dispatcher, _board) = dispatcher(store, presenter.clone());

        dispatcher.on_trigger(payload(PrayerName::Asr, "15:50"));
        let events = presenter.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].all_times.lines().all(|l| l.ends_with("--")));
    }

    #[test]
    fn snooze_and_dismiss_both_stop() {
        let store = stored(&[PrayerEntry::new(PrayerName::Tahajjud, "02:00", true)]);
        let presenter = Arc::new(RecordingPresenter::default());
        let (dispatcher, _board) = dispatcher(store, presenter.clone());

        dispatcher.on_trigger(payload(PrayerName::Tahajjud, "02:00"));
        dispatcher.snooze();
        dispatcher.dismiss();
        assert_eq!(presenter.stop_count(), 2);
        assert_eq!(presenter.events().len(), 1);
    }

    #[test]
    fn handler_routes_timer_callbacks() {
        let store = stored(&[PrayerEntry::new(PrayerName::Dhuhr, "12:30", true)]);
        let presenter = Arc::new(RecordingPresenter::default());
        let (dispatcher, _board) = dispatcher(store, presenter.clone());
        let handler = Arc::new(dispatcher).handler();

        handler(payload(PrayerName::Dhuhr, "12:30"));
        assert_eq!(presenter.events()[0].name, PrayerName::Dhuhr);
    }

    #[test]
    fn switched_off_prayer_does_not_ring() {
        let store = stored(&[PrayerEntry::new(PrayerName::Fajr, "05:12", true)]);
        store.set_enabled(PrayerName::Fajr, false).unwrap();
        let presenter = Arc::new(RecordingPresenter::default());
        let (dispatcher, board) = dispatcher(store, presenter.clone());

        dispatcher.on_trigger(payload(PrayerName::Fajr, "05:12"));
        assert!(presenter.events().is_empty());
        assert_eq!(board.state(PrayerName::Fajr), AlarmState::Idle);
    }

    #[test]
    fn moved_or_removed_prayer_does_not_ring_old_time() {
        let store = stored(&[PrayerEntry::new(PrayerName::Asr, "15:50", true)]);
        let presenter = Arc::new(RecordingPresenter::default());
        let (dispatcher, board) = dispatcher(store.clone(), presenter.clone());

        store.put(&PrayerEntry::new(PrayerName::Asr, "16:05", true)).unwrap();
        dispatcher.on_trigger(payload(PrayerName::Asr, "15:50"));
        assert!(presenter.events().is_empty());
        assert_eq!(board.state(PrayerName::Asr), AlarmState::Idle);

        dispatcher.on_trigger(payload(PrayerName::Asr, "16:05"));
        assert_eq!(presenter.events().len(), 1);

        store.clear().unwrap();
        dispatcher.on_trigger(payload(PrayerName::Asr, "16:05"));
        assert_eq!(presenter.events().len(), 1);
    }

    #[test]
    fn armed_timer_is_silenced_by_a_later_disable() {
        use crate::alarm::timer::{ThreadTimer, WakeTimer};
        use std::time::Duration;

        let store = stored(&[PrayerEntry::new(PrayerName::Fajr, "05:12", true)]);
        let presenter = Arc::new(RecordingPresenter::default());
        let (dispatcher, _board) = dispatcher(store.clone(), presenter.clone());
        let timer = ThreadTimer::spawn(Arc::new(dispatcher).handler()).unwrap();

        let soon = Local::now() + chrono::Duration::milliseconds(300);
        timer
            .arm(PrayerName::Fajr.timer_id(), soon, payload(PrayerName::Fajr, "05:12"))
            .unwrap();
        // Another process switches Fajr off without touching the timer.
        store.set_enabled(PrayerName::Fajr, false).unwrap();

        std::thread::sleep(Duration::from_millis(1500));
        timer.shutdown();
        assert!(presenter.events().is_empty());
    }
}
