use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, mpsc};
use std::thread;
use std::time::Duration;

use crate::alarm::{
    AlarmBoard, AlarmState, AlarmStore, Dispatcher, FireEvent, Presenter, Recovery, ScheduleReport,
    Scheduler, ThreadTimer, WakeTimer,
};
use crate::cli::handlers::refresh_entries;
use crate::config::AppConfig;
use crate::models::{PrayerEntry, PrayerName};
use crate::notification;
use crate::tui::alarm::{self as alarm_screen, AlarmOutcome};

/// Hands fired alarms from the timer thread to the daemon's main loop, which
/// owns the terminal.
pub struct DaemonPresenter {
    ringing: AtomicBool,
    current: Mutex<Option<PrayerName>>,
    tx: mpsc::Sender<FireEvent>,
}

impl DaemonPresenter {
    pub fn new(tx: mpsc::Sender<FireEvent>) -> Self {
        Self {
            ringing: AtomicBool::new(false),
            current: Mutex::new(None),
            tx,
        }
    }

    fn begin(&self, name: PrayerName) {
        *self.current.lock().unwrap_or_else(|p| p.into_inner()) = Some(name);
        self.ringing.store(true, Ordering::SeqCst);
    }

    fn ringing_prayer(&self) -> Option<PrayerName> {
        if !self.ringing.load(Ordering::SeqCst) {
            return None;
        }
        *self.current.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Presenter for DaemonPresenter {
    fn present(&self, event: FireEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| anyhow::anyhow!("daemon main loop has stopped"))
    }

    fn stop(&self) {
        self.ringing.store(false, Ordering::SeqCst);
    }
}

/// Keeps the armed timers in line with the store: re-arms on start, after
/// every fire, on a new day and whenever another command edits the store.
struct Daemon<'a> {
    store: Arc<dyn AlarmStore>,
    scheduler: Arc<Scheduler>,
    recovery: Recovery,
    board: Arc<AlarmBoard>,
    config: &'a AppConfig,
    day: NaiveDate,
    seen: Option<i64>,
    /// Entries as last handed to the scheduler.
    known: Vec<PrayerEntry>,
}

impl<'a> Daemon<'a> {
    fn new(
        store: Arc<dyn AlarmStore>,
        timer: Arc<dyn WakeTimer>,
        board: Arc<AlarmBoard>,
        config: &'a AppConfig,
        now: DateTime<Local>,
    ) -> Self {
        let scheduler = Arc::new(Scheduler::new(Arc::clone(&store), timer, Arc::clone(&board)));
        let recovery = Recovery::new(Arc::clone(&store), Arc::clone(&scheduler));
        Self {
            store,
            scheduler,
            recovery,
            board,
            config,
            day: now.date_naive(),
            seen: None,
            known: Vec::new(),
        }
    }

    fn start_at(&mut self, now: DateTime<Local>) -> Result<()> {
        self.seen = self.store.last_updated()?;
        match self.recovery.on_restart(now)? {
            Some(report) => {
                self.record(&report);
                self.known = self.store.entries()?;
            }
            None if self.config.alarm.auto_refresh => return self.refresh_at(now),
            None => {
                log::warn!("Prayer times incomplete; run `azan-alarm refresh` or enable auto_refresh");
                self.known.clear();
            }
        }
        self.log_next();
        Ok(())
    }

    fn refresh_at(&mut self, now: DateTime<Local>) -> Result<()> {
        log::info!("Refreshing prayer times for {}", now.date_naive());
        let entries = refresh_entries(&*self.store, self.config, now.date_naive())?;
        let report = self.scheduler.schedule_all(&entries, now)?;
        self.day = now.date_naive();
        self.record(&report);
        self.known = self.store.entries()?;
        self.log_next();
        Ok(())
    }

    fn record(&mut self, report: &ScheduleReport) {
        for (name, err) in report.failures() {
            log::warn!("{}: {}", name, err);
        }
        log::debug!("{} alarms armed in this pass", report.armed_count());
        if let Some(stamp) = report.stamp {
            self.seen = Some(stamp);
        }
    }

    /// Push edits made by other commands through the scheduler, one entry at
    /// a time: toggles via `set_enabled`, removals via `cancel`, new or moved
    /// times via `schedule_all`.
    fn apply_changes(&mut self, now: DateTime<Local>) -> Result<()> {
        if self.config.alarm.auto_refresh && self.store.core_set()?.is_none() {
            return self.refresh_at(now);
        }

        let current = self.store.entries()?;
        let known = std::mem::take(&mut self.known);
        let mut batch = Vec::new();
        for name in PrayerName::all() {
            let before = known.iter().find(|e| e.name == name);
            let after = current.iter().find(|e| e.name == name);
            match (before, after) {
                (Some(_), None) => self.scheduler.cancel(name)?,
                (Some(old), Some(new)) if old.time == new.time && old.enabled != new.enabled => {
                    let report = self.scheduler.set_enabled(name, new.enabled, now)?;
                    self.record(&report);
                }
                (old, Some(new)) if old != Some(new) => batch.push(new.clone()),
                _ => {}
            }
        }
        if !batch.is_empty() {
            let report = self.scheduler.schedule_all(&batch, now)?;
            self.record(&report);
        }
        self.known = current;
        self.log_next();
        Ok(())
    }

    /// Called between fires: handles the day rolling over and edits made by
    /// other processes.
    fn tick_at(&mut self, now: DateTime<Local>) -> Result<()> {
        if now.date_naive() != self.day {
            self.day = now.date_naive();
            if self.config.alarm.auto_refresh {
                return self.refresh_at(now);
            }
        }
        let stamp = self.store.last_updated()?;
        if stamp != self.seen {
            log::info!("Alarm store changed; re-syncing");
            self.seen = stamp;
            self.apply_changes(now)?;
        }
        Ok(())
    }

    /// One-shot timers: a prayer that just rang is armed again for its next
    /// occurrence.
    fn rearm_at(&mut self, name: PrayerName, now: DateTime<Local>) -> Result<()> {
        if now.date_naive() != self.day && self.config.alarm.auto_refresh {
            return self.refresh_at(now);
        }
        match self.store.get(name)? {
            Some(entry) if entry.enabled => {
                let report = self.scheduler.schedule_all(std::slice::from_ref(&entry), now)?;
                self.record(&report);
                self.known.retain(|e| e.name != name);
                self.known.push(entry);
                self.log_next();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Close the alarm screen when the prayer it is ringing for gets switched
    /// off or removed.
    fn silence_if_switched_off(&self, presenter: &DaemonPresenter, dispatcher: &Dispatcher) -> Result<()> {
        let Some(name) = presenter.ringing_prayer() else {
            return Ok(());
        };
        match self.store.get(name)? {
            Some(entry) if entry.enabled => {}
            _ => {
                log::info!("{} was switched off while ringing", name);
                dispatcher.dismiss();
            }
        }
        Ok(())
    }

    fn log_next(&self) {
        let next = self
            .board
            .snapshot()
            .into_iter()
            .filter_map(|(name, state)| match state {
                AlarmState::Armed { at } => Some((name, at)),
                _ => None,
            })
            .min_by_key(|(_, at)| *at);
        match next {
            Some((name, at)) => log::info!("Next alarm: {} at {}", name, at.format("%Y-%m-%d %H:%M")),
            None => log::info!("No alarms armed"),
        }
    }
}

fn lock<'m, 'a>(daemon: &'m Mutex<Daemon<'a>>) -> MutexGuard<'m, Daemon<'a>> {
    daemon.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Run the alarm daemon until the process is killed.
pub fn run(store: Arc<dyn AlarmStore>, config: &AppConfig, headless: bool) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let presenter = Arc::new(DaemonPresenter::new(tx));
    let board = Arc::new(AlarmBoard::new());
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&store),
        Arc::clone(&board),
        Arc::clone(&presenter) as Arc<dyn Presenter>,
    ));
    let timer = Arc::new(ThreadTimer::spawn(dispatcher.handler()).context("Starting alarm timer")?);

    let daemon = Mutex::new(Daemon::new(
        store,
        Arc::clone(&timer) as Arc<dyn WakeTimer>,
        board,
        config,
        Local::now(),
    ));
    lock(&daemon).start_at(Local::now()).context("Arming stored alarms")?;
    log::info!("Alarm daemon running");
    println!("azan-alarm is running. Press Ctrl+C to stop.");

    let poll = Duration::from_secs(config.alarm.poll_secs.max(1));
    let halt = AtomicBool::new(false);
    thread::scope(|scope| {
        // Store sync keeps running while the main thread has an alarm on screen.
        scope.spawn(|| {
            while !halt.load(Ordering::SeqCst) {
                thread::sleep(poll);
                let mut daemon = lock(&daemon);
                if let Err(err) = daemon.tick_at(Local::now()) {
                    log::error!("Alarm re-sync failed: {:#}", err);
                }
                if let Err(err) = daemon.silence_if_switched_off(&presenter, &dispatcher) {
                    log::error!("Could not check the ringing alarm: {:#}", err);
                }
            }
        });

        for event in rx.iter() {
            let name = event.name;
            present(&event, &presenter, &dispatcher, config, headless);
            if let Err(err) = lock(&daemon).rearm_at(name, Local::now()) {
                log::error!("Could not re-arm {}: {:#}", name, err);
            }
        }
        halt.store(true, Ordering::SeqCst);
    });

    timer.shutdown();
    Ok(())
}

fn present(
    event: &FireEvent,
    presenter: &DaemonPresenter,
    dispatcher: &Dispatcher,
    config: &AppConfig,
    headless: bool,
) {
    let use_24h = config.alarm.time_format_24h;
    presenter.begin(event.name);

    if config.alarm.desktop_notifications {
        if let Err(err) = notification::post(event, use_24h) {
            log::error!("Notification failed: {:#}", err);
        }
    }

    if headless || !config.alarm.fullscreen {
        println!(
            "{}  {} ({})",
            event.fired_at.format("%Y-%m-%d %H:%M"),
            notification::title(event),
            event.time
        );
        presenter.stop();
        return;
    }

    match alarm_screen::run(event, &presenter.ringing, config.alarm.ring, use_24h) {
        Ok(AlarmOutcome::Dismissed) => dispatcher.dismiss(),
        Ok(AlarmOutcome::Snoozed) => dispatcher.snooze(),
        Ok(AlarmOutcome::Stopped) => log::info!("{} alarm closed after being switched off", event.name),
        Err(err) => {
            log::error!("Alarm screen failed: {:#}", err);
            dispatcher.dismiss();
        }
    }
}
