use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::models::{PrayerName, TimerId};

/// Upper bound on how long the worker sleeps before re-reading the wall
/// clock. Keeps deadlines honest across suspend and clock changes.
const MAX_SLEEP: Duration = Duration::from_secs(30);

/// What a timer carries back to the dispatcher when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerPayload {
    pub name: PrayerName,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    Denied(String),
}

impl std::fmt::Display for TimerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerError::Denied(reason) => write!(f, "{}", reason),
        }
    }
}

/// One-shot wake timers keyed by a stable id. Arming an id that is already
/// armed replaces the earlier registration.
pub trait WakeTimer: Send + Sync {
    fn arm(&self, id: TimerId, at: DateTime<Local>, payload: TimerPayload)
    -> Result<(), TimerError>;

    fn cancel(&self, id: TimerId);
}

pub type TimerHandler = Arc<dyn Fn(TimerPayload) + Send + Sync>;

enum Command {
    Arm {
        id: TimerId,
        at: DateTime<Local>,
        payload: TimerPayload,
    },
    Cancel(TimerId),
    Shutdown,
}

struct Pending {
    at: DateTime<Local>,
    payload: TimerPayload,
}

/// In-process timer backend: a single worker thread holding at most one
/// pending deadline per id.
pub struct ThreadTimer {
    tx: mpsc::Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadTimer {
    pub fn spawn(handler: TimerHandler) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("alarm-timer".to_string())
            .spawn(move || run_worker(rx, handler))?;

        Ok(Self {
            tx,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Stop the worker and wait for it. Pending timers are dropped; later
    /// `arm` calls are refused.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                log::error!("Alarm timer worker panicked");
            }
        }
    }
}

impl WakeTimer for ThreadTimer {
    fn arm(
        &self,
        id: TimerId,
        at: DateTime<Local>,
        payload: TimerPayload,
    ) -> Result<(), TimerError> {
        if at <= Local::now() {
            return Err(TimerError::Denied(format!(
                "trigger instant {} is not in the future",
                at.format("%Y-%m-%d %H:%M")
            )));
        }
        self.tx
            .send(Command::Arm { id, at, payload })
            .map_err(|_| TimerError::Denied("timer worker has stopped".to_string()))
    }

    fn cancel(&self, id: TimerId) {
        let _ = self.tx.send(Command::Cancel(id));
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}

fn run_worker(rx: mpsc::Receiver<Command>, handler: TimerHandler) {
    let mut pending: HashMap<TimerId, Pending> = HashMap::new();

    loop {
        let now = Local::now();
        let due: Vec<TimerId> = pending
            .iter()
            .filter(|(_, p)| p.at <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in due {
            if let Some(p) = pending.remove(&id) {
                log::debug!("Timer {} due for {}", id, p.payload.name);
                fire(&handler, p.payload);
            }
        }

        let wait = pending
            .values()
            .map(|p| p.at)
            .min()
            .map(|at| (at - Local::now()).to_std().unwrap_or(Duration::ZERO))
            .unwrap_or(MAX_SLEEP)
            .min(MAX_SLEEP);

        match rx.recv_timeout(wait) {
            Ok(Command::Arm { id, at, payload }) => {
                pending.insert(id, Pending { at, payload });
            }
            Ok(Command::Cancel(id)) => {
                pending.remove(&id);
            }
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
    log::debug!("Alarm timer worker stopped");
}

fn fire(handler: &TimerHandler, payload: TimerPayload) {
    let name = payload.name;
    if panic::catch_unwind(AssertUnwindSafe(|| handler(payload))).is_err() {
        log::error!("Alarm handler for {} panicked", name);
    }
}
