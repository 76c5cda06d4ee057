use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event as CEvent, KeyEvent, KeyEventKind};

#[derive(Debug)]
pub enum Event {
    Key(KeyEvent),
    Tick,
}

/// Reads terminal input on a background thread. The thread stops when the
/// handler is dropped, so it does not keep swallowing keys once the alarm
/// screen has closed.
pub struct EventHandler {
    rx: mpsc::Receiver<Event>,
    halt: Arc<AtomicBool>,
}

impl EventHandler {
    pub fn new(tick_rate_ms: u64) -> Self {
        let (tx, rx) = mpsc::channel();
        let tick_rate = Duration::from_millis(tick_rate_ms);
        let halt = Arc::new(AtomicBool::new(false));
        let halted = Arc::clone(&halt);

        thread::spawn(move || {
            let mut last_tick = std::time::Instant::now();
            while !halted.load(Ordering::SeqCst) {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::ZERO)
                    .min(Duration::from_millis(100));

                if event::poll(timeout).unwrap_or(false) {
                    match event::read() {
                        // Only key presses; some terminals also report release/repeat
                        Ok(CEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                            if tx.send(Event::Key(key)).is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(_) => break,
                    }
                }

                if last_tick.elapsed() >= tick_rate {
                    if tx.send(Event::Tick).is_err() {
                        break;
                    }
                    last_tick = std::time::Instant::now();
                }
            }
        });

        Self { rx, halt }
    }

    pub fn next(&self) -> Result<Event, mpsc::RecvError> {
        self.rx.recv()
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.halt.store(true, Ordering::SeqCst);
    }
}
