pub mod dispatcher;
pub mod normalize;
pub mod recovery;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod timer;
pub mod trigger;

pub use dispatcher::{Dispatcher, FireEvent, Presenter};
pub use recovery::Recovery;
pub use scheduler::{ScheduleReport, Scheduler};
pub use state::{AlarmBoard, AlarmState};
pub use store::{AlarmStore, SqliteAlarmStore};
pub use timer::{ThreadTimer, WakeTimer};
