pub mod alarm;
pub mod events;
pub mod theme;
