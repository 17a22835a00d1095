pub mod core;
pub mod omr;
pub mod setup;
pub mod timetable;
