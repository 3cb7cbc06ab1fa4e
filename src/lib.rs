pub mod command;
pub mod config;
pub mod drive;
pub mod hal;
pub mod messages;
pub mod runtime;
pub mod telemetry;
