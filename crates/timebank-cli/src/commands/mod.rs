pub mod breaker;
pub mod config;
pub mod entry;
pub mod holiday;
pub mod schedule;
pub mod toil;
