//! Logging module
//!
//! The backend implementation is in `logger.rs`.

pub mod logger;

pub use logger::set_log_level;
