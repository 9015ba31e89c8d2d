//! # AppShell Common
//!
//! Logging configuration and setup shared by the AppShell offline cache crates.
//!
//! ## Features
//!
//! - Logging configuration with env-filter support
//! - Pretty, compact, and JSON output formats

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};
