//! Configuration Module
//!
//! Configuration loading for the datafeed runner.

mod settings;

pub use settings::{ConfigError, DatafeedConfig, DatafeedSettings, DemoSettings, ServerSettings};
