//! Logging setup for rkv binaries.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the process. The format is controlled via `RKV_LOG_FORMAT`:
//! - `json` - Structured JSON output (for ELK/Loki)
//! - `pretty` - Human-readable multi-line output (default for TTY)
//! - `compact` - Compact single-line format
//!
//! The filter comes from `RKV_LOG_LEVEL`, then `RUST_LOG`, then `info`.
//!
//! # Example
//!
//! ```ignore
//! use rkv_cluster::observability::{LogConfig, init_logging};
//!
//! init_logging(&LogConfig::from_env())?;
//! ```

mod config;
mod setup;

pub use config::{LogConfig, LogConfigBuilder, LogFormat, verbosity_filter};
pub use setup::init_logging;
