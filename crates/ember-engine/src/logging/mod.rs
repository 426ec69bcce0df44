//! Logging utilities.
//!
//! This module centralizes logger initialization. Library code only ever talks
//! to the `log` facade; `env_logger` is wired up here for binaries.

mod init;

pub use init::{LoggingConfig, init_logging};
