//! Use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and provider calls into use-case level APIs.
//! - Keep callers decoupled from storage details.

use std::time::{SystemTime, UNIX_EPOCH};

pub mod alert_service;
pub mod change_manager;

/// Current wall-clock time in epoch milliseconds.
///
/// Clamps to 0 if the system clock is before the Unix epoch.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
