//! Event alert store and calendar change manager.
//!
//! Persists fired calendar reminders, merges calendar edits into them, and
//! queues event creations/moves against a calendar provider with retry.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod provider;
pub mod repo;
pub mod service;

pub use config::{load_config, CalNotifyConfig, ConfigError, DEFAULT_EVENT_MOVED_THRESHOLD_MS};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::change_request::{
    CalendarChangeRequest, CalendarEventDetails, ChangeRequestId, ChangeRequestKind,
    ChangeRequestStatus, EventReminder, UNASSIGNED_EVENT_ID,
};
pub use model::event_alert::{
    EventAlertKey, EventAlertRecord, EventDisplayStatus, EventRecord, UnknownDisplayStatus,
};
pub use provider::{CalendarProvider, ProviderError, ProviderResult};
pub use repo::alert_repo::{EventAlertRepository, SqliteEventAlertRepository};
pub use repo::change_request_repo::{ChangeRequestRepository, SqliteChangeRequestRepository};
pub use repo::{RepoError, RepoResult};
pub use service::alert_service::{AlertService, AlertServiceError, RegisteredAlert};
pub use service::change_manager::{
    compute_moved_times, ChangeManager, ChangeManagerError, MovedTimes, ReconcileReport,
    RetryReport,
};
pub use service::now_epoch_ms;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
