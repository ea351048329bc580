//! Domain model for alerts and queued calendar changes.
//!
//! # Responsibility
//! - Define the records persisted by the alert store and change queue.
//! - Keep merge rules next to the data they apply to.
//!
//! # Invariants
//! - Times are Unix epoch milliseconds throughout.
//! - Alert identity is `(event_id, instance_start_time)`.

pub mod change_request;
pub mod event_alert;
