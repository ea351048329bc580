//! Calendar change request model.
//!
//! # Responsibility
//! - Describe one queued mutation against the calendar provider.
//! - Keep before/after event snapshots for later reconciliation.
//!
//! # Invariants
//! - `id` is `None` until the request is persisted.
//! - `event_id` is `-1` for creations the provider has not accepted yet.

use serde::{Deserialize, Serialize};

/// Event id placeholder for requests whose event does not exist yet.
pub const UNASSIGNED_EVENT_ID: i64 = -1;

/// Store-assigned change request id.
pub type ChangeRequestId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeRequestKind {
    CreateEvent,
    MoveExistingEvent,
}

/// Delivery state of a queued change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeRequestStatus {
    /// Not accepted by the provider yet; due for retry.
    Dirty,
    /// Accepted by the provider; awaiting confirmation in calendar data.
    Synced,
    /// Gave up after repeated provider failures.
    Failed,
}

/// Reminder attached to a created event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventReminder {
    /// Milliseconds before event start.
    pub offset_ms: i64,
    pub is_email: bool,
}

/// Event fields written to the calendar provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalendarEventDetails {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: i64,
    pub end_time: i64,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub color: i32,
    #[serde(default)]
    pub reminders: Vec<EventReminder>,
}

/// One queued calendar mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarChangeRequest {
    pub id: Option<ChangeRequestId>,
    pub kind: ChangeRequestKind,
    pub event_id: i64,
    pub calendar_id: i64,
    pub status: ChangeRequestStatus,
    pub details: CalendarEventDetails,
    pub old_details: CalendarEventDetails,
    /// Provider failures observed while retrying.
    pub retry_count: u32,
    pub created_at: i64,
}

impl CalendarChangeRequest {
    /// Builds a `Dirty` request that creates a new event in `calendar_id`.
    pub fn create_event(calendar_id: i64, details: CalendarEventDetails, created_at: i64) -> Self {
        Self {
            id: None,
            kind: ChangeRequestKind::CreateEvent,
            event_id: UNASSIGNED_EVENT_ID,
            calendar_id,
            status: ChangeRequestStatus::Dirty,
            old_details: CalendarEventDetails::default(),
            details,
            retry_count: 0,
            created_at,
        }
    }

    /// Builds a `Dirty` request that moves an existing event.
    pub fn move_event(
        event_id: i64,
        calendar_id: i64,
        old_details: CalendarEventDetails,
        details: CalendarEventDetails,
        created_at: i64,
    ) -> Self {
        Self {
            id: None,
            kind: ChangeRequestKind::MoveExistingEvent,
            event_id,
            calendar_id,
            status: ChangeRequestStatus::Dirty,
            details,
            old_details,
            retry_count: 0,
            created_at,
        }
    }
}
