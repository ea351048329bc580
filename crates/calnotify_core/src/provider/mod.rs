//! Calendar provider boundary.
//!
//! # Responsibility
//! - Define the calls the change manager makes against a calendar backend.
//! - Carry provider failures as data so callers can queue a retry.
//!
//! # Invariants
//! - Implementations must not panic; failures are returned as `ProviderError`.
//! - `create_event` returns the provider-assigned event id (never `-1`).

use crate::model::change_request::CalendarEventDetails;
use crate::model::event_alert::EventRecord;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Failure reported by a calendar provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub provider_id: String,
    /// Stable machine-readable code, e.g. `event_not_found`.
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(
        provider_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "provider `{}` failed with {}: {}",
            self.provider_id, self.code, self.message
        )
    }
}

impl Error for ProviderError {}

/// Calendar backend used to apply queued changes.
pub trait CalendarProvider {
    fn provider_id(&self) -> &str;
    /// Whether the process may currently write to the calendar.
    fn has_write_access(&self) -> bool;
    fn create_event(&self, calendar_id: i64, details: &CalendarEventDetails)
        -> ProviderResult<i64>;
    fn move_event(&self, event_id: i64, start_time: i64, end_time: i64) -> ProviderResult<()>;
    /// `Ok(None)` when the event no longer exists.
    fn get_event(&self, event_id: i64) -> ProviderResult<Option<EventRecord>>;
}

impl<P: CalendarProvider + ?Sized> CalendarProvider for &P {
    fn provider_id(&self) -> &str {
        (**self).provider_id()
    }

    fn has_write_access(&self) -> bool {
        (**self).has_write_access()
    }

    fn create_event(
        &self,
        calendar_id: i64,
        details: &CalendarEventDetails,
    ) -> ProviderResult<i64> {
        (**self).create_event(calendar_id, details)
    }

    fn move_event(&self, event_id: i64, start_time: i64, end_time: i64) -> ProviderResult<()> {
        (**self).move_event(event_id, start_time, end_time)
    }

    fn get_event(&self, event_id: i64) -> ProviderResult<Option<EventRecord>> {
        (**self).get_event(event_id)
    }
}
