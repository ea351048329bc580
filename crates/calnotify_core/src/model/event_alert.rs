//! Event alert domain model.
//!
//! # Responsibility
//! - Define the stored shape of one fired reminder (an event instance).
//! - Provide field-level merge helpers used when calendar data changes.
//!
//! # Invariants
//! - `(event_id, instance_start_time)` identifies at most one stored alert.
//! - `snoozed_until == 0` means the alert is not snoozed.
//! - All time fields are Unix epoch milliseconds.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// How the alert is currently presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventDisplayStatus {
    /// Not shown (pending display or snoozed).
    #[default]
    Hidden,
    /// Shown as a full notification.
    DisplayedNormal,
    /// Folded into the collapsed summary notification.
    DisplayedCollapsed,
}

/// Returned when a persisted display status code is out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownDisplayStatus(pub i64);

impl Display for UnknownDisplayStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown display status code {}", self.0)
    }
}

impl Error for UnknownDisplayStatus {}

impl EventDisplayStatus {
    /// Integer code used by the `events` table.
    pub fn code(self) -> i64 {
        match self {
            Self::Hidden => 0,
            Self::DisplayedNormal => 1,
            Self::DisplayedCollapsed => 2,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, UnknownDisplayStatus> {
        match code {
            0 => Ok(Self::Hidden),
            1 => Ok(Self::DisplayedNormal),
            2 => Ok(Self::DisplayedCollapsed),
            other => Err(UnknownDisplayStatus(other)),
        }
    }
}

/// Event snapshot as reported by the calendar provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub calendar_id: i64,
    pub event_id: i64,
    pub title: String,
    pub start_time: i64,
    pub end_time: i64,
    pub location: String,
    /// Packed ARGB color.
    #[serde(default)]
    pub color: i32,
}

/// Storage key of one alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventAlertKey {
    pub event_id: i64,
    /// Zero for non-repeating events.
    pub instance_start_time: i64,
}

impl EventAlertKey {
    pub fn new(event_id: i64, instance_start_time: i64) -> Self {
        Self {
            event_id,
            instance_start_time,
        }
    }
}

impl Display for EventAlertKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.event_id, self.instance_start_time)
    }
}

/// One pending or snoozed reminder for an event instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAlertRecord {
    pub calendar_id: i64,
    pub event_id: i64,
    pub is_repeating: bool,
    #[serde(default)]
    pub is_all_day: bool,
    /// When the reminder fired.
    pub alert_time: i64,
    /// Zero until the store assigns one.
    pub notification_id: i32,
    pub title: String,
    pub start_time: i64,
    pub end_time: i64,
    pub instance_start_time: i64,
    pub instance_end_time: i64,
    pub location: String,
    /// Last time the alert was shown or acted upon.
    pub last_event_visibility: i64,
    #[serde(default)]
    pub snoozed_until: i64,
    #[serde(default)]
    pub display_status: EventDisplayStatus,
    #[serde(default)]
    pub color: i32,
}

impl EventAlertRecord {
    /// Creates an alert for a single (non-repeating) event occurrence.
    ///
    /// Instance times mirror the event times; notification id is left for
    /// the store to assign.
    pub fn new(
        calendar_id: i64,
        event_id: i64,
        title: impl Into<String>,
        start_time: i64,
        end_time: i64,
        alert_time: i64,
    ) -> Self {
        Self {
            calendar_id,
            event_id,
            is_repeating: false,
            is_all_day: false,
            alert_time,
            notification_id: 0,
            title: title.into(),
            start_time,
            end_time,
            instance_start_time: start_time,
            instance_end_time: end_time,
            location: String::new(),
            last_event_visibility: 0,
            snoozed_until: 0,
            display_status: EventDisplayStatus::Hidden,
            color: 0,
        }
    }

    pub fn key(&self) -> EventAlertKey {
        EventAlertKey::new(self.event_id, self.instance_start_time)
    }

    pub fn is_snoozed(&self) -> bool {
        self.snoozed_until != 0
    }

    /// Start time to present: the instance start when known.
    pub fn displayed_start_time(&self) -> i64 {
        if self.instance_start_time != 0 {
            self.instance_start_time
        } else {
            self.start_time
        }
    }

    pub fn displayed_end_time(&self) -> i64 {
        if self.instance_end_time != 0 {
            self.instance_end_time
        } else {
            self.end_time
        }
    }

    /// Merges tracked fields from a freshly fired alert.
    ///
    /// Returns `true` when at least one field differed. Every differing
    /// field is copied, not only the first.
    pub fn update_from(&mut self, other: &EventAlertRecord) -> bool {
        let mut changed = false;
        changed |= assign_if_changed(&mut self.title, &other.title);
        changed |= assign_if_changed(&mut self.alert_time, &other.alert_time);
        changed |= assign_if_changed(&mut self.start_time, &other.start_time);
        changed |= assign_if_changed(&mut self.end_time, &other.end_time);
        changed |= assign_if_changed(&mut self.location, &other.location);
        changed |= assign_if_changed(&mut self.color, &other.color);
        // Rows written before repeat tracking existed carry a stale flag.
        changed |= assign_if_changed(&mut self.is_repeating, &other.is_repeating);
        changed
    }

    /// Merges tracked fields from a calendar provider snapshot.
    pub fn update_from_event(&mut self, event: &EventRecord) -> bool {
        let mut changed = false;
        changed |= assign_if_changed(&mut self.title, &event.title);
        changed |= assign_if_changed(&mut self.start_time, &event.start_time);
        changed |= assign_if_changed(&mut self.end_time, &event.end_time);
        changed |= assign_if_changed(&mut self.color, &event.color);
        changed
    }
}

fn assign_if_changed<T: PartialEq + Clone>(target: &mut T, value: &T) -> bool {
    if target == value {
        return false;
    }
    *target = value.clone();
    true
}
