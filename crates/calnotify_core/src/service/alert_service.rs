//! Alert lifecycle use-cases.
//!
//! # Responsibility
//! - Register fired reminders, merging repeats into the stored alert.
//! - Snooze, dismiss and list alerts.
//! - Apply calendar-side edits to stored alerts.
//! - Dismiss alerts whose event was moved well into the future.
//!
//! # Invariants
//! - A fired alert for a stored key updates that row; it never duplicates it.
//! - Snoozing always targets a time after `now`.

use crate::config::{CalNotifyConfig, DEFAULT_EVENT_MOVED_THRESHOLD_MS};
use crate::model::event_alert::{EventAlertKey, EventAlertRecord, EventDisplayStatus, EventRecord};
use crate::repo::alert_repo::EventAlertRepository;
use crate::repo::{RepoError, RepoResult};
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum AlertServiceError {
    AlertNotFound(EventAlertKey),
    SnoozeInPast { until: i64, now: i64 },
    Repo(RepoError),
}

impl Display for AlertServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlertNotFound(key) => write!(f, "alert not found: {key}"),
            Self::SnoozeInPast { until, now } => {
                write!(f, "snooze target {until} is not after now ({now})")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AlertServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AlertServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(key) => Self::AlertNotFound(key),
            other => Self::Repo(other),
        }
    }
}

/// Outcome of registering a fired reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredAlert {
    pub alert: EventAlertRecord,
    /// `false` when the alert is new.
    pub was_stored: bool,
    /// Whether any tracked field of a stored alert changed.
    pub changed: bool,
}

pub struct AlertService<R: EventAlertRepository> {
    repo: R,
    alarm_threshold_ms: i64,
    event_moved_threshold_ms: i64,
}

impl<R: EventAlertRepository> AlertService<R> {
    pub fn new(repo: R, alarm_threshold_ms: i64) -> Self {
        Self {
            repo,
            alarm_threshold_ms,
            event_moved_threshold_ms: DEFAULT_EVENT_MOVED_THRESHOLD_MS,
        }
    }

    pub fn from_config(repo: R, config: &CalNotifyConfig) -> Self {
        Self {
            repo,
            alarm_threshold_ms: config.alarm_threshold_ms,
            event_moved_threshold_ms: config.event_moved_threshold_ms,
        }
    }

    /// Records a reminder that just fired.
    ///
    /// A stored alert for the same key is merged with `update_from`, un-snoozed
    /// and reset to `Hidden` so it is shown again.
    pub fn register_fired_alert(
        &self,
        alert: &EventAlertRecord,
    ) -> Result<RegisteredAlert, AlertServiceError> {
        let key = alert.key();
        // Lookup by instance 0 matches any instance; only an exact key merges.
        let existing = self
            .repo
            .get_alert(key.event_id, key.instance_start_time)?
            .filter(|stored| stored.instance_start_time == key.instance_start_time);

        match existing {
            Some(mut stored) => {
                let changed = stored.update_from(alert);
                stored.snoozed_until = 0;
                stored.display_status = EventDisplayStatus::Hidden;
                stored.last_event_visibility = alert.last_event_visibility;
                self.repo.update_alert(&stored)?;
                info!(
                    "event=alert_fired module=service status=ok key={} stored=true changed={}",
                    key, changed
                );
                Ok(RegisteredAlert {
                    alert: stored,
                    was_stored: true,
                    changed,
                })
            }
            None => {
                let stored = self.repo.add_alert(alert)?;
                info!(
                    "event=alert_fired module=service status=ok key={} stored=false notification_id={}",
                    key, stored.notification_id
                );
                Ok(RegisteredAlert {
                    alert: stored,
                    was_stored: false,
                    changed: true,
                })
            }
        }
    }

    /// Defers one alert until `until`.
    pub fn snooze(
        &self,
        key: EventAlertKey,
        until: i64,
        now: i64,
    ) -> Result<EventAlertRecord, AlertServiceError> {
        if until <= now {
            return Err(AlertServiceError::SnoozeInPast { until, now });
        }

        let mut alert = self
            .repo
            .get_alert(key.event_id, key.instance_start_time)?
            .ok_or(AlertServiceError::AlertNotFound(key))?;
        apply_snooze(&mut alert, until, now);
        self.repo.update_alert(&alert)?;
        info!(
            "event=alert_snooze module=service status=ok key={} delay_ms={}",
            key,
            until - now
        );
        Ok(alert)
    }

    /// Snoozes every currently active alert; returns how many were snoozed.
    pub fn snooze_all(&self, until: i64, now: i64) -> Result<usize, AlertServiceError> {
        if until <= now {
            return Err(AlertServiceError::SnoozeInPast { until, now });
        }

        let mut alerts = self.active_alerts(now)?;
        for alert in &mut alerts {
            apply_snooze(alert, until, now);
        }
        let snoozed = self.repo.update_alerts(&alerts)?;
        info!("event=alert_snooze_all module=service status=ok count={snoozed}");
        Ok(snoozed)
    }

    /// Removes an alert; returns whether it existed.
    pub fn dismiss(&self, key: EventAlertKey) -> Result<bool, AlertServiceError> {
        let removed = self
            .repo
            .delete_alert(key.event_id, key.instance_start_time)?;
        info!(
            "event=alert_dismiss module=service status=ok key={} removed={}",
            key, removed
        );
        Ok(removed)
    }

    /// Applies a calendar snapshot to every stored instance of that event.
    ///
    /// Returns the number of alerts that changed.
    pub fn reconcile_with_calendar(&self, event: &EventRecord) -> Result<usize, AlertServiceError> {
        let mut changed = Vec::new();
        for mut alert in self.repo.list_alerts()? {
            if alert.event_id != event.event_id {
                continue;
            }
            if alert.update_from_event(event) {
                changed.push(alert);
            }
        }

        let updated = if changed.is_empty() {
            0
        } else {
            self.repo.update_alerts(&changed)?
        };
        debug!(
            "event=alert_reconcile module=service status=ok event_id={} changed={}",
            event.event_id, updated
        );
        Ok(updated)
    }

    /// Dismisses alerts of `event` once the calendar shows it moved forward
    /// by at least the moved-event threshold and starting after `now`.
    ///
    /// Repeating alerts are left alone since their instance times do not
    /// follow the event's start. Returns the number dismissed.
    pub fn dismiss_moved_alerts(
        &self,
        event: &EventRecord,
        now: i64,
    ) -> Result<usize, AlertServiceError> {
        let mut dismissed = 0;
        for alert in self.repo.list_alerts()? {
            if alert.event_id != event.event_id || alert.is_repeating {
                continue;
            }
            let moved_by = event.start_time.saturating_sub(alert.start_time);
            if moved_by < self.event_moved_threshold_ms
                || event.start_time <= now.saturating_add(self.alarm_threshold_ms)
            {
                continue;
            }
            if self
                .repo
                .delete_alert(alert.event_id, alert.instance_start_time)?
            {
                dismissed += 1;
            }
        }
        info!(
            "event=alert_dismiss_moved module=service status=ok event_id={} dismissed={}",
            event.event_id, dismissed
        );
        Ok(dismissed)
    }

    pub fn mark_displayed(
        &self,
        key: EventAlertKey,
        status: EventDisplayStatus,
    ) -> Result<(), AlertServiceError> {
        let mut alert = self
            .repo
            .get_alert(key.event_id, key.instance_start_time)?
            .ok_or(AlertServiceError::AlertNotFound(key))?;
        alert.display_status = status;
        self.repo.update_alert(&alert)?;
        Ok(())
    }

    pub fn active_alerts(&self, now: i64) -> RepoResult<Vec<EventAlertRecord>> {
        self.repo.list_active_alerts(now, self.alarm_threshold_ms)
    }

    pub fn all_alerts(&self) -> RepoResult<Vec<EventAlertRecord>> {
        self.repo.list_alerts()
    }

    pub fn get_alert(&self, key: EventAlertKey) -> RepoResult<Option<EventAlertRecord>> {
        self.repo.get_alert(key.event_id, key.instance_start_time)
    }
}

fn apply_snooze(alert: &mut EventAlertRecord, until: i64, now: i64) {
    alert.snoozed_until = until;
    alert.last_event_visibility = now;
    alert.display_status = EventDisplayStatus::Hidden;
}
