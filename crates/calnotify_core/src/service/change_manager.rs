//! Calendar change orchestration.
//!
//! # Responsibility
//! - Queue create/move requests, apply them through a `CalendarProvider`,
//!   and record the outcome.
//! - Retry requests the provider rejected and drop requests the calendar
//!   has confirmed.
//!
//! # Invariants
//! - A request is persisted before the provider is called, so a crash or a
//!   provider failure always leaves it queued.
//! - Moves always land in the future: past-due events are rolled forward by
//!   whole increments.
//! - At most one queued request exists per moved event.

use crate::config::CalNotifyConfig;
use crate::model::change_request::{
    CalendarChangeRequest, CalendarEventDetails, ChangeRequestKind, ChangeRequestStatus,
};
use crate::model::event_alert::{EventAlertRecord, EventRecord};
use crate::provider::{CalendarProvider, ProviderResult};
use crate::repo::alert_repo::EventAlertRepository;
use crate::repo::change_request_repo::ChangeRequestRepository;
use crate::repo::RepoError;
use crate::service::now_epoch_ms;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ChangeManagerError {
    /// Move increment must be positive.
    InvalidMoveIncrement(i64),
    Repo(RepoError),
}

impl Display for ChangeManagerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMoveIncrement(value) => {
                write!(f, "move increment must be positive, got {value} ms")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ChangeManagerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::InvalidMoveIncrement(_) => None,
        }
    }
}

impl From<RepoError> for ChangeManagerError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

pub type ChangeResult<T> = Result<T, ChangeManagerError>;

/// New event bounds produced by a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovedTimes {
    pub start_time: i64,
    pub end_time: i64,
    /// Number of `add_time_ms` increments applied.
    pub units: i64,
}

/// Shifts an event by `add_time_ms`, or by as many whole increments as
/// needed for the new start to lie past `now + alarm_threshold_ms`.
///
/// Returns `None` for a non-positive `add_time_ms`.
pub fn compute_moved_times(
    start_time: i64,
    end_time: i64,
    add_time_ms: i64,
    now: i64,
    alarm_threshold_ms: i64,
) -> Option<MovedTimes> {
    if add_time_ms <= 0 {
        return None;
    }
    let past_due_ms = now
        .saturating_add(alarm_threshold_ms)
        .saturating_sub(start_time);
    let units = if past_due_ms > 0 {
        past_due_ms / add_time_ms + 1
    } else {
        1
    };
    let shift = add_time_ms.saturating_mul(units);
    Some(MovedTimes {
        start_time: start_time.saturating_add(shift),
        end_time: end_time.saturating_add(shift),
        units,
    })
}

/// Summary of one `retry_pending` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub applied: usize,
    pub still_pending: usize,
    pub failed: usize,
}

/// Summary of one `reconcile` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Calendar matches the request; request removed.
    pub confirmed: usize,
    /// Event no longer exists; request removed.
    pub vanished: usize,
    /// Calendar still shows the pre-move times; request re-queued as dirty.
    pub requeued: usize,
    /// Event was edited elsewhere; request removed without re-applying.
    pub overridden: usize,
}

pub struct ChangeManager<A, C, P>
where
    A: EventAlertRepository,
    C: ChangeRequestRepository,
    P: CalendarProvider,
{
    alerts: A,
    requests: C,
    provider: P,
    alarm_threshold_ms: i64,
    max_retries: u32,
}

impl<A, C, P> ChangeManager<A, C, P>
where
    A: EventAlertRepository,
    C: ChangeRequestRepository,
    P: CalendarProvider,
{
    pub fn new(alerts: A, requests: C, provider: P, config: &CalNotifyConfig) -> Self {
        Self {
            alerts,
            requests,
            provider,
            alarm_threshold_ms: config.alarm_threshold_ms,
            max_retries: config.max_change_retries,
        }
    }

    /// Queues and applies a new-event request.
    ///
    /// Returns `Ok(false)` when the provider is not writable (nothing is
    /// queued) or when the provider call failed (request stays `Dirty`).
    /// On success `request` carries its id, event id and `Synced` status.
    pub fn create_event(&self, request: &mut CalendarChangeRequest) -> ChangeResult<bool> {
        info!(
            "event=calendar_create module=change_manager status=start calendar_id={}",
            request.calendar_id
        );

        if !self.provider.has_write_access() {
            error!(
                "event=calendar_create module=change_manager status=error error_code=no_write_access provider={}",
                self.provider.provider_id()
            );
            return Ok(false);
        }

        request.kind = ChangeRequestKind::CreateEvent;
        request.status = ChangeRequestStatus::Dirty;
        request.id = Some(self.requests.add_request(request)?);

        match self
            .provider
            .create_event(request.calendar_id, &request.details)
        {
            Ok(event_id) => {
                request.event_id = event_id;
                request.status = ChangeRequestStatus::Synced;
                self.requests.update_request(request)?;
                info!(
                    "event=calendar_create module=change_manager status=ok event_id={event_id}"
                );
                Ok(true)
            }
            Err(err) => {
                warn!(
                    "event=calendar_create module=change_manager status=queued error_code={} retryable={} action=retry_later",
                    err.code, err.retryable
                );
                Ok(false)
            }
        }
    }

    /// Moves the event behind `alert` by `add_time_ms` relative to now.
    pub fn move_event(
        &self,
        alert: &mut EventAlertRecord,
        add_time_ms: i64,
    ) -> ChangeResult<bool> {
        self.move_event_at(alert, add_time_ms, now_epoch_ms())
    }

    /// Moves the event behind `alert` as of `now`.
    ///
    /// Replaces any queued request for the same event. On provider success
    /// the alert (and its stored row, if any) gets the new times and the
    /// request is `Synced`; on failure the alert is untouched and the
    /// request stays `Dirty` for `retry_pending`.
    pub fn move_event_at(
        &self,
        alert: &mut EventAlertRecord,
        add_time_ms: i64,
        now: i64,
    ) -> ChangeResult<bool> {
        let moved = compute_moved_times(
            alert.start_time,
            alert.end_time,
            add_time_ms,
            now,
            self.alarm_threshold_ms,
        )
        .ok_or(ChangeManagerError::InvalidMoveIncrement(add_time_ms))?;

        if !self.provider.has_write_access() {
            error!(
                "event=calendar_move module=change_manager status=error error_code=no_write_access event_id={}",
                alert.event_id
            );
            return Ok(false);
        }

        self.requests.delete_for_event_id(alert.event_id)?;

        if moved.units != 1 {
            warn!(
                "event=calendar_move module=change_manager status=adjusted event_id={} reason=target_in_past total_added_ms={}",
                alert.event_id,
                moved.start_time - alert.start_time
            );
        }

        let old_details = details_from_alert(alert, alert.start_time, alert.end_time);
        let new_details = details_from_alert(alert, moved.start_time, moved.end_time);
        let mut request = CalendarChangeRequest::move_event(
            alert.event_id,
            alert.calendar_id,
            old_details,
            new_details,
            now,
        );
        request.id = Some(self.requests.add_request(&request)?);

        let result = self
            .provider
            .move_event(alert.event_id, moved.start_time, moved.end_time);
        let success = result.is_ok();
        info!(
            "event=calendar_move module=change_manager status={} event_id={} units={}",
            if success { "ok" } else { "queued" },
            alert.event_id,
            moved.units
        );

        if let Err(err) = result {
            warn!(
                "event=calendar_move module=change_manager status=queued error_code={} retryable={} action=retry_later",
                err.code, err.retryable
            );
            return Ok(false);
        }

        alert.start_time = moved.start_time;
        alert.end_time = moved.end_time;
        if let Some(mut stored) = self
            .alerts
            .get_alert(alert.event_id, alert.instance_start_time)?
            .filter(|stored| stored.instance_start_time == alert.instance_start_time)
        {
            stored.start_time = moved.start_time;
            stored.end_time = moved.end_time;
            self.alerts.update_alert(&stored)?;
        }

        request.status = ChangeRequestStatus::Synced;
        self.requests.update_request(&request)?;
        Ok(true)
    }

    /// Re-applies every `Dirty` request.
    ///
    /// Each provider failure bumps `retry_count`. A request reaching the
    /// configured retry limit, or rejected with a non-retryable error, is
    /// marked `Failed`.
    pub fn retry_pending(&self) -> ChangeResult<RetryReport> {
        let pending = self.requests.list_by_status(ChangeRequestStatus::Dirty)?;
        let mut report = RetryReport::default();

        if pending.is_empty() {
            return Ok(report);
        }
        if !self.provider.has_write_access() {
            warn!(
                "event=calendar_retry module=change_manager status=skipped reason=no_write_access pending={}",
                pending.len()
            );
            report.still_pending = pending.len();
            return Ok(report);
        }

        for mut request in pending {
            match self.apply(&mut request) {
                Ok(()) => {
                    request.status = ChangeRequestStatus::Synced;
                    report.applied += 1;
                }
                Err(err) => {
                    request.retry_count += 1;
                    if !err.retryable || request.retry_count >= self.max_retries {
                        request.status = ChangeRequestStatus::Failed;
                        report.failed += 1;
                        error!(
                            "event=calendar_retry module=change_manager status=failed event_id={} retries={} retryable={} error_code={}",
                            request.event_id, request.retry_count, err.retryable, err.code
                        );
                    } else {
                        report.still_pending += 1;
                    }
                }
            }
            self.requests.update_request(&request)?;
        }

        info!(
            "event=calendar_retry module=change_manager status=ok applied={} pending={} failed={}",
            report.applied, report.still_pending, report.failed
        );
        Ok(report)
    }

    /// Drops `Synced` requests the calendar reflects.
    ///
    /// Requests whose event disappeared are dropped as well. A move the
    /// calendar still shows at its old times goes back to `Dirty`; any other
    /// disagreement is an edit made elsewhere and wins over the queued
    /// request, which is dropped. Provider read errors leave the request
    /// untouched.
    pub fn reconcile(&self) -> ChangeResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for mut request in self.requests.list_by_status(ChangeRequestStatus::Synced)? {
            let Some(id) = request.id else {
                continue;
            };

            let event = match self.provider.get_event(request.event_id) {
                Ok(event) => event,
                Err(err) => {
                    warn!(
                        "event=calendar_reconcile module=change_manager status=error event_id={} error_code={}",
                        request.event_id, err.code
                    );
                    continue;
                }
            };

            match event {
                None => {
                    self.requests.delete_request(id)?;
                    report.vanished += 1;
                }
                Some(event) => {
                    let title_matches = request.kind != ChangeRequestKind::CreateEvent
                        || event.title == request.details.title;
                    let not_yet_moved = request.kind == ChangeRequestKind::MoveExistingEvent
                        && same_times(&event, &request.old_details);

                    if title_matches && same_times(&event, &request.details) {
                        self.requests.delete_request(id)?;
                        report.confirmed += 1;
                    } else if not_yet_moved {
                        request.status = ChangeRequestStatus::Dirty;
                        self.requests.update_request(&request)?;
                        report.requeued += 1;
                    } else {
                        info!(
                            "event=calendar_reconcile module=change_manager status=overridden event_id={} reason=edited_elsewhere",
                            request.event_id
                        );
                        self.requests.delete_request(id)?;
                        report.overridden += 1;
                    }
                }
            }
        }

        info!(
            "event=calendar_reconcile module=change_manager status=ok confirmed={} vanished={} requeued={} overridden={}",
            report.confirmed, report.vanished, report.requeued, report.overridden
        );
        Ok(report)
    }

    fn apply(&self, request: &mut CalendarChangeRequest) -> ProviderResult<()> {
        match request.kind {
            ChangeRequestKind::CreateEvent => {
                let event_id = self
                    .provider
                    .create_event(request.calendar_id, &request.details)?;
                request.event_id = event_id;
            }
            ChangeRequestKind::MoveExistingEvent => {
                self.provider.move_event(
                    request.event_id,
                    request.details.start_time,
                    request.details.end_time,
                )?;
                if let Err(err) = self.sync_stored_alert_times(request) {
                    error!(
                        "event=calendar_retry module=change_manager status=error event_id={} error_code=alert_update_failed error={}",
                        request.event_id, err
                    );
                }
            }
        }
        Ok(())
    }

    fn sync_stored_alert_times(&self, request: &CalendarChangeRequest) -> Result<(), RepoError> {
        let moved: Vec<EventAlertRecord> = self
            .alerts
            .list_alerts()?
            .into_iter()
            .filter(|alert| {
                alert.event_id == request.event_id
                    && alert.start_time == request.old_details.start_time
            })
            .map(|mut alert| {
                alert.start_time = request.details.start_time;
                alert.end_time = request.details.end_time;
                alert
            })
            .collect();

        if !moved.is_empty() {
            self.alerts.update_alerts(&moved)?;
        }
        Ok(())
    }
}

fn same_times(event: &EventRecord, details: &CalendarEventDetails) -> bool {
    event.start_time == details.start_time && event.end_time == details.end_time
}

fn details_from_alert(
    alert: &EventAlertRecord,
    start_time: i64,
    end_time: i64,
) -> CalendarEventDetails {
    CalendarEventDetails {
        title: alert.title.clone(),
        description: String::new(),
        start_time,
        end_time,
        is_all_day: alert.is_all_day,
        timezone: String::new(),
        location: alert.location.clone(),
        color: alert.color,
        reminders: Vec::new(),
    }
}
