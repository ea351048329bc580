//! Event alert repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the `events` table.
//! - Turn a duplicate insert into an update that keeps the notification id.
//!
//! # Invariants
//! - One row per `(event_id, instance_start)`.
//! - A stored alert always has a non-zero notification id.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::model::event_alert::{EventAlertKey, EventAlertRecord, EventDisplayStatus};
use crate::repo::{bool_to_int, int_to_bool, is_constraint_violation, RepoError, RepoResult};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};

const ALERT_SELECT_SQL: &str = "SELECT
    calendar_id,
    event_id,
    notification_id,
    title,
    start_time,
    end_time,
    instance_start,
    instance_end,
    location,
    snoozed_until,
    last_event_visibility,
    display_status,
    color,
    alert_time,
    is_repeating,
    is_all_day
FROM events";

const ALERT_ORDER_SQL: &str = "ORDER BY last_event_visibility ASC, event_id ASC, instance_start ASC";

/// Notification id handed out when the table is empty.
pub const DEFAULT_NOTIFICATION_ID_FROM: i32 = 1;

/// Repository interface for stored alerts.
pub trait EventAlertRepository {
    /// Inserts an alert, or updates it when the key already exists.
    ///
    /// Returns the persisted record with its assigned notification id.
    fn add_alert(&self, alert: &EventAlertRecord) -> RepoResult<EventAlertRecord>;
    fn add_alerts(&self, alerts: &[EventAlertRecord]) -> RepoResult<Vec<EventAlertRecord>>;
    fn update_alert(&self, alert: &EventAlertRecord) -> RepoResult<()>;
    /// Updates existing rows, skipping keys that are not stored.
    ///
    /// Returns how many rows were updated.
    fn update_alerts(&self, alerts: &[EventAlertRecord]) -> RepoResult<usize>;
    /// `instance_start_time == 0` matches any instance of `event_id`.
    fn get_alert(
        &self,
        event_id: i64,
        instance_start_time: i64,
    ) -> RepoResult<Option<EventAlertRecord>>;
    fn list_alerts(&self) -> RepoResult<Vec<EventAlertRecord>>;
    /// Alerts that are not snoozed, or whose snooze ends before
    /// `now + threshold`.
    fn list_active_alerts(&self, now: i64, threshold: i64) -> RepoResult<Vec<EventAlertRecord>>;
    fn delete_alert(&self, event_id: i64, instance_start_time: i64) -> RepoResult<bool>;
    fn delete_alerts_for_event(&self, event_id: i64) -> RepoResult<usize>;
}

/// SQLite-backed alert store.
pub struct SqliteEventAlertRepository<'conn> {
    conn: &'conn Connection,
    notification_id_from: i32,
}

impl<'conn> SqliteEventAlertRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            notification_id_from: DEFAULT_NOTIFICATION_ID_FROM,
        }
    }

    /// Overrides the first notification id used on an empty table.
    pub fn with_notification_id_from(mut self, first_id: i32) -> Self {
        self.notification_id_from = first_id;
        self
    }

    fn next_notification_id(&self) -> RepoResult<i32> {
        let max: Option<i64> =
            self.conn
                .query_row("SELECT MAX(notification_id) FROM events;", [], |row| {
                    row.get(0)
                })?;

        let next = match max {
            Some(value) if value >= i64::from(self.notification_id_from) => {
                i32::try_from(value + 1).map_err(|_| {
                    RepoError::InvalidData(format!(
                        "notification id space exhausted at {value} in events.notification_id"
                    ))
                })?
            }
            _ => self.notification_id_from,
        };

        debug!("event=alert_next_notification_id module=repo status=ok notification_id={next}");
        Ok(next)
    }

    fn insert_or_update(&self, alert: &EventAlertRecord) -> RepoResult<EventAlertRecord> {
        let mut stored = alert.clone();
        if stored.notification_id == 0 {
            stored.notification_id = self.next_notification_id()?;
        }

        match self.insert_row(&stored) {
            Ok(()) => Ok(stored),
            Err(err) if is_constraint_violation(&err) => {
                debug!(
                    "event=alert_add module=repo status=exists key={} action=update",
                    stored.key()
                );
                let existing = self
                    .get_exact(stored.key())?
                    .ok_or(RepoError::NotFound(stored.key()))?;
                stored.notification_id = existing.notification_id;
                self.update_alert(&stored)?;
                Ok(stored)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn insert_row(&self, alert: &EventAlertRecord) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO events (
                calendar_id,
                event_id,
                notification_id,
                title,
                start_time,
                end_time,
                instance_start,
                instance_end,
                location,
                snoozed_until,
                last_event_visibility,
                display_status,
                color,
                alert_time,
                is_repeating,
                is_all_day
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16);",
            params![
                alert.calendar_id,
                alert.event_id,
                alert.notification_id,
                alert.title.as_str(),
                alert.start_time,
                alert.end_time,
                alert.instance_start_time,
                alert.instance_end_time,
                alert.location.as_str(),
                alert.snoozed_until,
                alert.last_event_visibility,
                alert.display_status.code(),
                alert.color,
                alert.alert_time,
                bool_to_int(alert.is_repeating),
                bool_to_int(alert.is_all_day),
            ],
        )?;
        Ok(())
    }

    /// Full-row update by key. A zero `notification_id` keeps the stored one.
    fn update_row(&self, alert: &EventAlertRecord) -> rusqlite::Result<usize> {
        self.conn.execute(
            "UPDATE events
             SET
                calendar_id = ?1,
                notification_id = CASE WHEN ?2 = 0 THEN notification_id ELSE ?2 END,
                title = ?3,
                start_time = ?4,
                end_time = ?5,
                instance_end = ?6,
                location = ?7,
                snoozed_until = ?8,
                last_event_visibility = ?9,
                display_status = ?10,
                color = ?11,
                alert_time = ?12,
                is_repeating = ?13,
                is_all_day = ?14
             WHERE event_id = ?15 AND instance_start = ?16;",
            params![
                alert.calendar_id,
                alert.notification_id,
                alert.title.as_str(),
                alert.start_time,
                alert.end_time,
                alert.instance_end_time,
                alert.location.as_str(),
                alert.snoozed_until,
                alert.last_event_visibility,
                alert.display_status.code(),
                alert.color,
                alert.alert_time,
                bool_to_int(alert.is_repeating),
                bool_to_int(alert.is_all_day),
                alert.event_id,
                alert.instance_start_time,
            ],
        )
    }

    fn get_exact(&self, key: EventAlertKey) -> RepoResult<Option<EventAlertRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("{ALERT_SELECT_SQL} WHERE event_id = ?1 AND instance_start = ?2;"),
                params![key.event_id, key.instance_start_time],
                |row| Ok(parse_alert_row(row)),
            )
            .optional()?;
        row.transpose()
    }

    fn query_alerts(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<EventAlertRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut alerts = Vec::new();
        while let Some(row) = rows.next()? {
            alerts.push(parse_alert_row(row)?);
        }
        Ok(alerts)
    }
}

impl EventAlertRepository for SqliteEventAlertRepository<'_> {
    fn add_alert(&self, alert: &EventAlertRecord) -> RepoResult<EventAlertRecord> {
        debug!("event=alert_add module=repo status=start key={}", alert.key());
        self.insert_or_update(alert)
    }

    fn add_alerts(&self, alerts: &[EventAlertRecord]) -> RepoResult<Vec<EventAlertRecord>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut stored = Vec::with_capacity(alerts.len());
        for alert in alerts {
            stored.push(self.insert_or_update(alert)?);
        }
        tx.commit()?;
        debug!("event=alert_add_batch module=repo status=ok count={}", stored.len());
        Ok(stored)
    }

    fn update_alert(&self, alert: &EventAlertRecord) -> RepoResult<()> {
        let changed = self.update_row(alert)?;
        if changed == 0 {
            return Err(RepoError::NotFound(alert.key()));
        }
        debug!("event=alert_update module=repo status=ok key={}", alert.key());
        Ok(())
    }

    fn update_alerts(&self, alerts: &[EventAlertRecord]) -> RepoResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut updated = 0;
        for alert in alerts {
            updated += self.update_row(alert)?;
        }
        tx.commit()?;
        debug!(
            "event=alert_update_batch module=repo status=ok requested={} updated={}",
            alerts.len(),
            updated
        );
        Ok(updated)
    }

    fn get_alert(
        &self,
        event_id: i64,
        instance_start_time: i64,
    ) -> RepoResult<Option<EventAlertRecord>> {
        if instance_start_time != 0 {
            return self.get_exact(EventAlertKey::new(event_id, instance_start_time));
        }

        let mut alerts = self.query_alerts(
            &format!("{ALERT_SELECT_SQL} WHERE event_id = ?1 ORDER BY instance_start ASC LIMIT 1;"),
            [event_id],
        )?;
        Ok(alerts.pop())
    }

    fn list_alerts(&self) -> RepoResult<Vec<EventAlertRecord>> {
        let alerts = self.query_alerts(&format!("{ALERT_SELECT_SQL} {ALERT_ORDER_SQL};"), [])?;
        debug!("event=alert_list module=repo status=ok count={}", alerts.len());
        Ok(alerts)
    }

    fn list_active_alerts(&self, now: i64, threshold: i64) -> RepoResult<Vec<EventAlertRecord>> {
        let alerts = self.query_alerts(
            &format!(
                "{ALERT_SELECT_SQL}
                 WHERE snoozed_until = 0 OR snoozed_until < ?1
                 {ALERT_ORDER_SQL};"
            ),
            [now.saturating_add(threshold)],
        )?;
        debug!(
            "event=alert_list_active module=repo status=ok count={}",
            alerts.len()
        );
        Ok(alerts)
    }

    fn delete_alert(&self, event_id: i64, instance_start_time: i64) -> RepoResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM events WHERE event_id = ?1 AND instance_start = ?2;",
            params![event_id, instance_start_time],
        )?;
        debug!(
            "event=alert_delete module=repo status=ok key={} removed={}",
            EventAlertKey::new(event_id, instance_start_time),
            removed
        );
        Ok(removed > 0)
    }

    fn delete_alerts_for_event(&self, event_id: i64) -> RepoResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM events WHERE event_id = ?1;", [event_id])?;
        debug!(
            "event=alert_delete_event module=repo status=ok event_id={event_id} removed={removed}"
        );
        Ok(removed)
    }
}

fn parse_alert_row(row: &Row<'_>) -> RepoResult<EventAlertRecord> {
    let status_code: i64 = row.get("display_status")?;
    let display_status = EventDisplayStatus::from_code(status_code).map_err(|err| {
        RepoError::InvalidData(format!("{err} in events.display_status"))
    })?;

    let notification_id: i32 = row.get("notification_id")?;
    if notification_id == 0 {
        return Err(RepoError::InvalidData(
            "zero notification id in events.notification_id".to_string(),
        ));
    }

    Ok(EventAlertRecord {
        calendar_id: row.get("calendar_id")?,
        event_id: row.get("event_id")?,
        is_repeating: int_to_bool(row.get("is_repeating")?, "events.is_repeating")?,
        is_all_day: int_to_bool(row.get("is_all_day")?, "events.is_all_day")?,
        alert_time: row.get("alert_time")?,
        notification_id,
        title: row.get("title")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        instance_start_time: row.get("instance_start")?,
        instance_end_time: row.get("instance_end")?,
        location: row.get("location")?,
        last_event_visibility: row.get("last_event_visibility")?,
        snoozed_until: row.get("snoozed_until")?,
        display_status,
        color: row.get("color")?,
    })
}
