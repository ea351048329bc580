//! Queue of pending calendar mutations.
//!
//! # Responsibility
//! - Persist `CalendarChangeRequest` rows in `calendar_change_requests`.
//! - Serialize event detail snapshots as JSON text.
//!
//! # Invariants
//! - `id` is assigned by SQLite on insert and never reused.
//! - Listing order is insertion order (`id ASC`).

use crate::model::change_request::{
    CalendarChangeRequest, CalendarEventDetails, ChangeRequestId, ChangeRequestKind,
    ChangeRequestStatus,
};
use crate::repo::{RepoError, RepoResult};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};

const REQUEST_SELECT_SQL: &str = "SELECT
    id,
    kind,
    event_id,
    calendar_id,
    status,
    details,
    old_details,
    retry_count,
    created_at
FROM calendar_change_requests";

pub trait ChangeRequestRepository {
    /// Persists a new request and returns its assigned id.
    fn add_request(&self, request: &CalendarChangeRequest) -> RepoResult<ChangeRequestId>;
    fn update_request(&self, request: &CalendarChangeRequest) -> RepoResult<()>;
    fn get_request(&self, id: ChangeRequestId) -> RepoResult<Option<CalendarChangeRequest>>;
    fn list_requests(&self) -> RepoResult<Vec<CalendarChangeRequest>>;
    fn list_by_status(&self, status: ChangeRequestStatus)
        -> RepoResult<Vec<CalendarChangeRequest>>;
    fn delete_request(&self, id: ChangeRequestId) -> RepoResult<bool>;
    /// Drops every queued request targeting `event_id`.
    fn delete_for_event_id(&self, event_id: i64) -> RepoResult<usize>;
}

pub struct SqliteChangeRequestRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteChangeRequestRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_requests(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<CalendarChangeRequest>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut requests = Vec::new();
        while let Some(row) = rows.next()? {
            requests.push(parse_request_row(row)?);
        }
        Ok(requests)
    }
}

impl ChangeRequestRepository for SqliteChangeRequestRepository<'_> {
    fn add_request(&self, request: &CalendarChangeRequest) -> RepoResult<ChangeRequestId> {
        self.conn.execute(
            "INSERT INTO calendar_change_requests (
                kind,
                event_id,
                calendar_id,
                status,
                details,
                old_details,
                retry_count,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                kind_to_db(request.kind),
                request.event_id,
                request.calendar_id,
                status_to_db(request.status),
                details_to_json(&request.details)?,
                details_to_json(&request.old_details)?,
                request.retry_count,
                request.created_at,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!(
            "event=change_request_add module=repo status=ok id={} kind={} event_id={}",
            id,
            kind_to_db(request.kind),
            request.event_id
        );
        Ok(id)
    }

    fn update_request(&self, request: &CalendarChangeRequest) -> RepoResult<()> {
        let id = request.id.ok_or_else(|| {
            RepoError::InvalidData("cannot update a change request without id".to_string())
        })?;

        let changed = self.conn.execute(
            "UPDATE calendar_change_requests
             SET
                kind = ?1,
                event_id = ?2,
                calendar_id = ?3,
                status = ?4,
                details = ?5,
                old_details = ?6,
                retry_count = ?7
             WHERE id = ?8;",
            params![
                kind_to_db(request.kind),
                request.event_id,
                request.calendar_id,
                status_to_db(request.status),
                details_to_json(&request.details)?,
                details_to_json(&request.old_details)?,
                request.retry_count,
                id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::ChangeRequestNotFound(id));
        }
        debug!(
            "event=change_request_update module=repo status=ok id={} request_status={}",
            id,
            status_to_db(request.status)
        );
        Ok(())
    }

    fn get_request(&self, id: ChangeRequestId) -> RepoResult<Option<CalendarChangeRequest>> {
        let row = self
            .conn
            .query_row(
                &format!("{REQUEST_SELECT_SQL} WHERE id = ?1;"),
                [id],
                |row| Ok(parse_request_row(row)),
            )
            .optional()?;
        row.transpose()
    }

    fn list_requests(&self) -> RepoResult<Vec<CalendarChangeRequest>> {
        self.query_requests(&format!("{REQUEST_SELECT_SQL} ORDER BY id ASC;"), [])
    }

    fn list_by_status(
        &self,
        status: ChangeRequestStatus,
    ) -> RepoResult<Vec<CalendarChangeRequest>> {
        self.query_requests(
            &format!("{REQUEST_SELECT_SQL} WHERE status = ?1 ORDER BY id ASC;"),
            [status_to_db(status)],
        )
    }

    fn delete_request(&self, id: ChangeRequestId) -> RepoResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM calendar_change_requests WHERE id = ?1;", [id])?;
        Ok(removed > 0)
    }

    fn delete_for_event_id(&self, event_id: i64) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM calendar_change_requests WHERE event_id = ?1;",
            [event_id],
        )?;
        debug!(
            "event=change_request_delete_event module=repo status=ok event_id={event_id} removed={removed}"
        );
        Ok(removed)
    }
}

fn parse_request_row(row: &Row<'_>) -> RepoResult<CalendarChangeRequest> {
    let kind_text: String = row.get("kind")?;
    let kind = parse_kind(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid request kind `{kind_text}` in calendar_change_requests.kind"
        ))
    })?;

    let status_text: String = row.get("status")?;
    let status = parse_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid request status `{status_text}` in calendar_change_requests.status"
        ))
    })?;

    Ok(CalendarChangeRequest {
        id: Some(row.get("id")?),
        kind,
        event_id: row.get("event_id")?,
        calendar_id: row.get("calendar_id")?,
        status,
        details: details_from_json(&row.get::<_, String>("details")?, "details")?,
        old_details: details_from_json(&row.get::<_, String>("old_details")?, "old_details")?,
        retry_count: row.get("retry_count")?,
        created_at: row.get("created_at")?,
    })
}

fn details_to_json(details: &CalendarEventDetails) -> RepoResult<String> {
    serde_json::to_string(details)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode event details: {err}")))
}

fn details_from_json(text: &str, column: &str) -> RepoResult<CalendarEventDetails> {
    serde_json::from_str(text).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid event details in calendar_change_requests.{column}: {err}"
        ))
    })
}

fn kind_to_db(kind: ChangeRequestKind) -> &'static str {
    match kind {
        ChangeRequestKind::CreateEvent => "create_event",
        ChangeRequestKind::MoveExistingEvent => "move_existing_event",
    }
}

fn parse_kind(value: &str) -> Option<ChangeRequestKind> {
    match value {
        "create_event" => Some(ChangeRequestKind::CreateEvent),
        "move_existing_event" => Some(ChangeRequestKind::MoveExistingEvent),
        _ => None,
    }
}

fn status_to_db(status: ChangeRequestStatus) -> &'static str {
    match status {
        ChangeRequestStatus::Dirty => "dirty",
        ChangeRequestStatus::Synced => "synced",
        ChangeRequestStatus::Failed => "failed",
    }
}

fn parse_status(value: &str) -> Option<ChangeRequestStatus> {
    match value {
        "dirty" => Some(ChangeRequestStatus::Dirty),
        "synced" => Some(ChangeRequestStatus::Synced),
        "failed" => Some(ChangeRequestStatus::Failed),
        _ => None,
    }
}
