use calnotify_core::db::migrations::latest_version;
use calnotify_core::db::{open_db, open_db_in_memory, reset_store, DbError};
use calnotify_core::{EventAlertRecord, EventAlertRepository, SqliteEventAlertRepository};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "events");
    assert_table_exists(&conn, "calendar_change_requests");
}

#[test]
fn opening_same_database_twice_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calnotify.db");

    let conn_first = open_db(&path).unwrap();
    SqliteEventAlertRepository::new(&conn_first)
        .add_alert(&EventAlertRecord::new(1, 42, "standup", 1_000, 2_000, 900))
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let alerts = SqliteEventAlertRepository::new(&conn_second)
        .list_alerts()
        .unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].event_id, 42);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn reset_store_empties_tables_and_keeps_schema() {
    let mut conn = open_db_in_memory().unwrap();
    SqliteEventAlertRepository::new(&conn)
        .add_alert(&EventAlertRecord::new(1, 7, "review", 1_000, 2_000, 900))
        .unwrap();

    reset_store(&mut conn).unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    let alerts = SqliteEventAlertRepository::new(&conn).list_alerts().unwrap();
    assert!(alerts.is_empty());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
