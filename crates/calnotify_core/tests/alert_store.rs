use calnotify_core::db::open_db_in_memory;
use calnotify_core::{
    EventAlertKey, EventAlertRecord, EventAlertRepository, EventDisplayStatus, RepoError,
    SqliteEventAlertRepository,
};

fn alert(event_id: i64, instance_start: i64) -> EventAlertRecord {
    let mut alert = EventAlertRecord::new(
        2,
        event_id,
        format!("event {event_id}"),
        instance_start,
        instance_start + 3_600_000,
        instance_start - 600_000,
    );
    alert.location = "hq".to_string();
    alert
}

#[test]
fn add_and_get_roundtrip_preserves_all_fields() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventAlertRepository::new(&conn);

    let mut original = alert(10, 1_700_000_000_000);
    original.is_repeating = true;
    original.is_all_day = true;
    original.instance_end_time = 1_700_000_500_000;
    original.last_event_visibility = 1_699_999_999_000;
    original.snoozed_until = 1_700_000_100_000;
    original.display_status = EventDisplayStatus::DisplayedCollapsed;
    original.color = -16_776_961;

    let stored = repo.add_alert(&original).unwrap();
    assert_ne!(stored.notification_id, 0);

    let loaded = repo
        .get_alert(10, 1_700_000_000_000)
        .unwrap()
        .expect("alert should be stored");
    let expected = EventAlertRecord {
        notification_id: stored.notification_id,
        ..original
    };
    assert_eq!(loaded, expected);
    assert_eq!(loaded, stored);
}

#[test]
fn notification_ids_start_at_one_and_increase() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventAlertRepository::new(&conn);

    let first = repo.add_alert(&alert(1, 1_000)).unwrap();
    let second = repo.add_alert(&alert(2, 1_000)).unwrap();
    assert_eq!(first.notification_id, 1);
    assert_eq!(second.notification_id, 2);
}

#[test]
fn configured_first_notification_id_is_used_on_empty_store() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventAlertRepository::new(&conn).with_notification_id_from(100);

    assert_eq!(repo.add_alert(&alert(1, 1_000)).unwrap().notification_id, 100);
    assert_eq!(repo.add_alert(&alert(2, 1_000)).unwrap().notification_id, 101);
}

#[test]
fn explicit_notification_id_is_kept() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventAlertRepository::new(&conn);

    let mut with_id = alert(5, 1_000);
    with_id.notification_id = 42;
    assert_eq!(repo.add_alert(&with_id).unwrap().notification_id, 42);
    assert_eq!(repo.add_alert(&alert(6, 1_000)).unwrap().notification_id, 43);
}

#[test]
fn re_adding_existing_key_updates_and_keeps_notification_id() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventAlertRepository::new(&conn);

    let first = repo.add_alert(&alert(7, 5_000)).unwrap();
    repo.add_alert(&alert(8, 5_000)).unwrap();

    let mut changed = alert(7, 5_000);
    changed.title = "renamed".to_string();
    changed.notification_id = 999;
    let second = repo.add_alert(&changed).unwrap();

    assert_eq!(second.notification_id, first.notification_id);
    let all = repo.list_alerts().unwrap();
    assert_eq!(all.len(), 2);
    let loaded = repo.get_alert(7, 5_000).unwrap().unwrap();
    assert_eq!(loaded.title, "renamed");
    assert_eq!(loaded.notification_id, first.notification_id);
}

#[test]
fn repeating_instances_are_stored_separately() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventAlertRepository::new(&conn);

    repo.add_alert(&alert(9, 1_000)).unwrap();
    repo.add_alert(&alert(9, 2_000)).unwrap();

    assert_eq!(repo.list_alerts().unwrap().len(), 2);
    assert_eq!(
        repo.get_alert(9, 2_000).unwrap().unwrap().instance_start_time,
        2_000
    );
    // Zero instance start matches any instance of the event.
    assert_eq!(
        repo.get_alert(9, 0).unwrap().unwrap().instance_start_time,
        1_000
    );
    assert!(repo.get_alert(9, 3_000).unwrap().is_none());
}

#[test]
fn update_missing_alert_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventAlertRepository::new(&conn);

    let mut missing = alert(11, 1_000);
    missing.notification_id = 3;
    let err = repo.update_alert(&missing).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(key) if key == EventAlertKey::new(11, 1_000)));
}

#[test]
fn update_without_notification_id_keeps_stored_id() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventAlertRepository::new(&conn);
    let first = repo.add_alert(&alert(1, 1_000)).unwrap();
    let second = repo.add_alert(&alert(2, 1_000)).unwrap();

    let mut fresh = alert(1, 1_000);
    fresh.title = "renamed".to_string();
    assert_eq!(fresh.notification_id, 0);
    repo.update_alert(&fresh).unwrap();

    let mut batch = alert(2, 1_000);
    batch.snoozed_until = 9_000;
    assert_eq!(repo.update_alerts(&[batch]).unwrap(), 1);

    let listed = repo.list_alerts().unwrap();
    assert_eq!(listed.len(), 2);
    let renamed = repo.get_alert(1, 1_000).unwrap().unwrap();
    assert_eq!(renamed.title, "renamed");
    assert_eq!(renamed.notification_id, first.notification_id);
    let snoozed = repo.get_alert(2, 1_000).unwrap().unwrap();
    assert_eq!(snoozed.snoozed_until, 9_000);
    assert_eq!(snoozed.notification_id, second.notification_id);
}

#[test]
fn batch_update_skips_missing_rows() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventAlertRepository::new(&conn);

    let mut stored = repo
        .add_alerts(&[alert(1, 1_000), alert(2, 1_000)])
        .unwrap();
    for item in &mut stored {
        item.snoozed_until = 50_000;
    }
    let mut missing = alert(3, 1_000);
    missing.notification_id = 77;
    stored.push(missing);

    assert_eq!(repo.update_alerts(&stored).unwrap(), 2);
    assert!(repo
        .list_alerts()
        .unwrap()
        .iter()
        .all(|item| item.snoozed_until == 50_000));
}

#[test]
fn active_alerts_exclude_snoozes_beyond_threshold() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventAlertRepository::new(&conn);
    let now = 1_000_000;
    let threshold = 15_000;

    let not_snoozed = alert(1, 1_000);
    let mut snooze_due = alert(2, 1_000);
    snooze_due.snoozed_until = now + 10_000;
    let mut snooze_boundary = alert(3, 1_000);
    snooze_boundary.snoozed_until = now + threshold;
    let mut snooze_later = alert(4, 1_000);
    snooze_later.snoozed_until = now + 3_600_000;
    repo.add_alerts(&[not_snoozed, snooze_due, snooze_boundary, snooze_later])
        .unwrap();

    let active: Vec<i64> = repo
        .list_active_alerts(now, threshold)
        .unwrap()
        .iter()
        .map(|item| item.event_id)
        .collect();
    assert_eq!(active, vec![1, 2]);
}

#[test]
fn list_orders_by_last_visibility() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventAlertRepository::new(&conn);

    let mut late = alert(1, 1_000);
    late.last_event_visibility = 300;
    let mut early = alert(2, 1_000);
    early.last_event_visibility = 100;
    repo.add_alerts(&[late, early]).unwrap();

    let ids: Vec<i64> = repo
        .list_alerts()
        .unwrap()
        .iter()
        .map(|item| item.event_id)
        .collect();
    assert_eq!(ids, vec![2, 1]);
}

#[test]
fn delete_is_idempotent_and_scoped_to_instance() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventAlertRepository::new(&conn);

    repo.add_alert(&alert(5, 1_000)).unwrap();
    repo.add_alert(&alert(5, 2_000)).unwrap();

    assert!(repo.delete_alert(5, 1_000).unwrap());
    assert!(!repo.delete_alert(5, 1_000).unwrap());
    assert_eq!(repo.list_alerts().unwrap().len(), 1);

    assert_eq!(repo.delete_alerts_for_event(5).unwrap(), 1);
    assert!(repo.list_alerts().unwrap().is_empty());
}

#[test]
fn corrupted_display_status_is_reported_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventAlertRepository::new(&conn);
    repo.add_alert(&alert(1, 1_000)).unwrap();

    conn.execute("UPDATE events SET display_status = 9;", [])
        .unwrap();

    let err = repo.list_alerts().unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(message) if message.contains("display_status")));
}
