use calnotify_core::db::open_db_in_memory;
use calnotify_core::{
    AlertService, AlertServiceError, CalNotifyConfig, EventAlertKey, EventAlertRecord,
    EventDisplayStatus, EventRecord, SqliteEventAlertRepository,
};

const NOW: i64 = 1_700_000_000_000;
const THRESHOLD: i64 = 15_000;

fn fired(event_id: i64, instance_start: i64) -> EventAlertRecord {
    let mut alert = EventAlertRecord::new(
        1,
        event_id,
        "planning",
        instance_start,
        instance_start + 1_800_000,
        instance_start - 300_000,
    );
    alert.last_event_visibility = NOW;
    alert
}

#[test]
fn first_fire_stores_alert() {
    let conn = open_db_in_memory().unwrap();
    let service = AlertService::new(SqliteEventAlertRepository::new(&conn), THRESHOLD);

    let registered = service.register_fired_alert(&fired(1, NOW)).unwrap();
    assert!(!registered.was_stored);
    assert!(registered.changed);
    assert_eq!(registered.alert.notification_id, 1);
    assert_eq!(service.all_alerts().unwrap().len(), 1);
}

#[test]
fn refire_merges_and_clears_snooze() {
    let conn = open_db_in_memory().unwrap();
    let service = AlertService::new(SqliteEventAlertRepository::new(&conn), THRESHOLD);

    let first = service.register_fired_alert(&fired(1, NOW)).unwrap();
    service
        .snooze(first.alert.key(), NOW + 3_600_000, NOW)
        .unwrap();

    let mut again = fired(1, NOW);
    again.title = "planning (updated)".to_string();
    let registered = service.register_fired_alert(&again).unwrap();

    assert!(registered.was_stored);
    assert!(registered.changed);
    assert_eq!(registered.alert.notification_id, first.alert.notification_id);
    assert_eq!(registered.alert.snoozed_until, 0);

    let stored = service.all_alerts().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "planning (updated)");
}

#[test]
fn refire_without_changes_reports_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let service = AlertService::new(SqliteEventAlertRepository::new(&conn), THRESHOLD);

    service.register_fired_alert(&fired(1, NOW)).unwrap();
    let registered = service.register_fired_alert(&fired(1, NOW)).unwrap();
    assert!(registered.was_stored);
    assert!(!registered.changed);
}

#[test]
fn snooze_hides_alert_until_threshold_window() {
    let conn = open_db_in_memory().unwrap();
    let service = AlertService::new(SqliteEventAlertRepository::new(&conn), THRESHOLD);

    let registered = service.register_fired_alert(&fired(1, NOW)).unwrap();
    service
        .mark_displayed(registered.alert.key(), EventDisplayStatus::DisplayedNormal)
        .unwrap();

    let snoozed = service
        .snooze(registered.alert.key(), NOW + 600_000, NOW)
        .unwrap();
    assert_eq!(snoozed.display_status, EventDisplayStatus::Hidden);
    assert!(snoozed.is_snoozed());

    assert!(service.active_alerts(NOW).unwrap().is_empty());
    assert_eq!(service.active_alerts(NOW + 590_000).unwrap().len(), 1);
}

#[test]
fn snooze_rejects_past_target_and_unknown_alert() {
    let conn = open_db_in_memory().unwrap();
    let service = AlertService::new(SqliteEventAlertRepository::new(&conn), THRESHOLD);
    let registered = service.register_fired_alert(&fired(1, NOW)).unwrap();

    let past = service.snooze(registered.alert.key(), NOW, NOW).unwrap_err();
    assert!(matches!(past, AlertServiceError::SnoozeInPast { .. }));

    let missing = service
        .snooze(EventAlertKey::new(404, NOW), NOW + 1, NOW)
        .unwrap_err();
    assert!(matches!(missing, AlertServiceError::AlertNotFound(_)));
}

#[test]
fn snooze_all_only_touches_active_alerts() {
    let conn = open_db_in_memory().unwrap();
    let service = AlertService::new(SqliteEventAlertRepository::new(&conn), THRESHOLD);

    service.register_fired_alert(&fired(1, NOW)).unwrap();
    service.register_fired_alert(&fired(2, NOW)).unwrap();
    let third = service.register_fired_alert(&fired(3, NOW)).unwrap();
    service
        .snooze(third.alert.key(), NOW + 86_400_000, NOW)
        .unwrap();

    assert_eq!(service.snooze_all(NOW + 900_000, NOW).unwrap(), 2);

    let third_stored = service.get_alert(third.alert.key()).unwrap().unwrap();
    assert_eq!(third_stored.snoozed_until, NOW + 86_400_000);
}

#[test]
fn dismiss_removes_alert() {
    let conn = open_db_in_memory().unwrap();
    let service = AlertService::new(SqliteEventAlertRepository::new(&conn), THRESHOLD);
    let registered = service.register_fired_alert(&fired(1, NOW)).unwrap();

    assert!(service.dismiss(registered.alert.key()).unwrap());
    assert!(!service.dismiss(registered.alert.key()).unwrap());
    assert!(service.all_alerts().unwrap().is_empty());
}

#[test]
fn reconcile_with_calendar_updates_every_instance() {
    let conn = open_db_in_memory().unwrap();
    let service = AlertService::new(SqliteEventAlertRepository::new(&conn), THRESHOLD);

    service.register_fired_alert(&fired(1, NOW)).unwrap();
    service.register_fired_alert(&fired(1, NOW + 86_400_000)).unwrap();
    service.register_fired_alert(&fired(2, NOW)).unwrap();

    let event = EventRecord {
        calendar_id: 1,
        event_id: 1,
        title: "planning (renamed)".to_string(),
        start_time: NOW,
        end_time: NOW + 1_800_000,
        location: String::new(),
        color: 0,
    };
    assert_eq!(service.reconcile_with_calendar(&event).unwrap(), 2);
    assert_eq!(service.reconcile_with_calendar(&event).unwrap(), 0);

    let titles: Vec<String> = service
        .all_alerts()
        .unwrap()
        .into_iter()
        .filter(|alert| alert.event_id == 1)
        .map(|alert| alert.title)
        .collect();
    assert_eq!(titles, vec!["planning (renamed)", "planning (renamed)"]);
}

#[test]
fn dismiss_moved_alerts_requires_a_large_forward_move() {
    const HOUR: i64 = 3_600_000;
    let conn = open_db_in_memory().unwrap();
    let config = CalNotifyConfig {
        event_moved_threshold_ms: 2 * HOUR,
        ..CalNotifyConfig::default()
    };
    let service = AlertService::from_config(SqliteEventAlertRepository::new(&conn), &config);
    service.register_fired_alert(&fired(1, NOW)).unwrap();
    let mut repeating = fired(2, NOW);
    repeating.is_repeating = true;
    service.register_fired_alert(&repeating).unwrap();

    let mut event = EventRecord {
        calendar_id: 1,
        event_id: 1,
        title: "planning".to_string(),
        start_time: NOW + HOUR,
        end_time: NOW + HOUR + 1_800_000,
        location: String::new(),
        color: 0,
    };
    assert_eq!(service.dismiss_moved_alerts(&event, NOW).unwrap(), 0);

    event.start_time = NOW + 3 * HOUR;
    assert_eq!(service.dismiss_moved_alerts(&event, NOW + 4 * HOUR).unwrap(), 0);
    assert_eq!(service.dismiss_moved_alerts(&event, NOW).unwrap(), 1);
    assert!(service.get_alert(EventAlertKey::new(1, NOW)).unwrap().is_none());

    event.event_id = 2;
    assert_eq!(service.dismiss_moved_alerts(&event, NOW).unwrap(), 0);
    assert_eq!(service.all_alerts().unwrap().len(), 1);
}
