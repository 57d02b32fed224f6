use agent_foreman::models::reminder::{ReminderPatch, ScheduledReminder};
use agent_foreman::AppError;
use chrono::{Duration, TimeZone, Utc};

fn reminder(frequency_minutes: u32) -> ScheduledReminder {
    let mut r = ScheduledReminder::new(
        "proj".into(),
        "standup".into(),
        "writer".into(),
        "post your status".into(),
        frequency_minutes,
    );
    let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
    r.created_at = t0;
    r.updated_at = t0;
    r
}

#[test]
fn not_due_before_first_window_elapses() {
    let r = reminder(5);
    assert!(!r.is_due(r.created_at + Duration::minutes(4)));
}

#[test]
fn due_once_frequency_elapsed_since_creation() {
    let r = reminder(5);
    assert!(r.is_due(r.created_at + Duration::minutes(5)));
    assert!(r.is_due(r.created_at + Duration::minutes(6)));
}

#[test]
fn last_fired_resets_the_window() {
    let mut r = reminder(5);
    let fired = r.created_at + Duration::minutes(6);
    r.last_fired_at = Some(fired);

    assert!(!r.is_due(r.created_at + Duration::minutes(7)));
    assert!(!r.is_due(fired + Duration::minutes(4)));
    assert!(r.is_due(fired + Duration::minutes(5)));
}

#[test]
fn inactive_reminder_is_never_due() {
    let mut r = reminder(1);
    r.is_active = false;
    assert!(!r.is_due(r.created_at + Duration::hours(3)));
}

#[test]
fn validation_rejects_zero_frequency() {
    let err = reminder(0).validate().unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(msg) if msg.contains("frequency_minutes")));
}

#[test]
fn validation_rejects_blank_fields() {
    let mut r = reminder(5);
    r.target_role_type = "  ".into();
    assert!(matches!(r.validate(), Err(AppError::InvalidInput(_))));

    let mut r = reminder(5);
    r.message = String::new();
    assert!(matches!(r.validate(), Err(AppError::InvalidInput(_))));

    let mut r = reminder(5);
    r.name = String::new();
    assert!(matches!(r.validate(), Err(AppError::InvalidInput(_))));
}

#[test]
fn patch_only_touches_given_fields() {
    let mut r = reminder(5);
    r.apply(&ReminderPatch {
        frequency_minutes: Some(15),
        is_active: Some(false),
        ..ReminderPatch::default()
    });

    assert_eq!(r.frequency_minutes, 15);
    assert!(!r.is_active);
    assert_eq!(r.name, "standup");
    assert_eq!(r.message, "post your status");
}
