use agent_foreman::clock::{Clock, ManualClock, SystemClock};
use chrono::{Duration, TimeZone, Utc};

#[test]
fn manual_clock_starts_where_told() {
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    assert_eq!(clock.now(), start);
}

#[test]
fn manual_clock_advances_and_jumps() {
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let clock = ManualClock::new(start);

    clock.advance(Duration::minutes(6));
    assert_eq!(clock.now(), start + Duration::minutes(6));

    let later = start + Duration::days(1);
    clock.set(later);
    assert_eq!(clock.now(), later);
}

#[test]
fn system_clock_tracks_wall_time() {
    let before = Utc::now();
    let now = SystemClock.now();
    assert!(now >= before);
}
