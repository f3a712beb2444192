use chrono::{Duration, TimeZone, Utc};
use folio_types::{Clock, FixedClock, SystemClock};

#[test]
fn fixed_clock_returns_set_time() {
    let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let clock = FixedClock::new(t);
    assert_eq!(clock.now(), t);
}

#[test]
fn fixed_clock_advance() {
    let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let clock = FixedClock::new(t);
    clock.advance(Duration::seconds(301));
    assert_eq!(clock.now(), t + Duration::seconds(301));
    clock.set(t);
    assert_eq!(clock.now(), t);
}

#[test]
fn system_clock_moves_forward() {
    let a = SystemClock.now();
    let b = SystemClock.now();
    assert!(b >= a);
}
