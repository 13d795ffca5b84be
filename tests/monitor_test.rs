//! Behavioral tests for beacons and active-user queries

use activity_monitor::store::ManualClock;
use activity_monitor::{
    ActiveUser, ActivityMonitor, Config, MemoryStore, MonitorError, TimeSeriesStore,
};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::Arc;

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2013, 11, 11, h, m, s).unwrap()
}

fn users(list: &[(i32, &str)]) -> HashSet<ActiveUser> {
    list.iter()
        .map(|&(id, name)| ActiveUser::new(id, name))
        .collect()
}

/// Monitor over a store whose expiry clock only moves when told to.
fn monitor() -> (ActivityMonitor<Arc<MemoryStore>>, Arc<MemoryStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let monitor = ActivityMonitor::from_config(store.clone(), &Config::default()).unwrap();
    (monitor, store, clock)
}

#[test]
fn test_sets_the_user_for_current_time() {
    let (monitor, _, _) = monitor();
    let now = Utc::now();
    monitor.beacon("posts/1", now, 1, "John").unwrap();

    let result = monitor.get_all("posts/1", now).unwrap();

    assert_eq!(result, users(&[(1, "John")]));
}

#[test]
fn test_does_not_include_results_from_a_different_key() {
    let (monitor, _, _) = monitor();
    let now = Utc::now();
    monitor.beacon("posts/1", now, 1, "John").unwrap();
    monitor.beacon("posts/2", now, 2, "Mary").unwrap();

    assert_eq!(monitor.get_all("posts/1", now).unwrap(), users(&[(1, "John")]));
    assert_eq!(monitor.get_all("posts/2", now).unwrap(), users(&[(2, "Mary")]));
}

#[test]
fn test_does_not_get_users_outside_of_current_and_sliding_window() {
    let (monitor, _, _) = monitor();
    let now = Utc::now();
    monitor.beacon("posts/1", now, 1, "John").unwrap();

    let result = monitor
        .get_all("posts/1", now + TimeDelta::seconds(60))
        .unwrap();

    assert!(result.is_empty());
}

#[test]
fn test_gets_users_from_previous_and_current_window_within_sliding_window() {
    let (monitor, _, _) = monitor();
    monitor.beacon("posts/1", at(5, 30, 25), 1, "John").unwrap();
    monitor.beacon("posts/1", at(5, 30, 43), 2, "Mary").unwrap();

    let result = monitor.get_all("posts/1", at(5, 30, 45)).unwrap();

    assert_eq!(result, users(&[(1, "John"), (2, "Mary")]));
}

#[test]
fn test_does_not_get_users_from_previous_window_outside_sliding_window() {
    let (monitor, _, _) = monitor();
    monitor.beacon("posts/1", at(5, 30, 0), 2, "Mary").unwrap();
    monitor.beacon("posts/1", at(5, 30, 25), 1, "John").unwrap();
    monitor.beacon("posts/1", at(5, 30, 43), 3, "Sue").unwrap();

    let result = monitor.get_all("posts/1", at(5, 30, 45)).unwrap();

    assert_eq!(result, users(&[(1, "John"), (3, "Sue")]));
}

#[test]
fn test_does_not_count_duplicates_from_previous_and_current_window() {
    let (monitor, _, _) = monitor();
    monitor.beacon("posts/1", at(5, 30, 25), 1, "John").unwrap();
    monitor.beacon("posts/1", at(5, 30, 43), 1, "John").unwrap();

    let result = monitor.get_all("posts/1", at(5, 30, 45)).unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result, users(&[(1, "John")]));
}

#[test]
fn test_does_not_count_duplicates_from_current_window() {
    let (monitor, _, _) = monitor();
    monitor.beacon("posts/1", at(5, 30, 43), 1, "John").unwrap();
    monitor.beacon("posts/1", at(5, 30, 45), 1, "John").unwrap();
    monitor.beacon("posts/1", at(5, 30, 45), 2, "Mary").unwrap();

    let result = monitor.get_all("posts/1", at(5, 30, 45)).unwrap();

    assert_eq!(result, users(&[(1, "John"), (2, "Mary")]));
}

#[test]
fn test_same_id_different_name_counts_twice() {
    let (monitor, _, _) = monitor();
    monitor.beacon("posts/1", at(5, 30, 40), 1, "John").unwrap();
    monitor.beacon("posts/1", at(5, 30, 41), 1, "Johnny").unwrap();
    monitor.beacon("posts/1", at(5, 30, 42), 1, "").unwrap();

    let result = monitor.get_all("posts/1", at(5, 30, 45)).unwrap();

    assert_eq!(result, users(&[(1, "John"), (1, "Johnny"), (1, "")]));
}

#[test]
fn test_sliding_threshold_boundary() {
    let (monitor, _, _) = monitor();
    let t = at(5, 30, 25);
    monitor.beacon("posts/1", t, 1, "John").unwrap();

    let epsilon = TimeDelta::milliseconds(1);
    let just_inside = monitor
        .get_all("posts/1", t + TimeDelta::seconds(30) - epsilon)
        .unwrap();
    let on_edge = monitor
        .get_all("posts/1", t + TimeDelta::seconds(30))
        .unwrap();
    let just_outside = monitor
        .get_all("posts/1", t + TimeDelta::seconds(30) + epsilon)
        .unwrap();

    assert_eq!(just_inside, users(&[(1, "John")]));
    assert_eq!(on_edge, users(&[(1, "John")]));
    assert!(just_outside.is_empty());
}

#[test]
fn test_beacon_after_query_time_in_current_window_is_counted() {
    // The current bucket is read whole, so a beacon later in the same
    // window is visible to an earlier query.
    let (monitor, _, _) = monitor();
    monitor.beacon("posts/1", at(5, 30, 50), 1, "John").unwrap();

    let result = monitor.get_all("posts/1", at(5, 30, 35)).unwrap();

    assert_eq!(result, users(&[(1, "John")]));
}

#[test]
fn test_minute_boundary_splits_windows() {
    let config = Config {
        window_width: std::time::Duration::from_secs(45),
        ..Config::default()
    };
    let monitor = ActivityMonitor::from_config(MemoryStore::new(), &config).unwrap();

    let early = monitor.resolver().resolve("k", at(5, 30, 59));
    let late = monitor.resolver().resolve("k", at(5, 31, 0));
    assert_eq!(early.start_time(), at(5, 30, 45));
    assert_eq!(late.start_time(), at(5, 31, 0));
}

#[test]
fn test_bucket_expires_after_twice_the_width() {
    let (monitor, store, clock) = monitor();
    let t = at(5, 30, 25);
    monitor.beacon("posts/1", t, 1, "John").unwrap();

    clock.advance(TimeDelta::seconds(59));
    assert_eq!(monitor.get_all("posts/1", t).unwrap(), users(&[(1, "John")]));

    clock.advance(TimeDelta::seconds(1));
    assert_eq!(store.purge_expired(), 1);
    assert!(store.is_empty());
    assert!(monitor.get_all("posts/1", t).unwrap().is_empty());
}

#[test]
fn test_every_beacon_refreshes_expiry() {
    let (monitor, store, clock) = monitor();
    let t = at(5, 30, 31);
    monitor.beacon("posts/1", t, 1, "John").unwrap();

    clock.advance(TimeDelta::seconds(45));
    monitor.beacon("posts/1", t + TimeDelta::seconds(1), 2, "Mary").unwrap();

    clock.advance(TimeDelta::seconds(45));
    let window = monitor.resolver().resolve("posts/1", t);
    assert!(store.contains_key(window.store_key()));
    assert_eq!(
        monitor.get_all("posts/1", t + TimeDelta::seconds(2)).unwrap(),
        users(&[(1, "John"), (2, "Mary")])
    );
}

#[test]
fn test_unavailable_store_fails_both_paths() {
    let (monitor, store, _) = monitor();
    let now = Utc::now();
    monitor.beacon("posts/1", now, 1, "John").unwrap();

    store.set_available(false);
    assert!(matches!(
        monitor.beacon("posts/1", now, 2, "Mary"),
        Err(MonitorError::StoreUnavailable(_))
    ));
    assert!(matches!(
        monitor.get_all("posts/1", now),
        Err(MonitorError::StoreUnavailable(_))
    ));

    store.set_available(true);
    assert_eq!(monitor.get_all("posts/1", now).unwrap(), users(&[(1, "John")]));
}

#[test]
fn test_query_within_one_width_of_earliest_time_is_an_error() {
    let (monitor, _, _) = monitor();

    for offset in [0, 10, 29] {
        let time = DateTime::<Utc>::MIN_UTC + TimeDelta::seconds(offset);
        assert!(matches!(
            monitor.get_all("posts/1", time),
            Err(MonitorError::TimeOutOfRange(_))
        ));
    }

    let time = DateTime::<Utc>::MIN_UTC + TimeDelta::seconds(30);
    assert!(monitor.get_all("posts/1", time).unwrap().is_empty());
}

#[test]
fn test_corrupt_member_in_previous_window_is_skipped() {
    let (monitor, store, _) = monitor();
    monitor.beacon("posts/1", at(5, 30, 25), 1, "John").unwrap();
    monitor.beacon("posts/1", at(5, 30, 43), 2, "Mary").unwrap();

    let previous = monitor.resolver().resolve("posts/1", at(5, 30, 25));
    store
        .upsert_scored(previous.store_key(), "[1, 2", i64::MAX)
        .unwrap();

    let result = monitor.get_all("posts/1", at(5, 30, 45)).unwrap();

    assert_eq!(result, users(&[(1, "John"), (2, "Mary")]));
}

#[test]
fn test_concurrent_beacons_share_one_store() {
    let (monitor, _, _) = monitor();
    let now = Utc::now();

    std::thread::scope(|scope| {
        for id in 0..8 {
            let monitor = &monitor;
            scope.spawn(move || {
                for _ in 0..25 {
                    monitor.beacon("posts/1", now, id, "user").unwrap();
                }
            });
        }
    });

    let result = monitor.get_all("posts/1", now).unwrap();
    assert_eq!(result.len(), 8);
}
