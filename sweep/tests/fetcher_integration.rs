
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;

use sweep::config::FetchConfig;
use sweep::error::{ConfigError, FetchError, SessionError};
use sweep::metrics::counters::FetchCounters;
use sweep::profile::{BatchProfileFetcher, BatchResult, CancelFlag, fetch_detailed_profiles};

use mock_lookup::{MockLookup, handles, session};

/// No pauses between waves unless a test asks for them.
fn config(group_size: usize, concurrency: usize) -> FetchConfig {
    FetchConfig {
        group_size,
        concurrency,
        max_retries: 3,
        retry_backoff_ms: 100,
        inter_group_delay_ms: 0,
        abort_on_session_failure: true,
    }
}

fn set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Every input handle lands in exactly one bucket.
fn assert_partitioned(input: &[String], result: &BatchResult) {
    assert_eq!(result.requested, input.len());
    assert_eq!(result.profiles.len() + result.failed.len(), input.len());

    let loaded: HashSet<&str> = result.profiles.iter().map(|p| p.handle.as_str()).collect();
    let failed: HashSet<&str> = result.failed.iter().map(String::as_str).collect();
    assert!(loaded.is_disjoint(&failed), "a handle is in both buckets");

    for h in input {
        assert!(
            loaded.contains(h.as_str()) || failed.contains(h.as_str()),
            "{h} is in neither bucket"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn empty_input_returns_immediately_without_calls() {
    let mock = Arc::new(MockLookup::default());

    let result = fetch_detailed_profiles(mock.clone(), &session(), &[], FetchConfig::default())
        .await
        .unwrap();

    assert_eq!(result.requested, 0);
    assert!(result.profiles.is_empty());
    assert!(result.failed.is_empty());
    assert_eq!(mock.multi() + mock.single(), 0);
}

#[tokio::test(start_paused = true)]
async fn success_path_issues_one_call_per_group() {
    let mock = Arc::new(MockLookup::default());
    let input = handles(1000);

    let result = fetch_detailed_profiles(mock.clone(), &session(), &input, config(25, 8))
        .await
        .unwrap();

    assert_eq!(mock.multi(), 40);
    assert_eq!(mock.single(), 0);
    assert!(mock.max_batch_seen.load(std::sync::atomic::Ordering::SeqCst) <= 25);
    assert_eq!(result.profiles.len(), 1000);
    assert!(result.failed.is_empty());
    assert_partitioned(&input, &result);
}

#[tokio::test(start_paused = true)]
async fn in_flight_calls_never_exceed_concurrency() {
    let mock = Arc::new(MockLookup {
        latency: Duration::from_millis(50),
        ..MockLookup::default()
    });
    let input = handles(10_000);

    let result = fetch_detailed_profiles(mock.clone(), &session(), &input, config(25, 6))
        .await
        .unwrap();

    assert_eq!(mock.peak_in_flight(), 6);
    assert_eq!(mock.multi(), 400);
    assert_eq!(result.loaded(), 10_000);
}

#[tokio::test(start_paused = true)]
async fn in_flight_bound_holds_through_fallback() {
    let input = handles(60);
    let mock = Arc::new(MockLookup {
        latency: Duration::from_millis(20),
        fail_multi_for: input.iter().cloned().collect(),
        ..MockLookup::default()
    });

    let result = fetch_detailed_profiles(mock.clone(), &session(), &input, config(10, 3))
        .await
        .unwrap();

    assert!(mock.peak_in_flight() <= 3);
    assert_eq!(mock.single(), 60);
    assert_eq!(result.loaded(), 60);
}

#[tokio::test(start_paused = true)]
async fn exhausted_group_falls_back_to_one_call_per_handle() {
    // Groups of 10, 10 and 3; only the last one is broken.
    let input = handles(23);
    let mock = Arc::new(MockLookup {
        fail_multi_for: set(&["user21.test"]),
        fail_single_for: set(&["user22.test"]),
        ..MockLookup::default()
    });

    let result = fetch_detailed_profiles(mock.clone(), &session(), &input, config(10, 4))
        .await
        .unwrap();

    assert_eq!(mock.multi(), 2 + 3, "two clean groups plus three attempts");
    assert_eq!(mock.single(), 3, "partial last group falls back per handle");
    assert_eq!(result.loaded(), 22);
    assert_eq!(result.failed, vec!["user22.test".to_string()]);
    assert_partitioned(&input, &result);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_recover_through_retries() {
    let input = handles(5);
    let mock = Arc::new(MockLookup {
        transient_multi_failures: 2,
        ..MockLookup::default()
    });

    let result = fetch_detailed_profiles(mock.clone(), &session(), &input, config(25, 2))
        .await
        .unwrap();

    assert_eq!(mock.multi(), 3);
    assert_eq!(mock.single(), 0);
    assert_eq!(result.loaded(), 5);
}

#[tokio::test(start_paused = true)]
async fn retry_backoff_never_shrinks() {
    let input = handles(3);
    let mock = Arc::new(MockLookup {
        fail_multi_for: set(&["user0.test"]),
        ..MockLookup::default()
    });
    let cfg = FetchConfig {
        max_retries: 4,
        retry_backoff_ms: 100,
        ..config(25, 1)
    };

    fetch_detailed_profiles(mock.clone(), &session(), &input, cfg)
        .await
        .unwrap();

    let times = mock.multi_call_times.lock().unwrap().clone();
    assert_eq!(times.len(), 4);

    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    for (i, gap) in gaps.iter().enumerate() {
        assert!(
            *gap >= Duration::from_millis(100 * (i as u64 + 1)),
            "attempt {} waited only {gap:?}",
            i + 2
        );
    }
    assert!(gaps.windows(2).all(|w| w[1] >= w[0]), "gaps shrank: {gaps:?}");
}

#[tokio::test(start_paused = true)]
async fn omitted_actors_are_resolved_individually() {
    let input = handles(6);
    let mock = Arc::new(MockLookup {
        omit_from_multi: set(&["user2.test", "user4.test"]),
        fail_single_for: set(&["user4.test"]),
        ..MockLookup::default()
    });

    let result = fetch_detailed_profiles(mock.clone(), &session(), &input, config(25, 2))
        .await
        .unwrap();

    assert_eq!(mock.multi(), 1);
    assert_eq!(mock.single(), 2);
    assert_eq!(result.loaded(), 5);
    assert_eq!(result.failed, vec!["user4.test".to_string()]);
    assert_partitioned(&input, &result);
}

#[tokio::test(start_paused = true)]
async fn malformed_response_counts_as_a_failed_attempt() {
    let input = handles(4);
    let mock = Arc::new(MockLookup {
        malformed_multi: true,
        ..MockLookup::default()
    });

    let result = fetch_detailed_profiles(mock.clone(), &session(), &input, config(25, 2))
        .await
        .unwrap();

    assert_eq!(mock.multi(), 3);
    assert_eq!(mock.single(), 4);
    assert_eq!(result.loaded(), 4);
}

#[tokio::test(start_paused = true)]
async fn duplicate_handles_resolve_independently() {
    let input: Vec<String> = ["dup.test", "solo.test", "dup.test", "gone.test", "gone.test"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mock = Arc::new(MockLookup {
        omit_from_multi: set(&["gone.test"]),
        fail_single_for: set(&["gone.test"]),
        ..MockLookup::default()
    });

    let result = fetch_detailed_profiles(mock.clone(), &session(), &input, config(25, 2))
        .await
        .unwrap();

    let dup_count = result.profiles.iter().filter(|p| p.handle == "dup.test").count();
    assert_eq!(dup_count, 2);
    assert_eq!(result.loaded(), 3);
    assert_eq!(result.failed, vec!["gone.test".to_string(), "gone.test".to_string()]);
    assert_eq!(mock.single(), 2);
}

#[tokio::test(start_paused = true)]
async fn profiles_are_sanitized_before_they_are_returned() {
    let input = handles(2);
    let mock = Arc::new(MockLookup::default());

    let result = fetch_detailed_profiles(mock, &session(), &input, config(25, 1))
        .await
        .unwrap();

    for p in &result.profiles {
        assert_eq!(p.extra["pinnedPost"]["cid"], json!("bafyreib2rxk3rh6kzwq"));
        assert_eq!(p.posts(), 7);
    }
}

#[tokio::test(start_paused = true)]
async fn invalid_group_size_is_rejected_before_any_call() {
    let mock = Arc::new(MockLookup::default());

    for bad in [0, 26] {
        let err = fetch_detailed_profiles(mock.clone(), &session(), &handles(10), config(bad, 2))
            .await
            .unwrap_err();
        assert!(
            matches!(err, FetchError::Config(ConfigError::GroupSize { got, .. }) if got == bad),
            "unexpected error {err:?}"
        );
    }

    assert_eq!(mock.multi() + mock.single(), 0);
}

#[tokio::test(start_paused = true)]
async fn unusable_session_is_rejected_before_any_call() {
    let mock = Arc::new(MockLookup::default());
    let mut s = session();
    s.access_jwt.clear();

    let err = fetch_detailed_profiles(mock.clone(), &s, &handles(3), FetchConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Session(SessionError::Unusable(_))));
    assert_eq!(mock.multi() + mock.single(), 0);
}

#[tokio::test(start_paused = true)]
async fn session_rejection_aborts_the_batch() {
    let mock = Arc::new(MockLookup {
        reject_session: true,
        ..MockLookup::default()
    });

    let err = fetch_detailed_profiles(mock.clone(), &session(), &handles(200), config(10, 4))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::SessionRejected(_)));
    assert!(mock.multi() <= 4, "later waves must not start");
    assert_eq!(mock.single(), 0);
}

#[tokio::test(start_paused = true)]
async fn session_rejection_is_an_ordinary_failure_when_abort_is_off() {
    let mock = Arc::new(MockLookup {
        reject_session: true,
        ..MockLookup::default()
    });
    let input = handles(12);
    let cfg = FetchConfig {
        abort_on_session_failure: false,
        ..config(5, 2)
    };

    let result = fetch_detailed_profiles(mock.clone(), &session(), &input, cfg)
        .await
        .unwrap();

    assert_eq!(mock.multi(), 3 * 3);
    assert_eq!(mock.single(), 12);
    assert_eq!(result.loaded(), 0);
    assert_eq!(result.failed.len(), 12);
    assert_partitioned(&input, &result);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_before_the_next_wave() {
    let cancel = CancelFlag::new();
    let mock = Arc::new(MockLookup {
        cancel_on_first_call: Some(cancel.clone()),
        ..MockLookup::default()
    });

    let fetcher = BatchProfileFetcher::new(mock.clone(), config(10, 2)).with_cancel(cancel);
    let err = fetcher.fetch(&session(), &handles(100)).await.unwrap_err();

    assert!(matches!(
        err,
        FetchError::Cancelled {
            completed: 2,
            total: 10
        }
    ));
    assert_eq!(mock.multi(), 2, "the dispatched wave finishes, nothing after it");
}

#[tokio::test(start_paused = true)]
async fn pause_is_inserted_between_waves_only() {
    let cfg = FetchConfig {
        inter_group_delay_ms: 1_000,
        ..config(1, 1)
    };

    let mock = Arc::new(MockLookup::default());
    let start = Instant::now();
    fetch_detailed_profiles(mock, &session(), &handles(3), cfg.clone())
        .await
        .unwrap();
    let three_waves = start.elapsed();
    assert!(three_waves >= Duration::from_millis(2_000));
    assert!(three_waves < Duration::from_millis(3_000));

    let mock = Arc::new(MockLookup::default());
    let start = Instant::now();
    fetch_detailed_profiles(mock, &session(), &handles(1), cfg)
        .await
        .unwrap();
    assert!(start.elapsed() < Duration::from_millis(1_000));
}

#[tokio::test(start_paused = true)]
async fn counters_track_calls() {
    let input = handles(30);
    let mock = Arc::new(MockLookup {
        fail_multi_for: set(&["user0.test"]),
        ..MockLookup::default()
    });

    let shared = FetchCounters::default();
    let fetcher =
        BatchProfileFetcher::new(mock.clone(), config(10, 3)).with_counters(shared.clone());
    fetcher.fetch(&session(), &input).await.unwrap();

    let snap = shared.snapshot();
    assert_eq!(snap, fetcher.counters().snapshot());
    assert_eq!(snap.multi_lookups, mock.multi() as u64);
    assert_eq!(snap.single_lookups, 10);
    assert_eq!(snap.groups_retried, 2);
    assert_eq!(snap.groups_fallen_back, 1);
    assert_eq!(snap.failed_lookups, 3);
}
