//! Stale-response suppression and error classification of fetch bindings.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dc_dispatch::{
    BindingErrorKind, DispatcherConfig, FetchBinding, FetchError, RequestDispatcher, Resource,
};
use tokio_util::sync::CancellationToken;

/// Echoes the requested key after a per-key latency and ignores cancellation,
/// like a transport whose abort is a no-op.
#[derive(Default)]
struct SlowEcho {
    calls: AtomicUsize,
}

#[derive(Debug, Clone, PartialEq)]
struct Query {
    key: &'static str,
    latency_ms: u64,
}

#[async_trait]
impl Resource for SlowEcho {
    type Params = Query;
    type Output = String;

    fn name(&self) -> &'static str {
        "slow_echo"
    }

    async fn fetch(&self, params: Query, _cancel: CancellationToken) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(params.latency_ms)).await;
        match params.key {
            "offline" => Err(FetchError::Transport("connection refused".to_string())),
            "missing" => Err(FetchError::Application(
                "No consolidated data for scenario".to_string(),
            )),
            "aborted" => Err(FetchError::Cancelled),
            key => Ok(format!("data:{key}")),
        }
    }
}

fn binding() -> (Arc<SlowEcho>, FetchBinding<SlowEcho>) {
    let resource = Arc::new(SlowEcho::default());
    let binding = FetchBinding::new(
        Arc::clone(&resource),
        RequestDispatcher::new(DispatcherConfig::default()),
    );
    (resource, binding)
}

#[tokio::test(start_paused = true)]
async fn late_response_for_old_params_is_discarded() {
    let (_resource, binding) = binding();

    binding.set(
        Query {
            key: "P1",
            latency_ms: 500,
        },
        true,
    );
    tokio::time::sleep(Duration::from_millis(10)).await;
    binding.set(
        Query {
            key: "P2",
            latency_ms: 20,
        },
        true,
    );

    let state = binding.settled().await;
    assert_eq!(state.data.as_deref(), Some("data:P2"));

    // Let P1 resolve after P2; it must not overwrite the newer result.
    tokio::time::sleep(Duration::from_millis(600)).await;
    let state = binding.state();
    assert_eq!(state.data.as_deref(), Some("data:P2"));
    assert!(!state.loading);
    assert!(state.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn transport_and_application_failures_are_distinguished() {
    let (_resource, binding) = binding();

    binding.set(
        Query {
            key: "offline",
            latency_ms: 5,
        },
        true,
    );
    let state = binding.settled().await;
    let error = state.error.expect("transport error should surface");
    assert_eq!(error.kind, BindingErrorKind::Transport);
    assert!(error.message.contains("connection refused"));

    binding.set(
        Query {
            key: "missing",
            latency_ms: 5,
        },
        true,
    );
    let state = binding.settled().await;
    let error = state.error.expect("application error should surface");
    assert_eq!(error.kind, BindingErrorKind::Application);
    assert_eq!(error.message, "No consolidated data for scenario");
}

#[tokio::test(start_paused = true)]
async fn cancellation_is_never_an_error() {
    let (_resource, binding) = binding();
    binding.set(
        Query {
            key: "aborted",
            latency_ms: 5,
        },
        true,
    );
    let state = binding.settled().await;
    assert!(state.error.is_none());
    assert!(state.data.is_none());
}

#[tokio::test(start_paused = true)]
async fn retry_reissues_current_params() {
    let (resource, binding) = binding();
    let query = Query {
        key: "A",
        latency_ms: 5,
    };
    binding.set(query.clone(), true);
    binding.settled().await;
    binding.set(query, true);
    binding.settled().await;
    assert_eq!(resource.calls.load(Ordering::SeqCst), 1);

    binding.retry();
    let state = binding.settled().await;
    assert_eq!(resource.calls.load(Ordering::SeqCst), 2);
    assert_eq!(state.data.as_deref(), Some("data:A"));
}

#[tokio::test(start_paused = true)]
async fn disabled_binding_issues_nothing() {
    let (resource, binding) = binding();
    binding.set(
        Query {
            key: "A",
            latency_ms: 5,
        },
        false,
    );
    let state = binding.settled().await;
    assert!(state.data.is_none());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(resource.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn clear_drops_data_and_in_flight_result() {
    let (_resource, binding) = binding();
    binding.set(
        Query {
            key: "A",
            latency_ms: 5,
        },
        true,
    );
    binding.settled().await;

    binding.set(
        Query {
            key: "B",
            latency_ms: 100,
        },
        true,
    );
    binding.clear();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let state = binding.state();
    assert!(state.data.is_none());
    assert!(!state.loading);
    assert_eq!(binding.params(), None);
}

#[tokio::test(start_paused = true)]
async fn superseded_requests_give_up_their_queue_place() {
    let dispatcher = RequestDispatcher::new(DispatcherConfig {
        max_concurrent: 1,
        inter_dispatch_delay: Duration::from_millis(100),
    });
    let resource = Arc::new(SlowEcho::default());
    let binding = FetchBinding::new(Arc::clone(&resource), dispatcher.clone());

    let blocker = {
        let d = dispatcher.clone();
        tokio::spawn(async move { d.enqueue(|| tokio::time::sleep(Duration::from_millis(50))).await })
    };
    tokio::task::yield_now().await;

    let started = tokio::time::Instant::now();
    for key in ["P1", "P2", "P3"] {
        binding.set(Query { key, latency_ms: 0 }, true);
        tokio::task::yield_now().await;
    }

    let state = binding.settled().await;
    blocker.await.unwrap();
    assert_eq!(state.data.as_deref(), Some("data:P3"));
    assert_eq!(resource.calls.load(Ordering::SeqCst), 1);
    // The blocker, then a single pacing step.
    assert_eq!(started.elapsed(), Duration::from_millis(150));
    assert_eq!(dispatcher.queued(), 0);
}
