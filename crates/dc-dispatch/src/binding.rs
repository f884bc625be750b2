//! Cancellable fetch binding: one logical request per consumer.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::RequestDispatcher;

/// Failure reported by a [`Resource`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The request was abandoned. Never surfaced to consumers.
    #[error("request cancelled")]
    Cancelled,

    /// Network or connection failure.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Well-formed response in which the service reported its own failure.
    #[error("{0}")]
    Application(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingErrorKind {
    Transport,
    Application,
    /// A prerequisite failed before any request could be issued.
    Blocked,
}

/// Error surfaced to a binding's consumer. Every error can be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingError {
    pub kind: BindingErrorKind,
    pub message: String,
}

impl BindingError {
    pub fn blocked(message: impl Into<String>) -> Self {
        Self {
            kind: BindingErrorKind::Blocked,
            message: message.into(),
        }
    }
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Observable `{data, loading, error}` triple of a binding.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<BindingError>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

/// A remote resource a [`FetchBinding`] can load.
///
/// `fetch` receives the binding's abort token. Honouring it is optional:
/// results of cancelled or superseded requests are discarded either way.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    type Params: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;
    type Output: Clone + Send + Sync + 'static;

    /// Stable identifier used in logs.
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        params: Self::Params,
        cancel: CancellationToken,
    ) -> Result<Self::Output, FetchError>;
}

/// Binds one consumer to one resource.
///
/// Changing params (by value) or the enabled flag cancels the outstanding
/// request and issues a new one through the shared dispatcher. Only the most
/// recently issued request may commit to `data`/`error`; this sequence check
/// holds even when the transport ignores cancellation.
pub struct FetchBinding<R: Resource> {
    resource: Arc<R>,
    dispatcher: RequestDispatcher,
    shared: Arc<Shared<R>>,
}

struct Shared<R: Resource> {
    tracker: Mutex<Tracker<R::Params>>,
    state: watch::Sender<FetchState<R::Output>>,
}

struct Tracker<P> {
    params: Option<P>,
    enabled: bool,
    latest_seq: u64,
    in_flight: Option<CancellationToken>,
}

impl<R: Resource> FetchBinding<R> {
    pub fn new(resource: Arc<R>, dispatcher: RequestDispatcher) -> Self {
        let (state, _) = watch::channel(FetchState::default());
        Self {
            resource,
            dispatcher,
            shared: Arc::new(Shared {
                tracker: Mutex::new(Tracker {
                    params: None,
                    enabled: false,
                    latest_seq: 0,
                    in_flight: None,
                }),
                state,
            }),
        }
    }

    /// Point the binding at `params`. A no-op when nothing changed.
    pub fn set(&self, params: R::Params, enabled: bool) {
        let mut tracker = self.shared.tracker.lock();
        if tracker.enabled == enabled && tracker.params.as_ref() == Some(&params) {
            return;
        }
        tracker.params = Some(params);
        tracker.enabled = enabled;
        self.issue(&mut tracker);
    }

    /// Re-issue the current request, e.g. after an error.
    pub fn retry(&self) {
        let mut tracker = self.shared.tracker.lock();
        self.issue(&mut tracker);
    }

    /// Cancel anything outstanding and forget params, data and error.
    pub fn clear(&self) {
        let mut tracker = self.shared.tracker.lock();
        Self::supersede(&mut tracker);
        tracker.params = None;
        tracker.enabled = false;
        self.shared.state.send_replace(FetchState::default());
    }

    /// Cancel anything outstanding and surface `error` without issuing a request.
    pub fn block(&self, error: BindingError) {
        let mut tracker = self.shared.tracker.lock();
        Self::supersede(&mut tracker);
        tracker.params = None;
        tracker.enabled = false;
        tracing::debug!(resource = self.resource.name(), error = %error, "binding.blocked");
        self.shared.state.send_replace(FetchState {
            data: None,
            loading: false,
            error: Some(error),
        });
    }

    pub fn state(&self) -> FetchState<R::Output> {
        self.shared.state.borrow().clone()
    }

    pub fn params(&self) -> Option<R::Params> {
        self.shared.tracker.lock().params.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<R::Output>> {
        self.shared.state.subscribe()
    }

    /// Wait until no request is loading and return the resulting state.
    pub async fn settled(&self) -> FetchState<R::Output> {
        let mut rx = self.shared.state.subscribe();
        match rx.wait_for(|state| !state.loading).await {
            Ok(state) => state.clone(),
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => self.state(),
        }
    }

    fn supersede(tracker: &mut Tracker<R::Params>) -> u64 {
        if let Some(token) = tracker.in_flight.take() {
            token.cancel();
        }
        tracker.latest_seq += 1;
        tracker.latest_seq
    }

    fn issue(&self, tracker: &mut Tracker<R::Params>) {
        let seq = Self::supersede(tracker);
        let name = self.resource.name();

        let params = match (&tracker.params, tracker.enabled) {
            (Some(params), true) => params.clone(),
            _ => {
                self.shared.state.send_modify(|state| state.loading = false);
                return;
            }
        };

        let token = CancellationToken::new();
        tracker.in_flight = Some(token.clone());
        self.shared.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });
        tracing::debug!(resource = name, seq, params = ?params, "binding.issue");

        let resource = Arc::clone(&self.resource);
        let dispatcher = self.dispatcher.clone();
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let fetch_token = token.clone();
            let result = dispatcher
                .enqueue_unless_cancelled(&token, || async move {
                    if fetch_token.is_cancelled() {
                        return Err(FetchError::Cancelled);
                    }
                    resource.fetch(params, fetch_token).await
                })
                .await
                .unwrap_or(Err(FetchError::Cancelled));
            shared.commit(name, seq, &token, result);
        });
    }
}

impl<R: Resource> Shared<R> {
    /// Apply a finished request. Returns whether the state was updated.
    fn commit(
        &self,
        name: &'static str,
        seq: u64,
        token: &CancellationToken,
        result: Result<R::Output, FetchError>,
    ) -> bool {
        let mut tracker = self.tracker.lock();
        if token.is_cancelled() {
            tracing::debug!(resource = name, seq, "binding.drop_cancelled");
            return false;
        }
        if seq != tracker.latest_seq {
            tracing::debug!(
                resource = name,
                seq,
                latest = tracker.latest_seq,
                "binding.drop_stale"
            );
            return false;
        }
        tracker.in_flight = None;

        match result {
            Ok(data) => {
                tracing::debug!(resource = name, seq, "binding.commit");
                self.state.send_replace(FetchState {
                    data: Some(data),
                    loading: false,
                    error: None,
                });
            }
            Err(FetchError::Cancelled) => {
                self.state.send_modify(|state| state.loading = false);
                return false;
            }
            Err(FetchError::Transport(message)) => {
                tracing::debug!(resource = name, seq, %message, "binding.transport_error");
                self.state.send_modify(|state| {
                    state.loading = false;
                    state.error = Some(BindingError {
                        kind: BindingErrorKind::Transport,
                        message: format!("Could not reach the analysis service: {message}"),
                    });
                });
            }
            Err(FetchError::Application(message)) => {
                tracing::debug!(resource = name, seq, %message, "binding.application_error");
                self.state.send_modify(|state| {
                    state.loading = false;
                    state.error = Some(BindingError {
                        kind: BindingErrorKind::Application,
                        message,
                    });
                });
            }
        }
        true
    }
}

impl<R: Resource> Drop for FetchBinding<R> {
    fn drop(&mut self) {
        if let Some(token) = self.shared.tracker.lock().in_flight.take() {
            token.cancel();
        }
    }
}
