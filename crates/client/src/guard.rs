//! Fetch deduplication for cached resources.
//!
//! A [`FetchGuard`] admits one fetch at a time and, unless the fetch is an
//! explicit retry, refuses fetches that start too soon after the last one.
//! Admission hands out a [`FetchTicket`]; dropping it (on settlement or on
//! cancellation) releases the guard.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Why a fetch was not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppressed {
    /// Another fetch of the same resource has not settled yet.
    InFlight,
    /// The last initiating fetch settled less than the throttle window ago.
    Throttled {
        /// Time left in the throttle window.
        remaining: Duration,
    },
}

#[derive(Debug, Default)]
struct GuardState {
    in_flight: bool,
    last_fetch_at: Option<Instant>,
    generation: u64,
}

/// Per-resource fetch admission control.
#[derive(Debug, Clone)]
pub struct FetchGuard {
    state: Arc<Mutex<GuardState>>,
    throttle: Duration,
}

impl FetchGuard {
    /// Create a guard with the given throttle window.
    #[must_use]
    pub fn new(throttle: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(GuardState::default())),
            throttle,
        }
    }

    /// Try to start a fetch.
    ///
    /// `retry_count == 0` marks an initiating fetch, which is subject to the
    /// throttle; explicit retries (`retry_count > 0`) bypass it. Nothing
    /// bypasses the in-flight check.
    ///
    /// # Errors
    ///
    /// Returns why the fetch was suppressed.
    pub fn try_begin(&self, retry_count: u32) -> Result<FetchTicket, Suppressed> {
        let mut state = self.lock();
        if state.in_flight {
            return Err(Suppressed::InFlight);
        }

        let initiating = retry_count == 0;
        if initiating {
            if let Some(last) = state.last_fetch_at {
                let elapsed = last.elapsed();
                if elapsed < self.throttle {
                    return Err(Suppressed::Throttled {
                        remaining: self.throttle - elapsed,
                    });
                }
            }
        }

        state.in_flight = true;
        Ok(FetchTicket {
            state: Arc::clone(&self.state),
            generation: state.generation,
            initiating,
        })
    }

    /// Forget all fetch history and orphan outstanding tickets.
    ///
    /// Results of fetches started before the call report
    /// [`FetchTicket::is_current`] as `false`.
    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.generation = state.generation.wrapping_add(1);
        state.in_flight = false;
        state.last_fetch_at = None;
    }

    /// Whether a fetch is currently admitted.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    fn lock(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof of admission. Releases the guard when dropped.
#[derive(Debug)]
#[must_use = "dropping the ticket releases the guard immediately"]
pub struct FetchTicket {
    state: Arc<Mutex<GuardState>>,
    generation: u64,
    initiating: bool,
}

impl FetchTicket {
    /// Whether the guard has not been invalidated since admission.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
            == self.generation
    }
}

impl Drop for FetchTicket {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation != self.generation {
            return;
        }
        state.in_flight = false;
        if self.initiating {
            state.last_fetch_at = Some(Instant::now());
        }
    }
}

// =============================================================================
// GuardedResource
// =============================================================================

/// Cached state of a guarded resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResourceState<T> {
    /// Never fetched, or reset.
    #[default]
    Idle,
    /// Last fetch succeeded.
    Ready(T),
    /// The server is rate limiting this resource.
    Unavailable,
    /// Last fetch failed with this message.
    Failed(String),
}

impl<T> ResourceState<T> {
    /// The cached value, if ready.
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Result of a guarded fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome<T> {
    /// The fetch ran and the cache now holds this value.
    Fetched(T),
    /// The fetch never started.
    Suppressed(Suppressed),
    /// The server kept rate limiting after every retry.
    Unavailable,
    /// The fetch failed with this message.
    Failed(String),
    /// The guard was invalidated while the fetch ran; the result was dropped.
    Stale,
}

/// A cached value whose fetches go through a [`FetchGuard`].
#[derive(Debug)]
pub struct GuardedResource<T> {
    name: &'static str,
    guard: FetchGuard,
    state: watch::Sender<ResourceState<T>>,
}

impl<T: Clone> GuardedResource<T> {
    /// Create an idle resource.
    #[must_use]
    pub fn new(name: &'static str, throttle: Duration) -> Self {
        Self {
            name,
            guard: FetchGuard::new(throttle),
            state: watch::Sender::new(ResourceState::Idle),
        }
    }

    /// The resource's guard.
    #[must_use]
    pub const fn guard(&self) -> &FetchGuard {
        &self.guard
    }

    /// Snapshot of the cached state.
    #[must_use]
    pub fn current(&self) -> ResourceState<T> {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ResourceState<T>> {
        self.state.subscribe()
    }

    /// Replace the cached value (after a successful mutation).
    pub fn replace(&self, value: T) {
        self.state.send_replace(ResourceState::Ready(value));
    }

    /// Drop the cached value and orphan any running fetch.
    pub fn reset(&self) {
        self.guard.invalidate();
        self.state.send_replace(ResourceState::Idle);
    }

    /// Run `load` if the guard admits it and record the result.
    pub async fn fetch_with<F, Fut>(&self, retry_count: u32, load: F) -> FetchOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let ticket = match self.guard.try_begin(retry_count) {
            Ok(ticket) => ticket,
            Err(reason) => {
                debug!(resource = self.name, ?reason, "Fetch suppressed");
                return FetchOutcome::Suppressed(reason);
            }
        };

        let result = load().await;

        if !ticket.is_current() {
            debug!(resource = self.name, "Discarding stale fetch result");
            return FetchOutcome::Stale;
        }

        match result {
            Ok(value) => {
                self.state.send_replace(ResourceState::Ready(value.clone()));
                FetchOutcome::Fetched(value)
            }
            Err(e) if e.is_rate_limited() => {
                warn!(resource = self.name, error = %e, "Resource temporarily unavailable");
                self.state.send_replace(ResourceState::Unavailable);
                FetchOutcome::Unavailable
            }
            Err(e) => {
                let message = e.user_message();
                self.state.send_replace(ResourceState::Failed(message.clone()));
                FetchOutcome::Failed(message)
            }
        }
    }
}
