//! Cancellation contexts shared across requests
//!
//! A [`CancellationContext`] carries a [`Credential`] that is sent with every
//! request made under it, tracks which of those requests are still in flight,
//! and can be armed with a one-shot deadline. When the deadline fires the
//! context marks itself expired, runs the caller's callback, and aborts every
//! request that was in flight at that moment. Attaching to an expired context
//! fails, so nothing is sent after expiry.
//!
//! The context knows nothing about batches. Any component that issues
//! requests can [`attach`](CancellationContext::attach) to it.
//!
//! # Example
//!
//! ```no_run
//! use docfetch::{CancellationContext, Credential};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let context = CancellationContext::new(Credential::new().cookie("session", "abc"));
//! context
//!     .arm(Duration::from_secs(60), || {
//!         tracing::warn!("Translation timed out");
//!     })
//!     .expect("called inside a runtime");
//!
//! let request = context.attach().expect("context is fresh");
//! tokio::select! {
//!     _ = request.aborted() => println!("aborted by deadline"),
//!     _ = tokio::time::sleep(Duration::from_millis(10)) => println!("finished"),
//! }
//! // Dropping the guard removes the request from the context
//! drop(request);
//! # }
//! ```

use crate::config::FetchConfig;
use crate::error::{ArmError, AttachError};
use crate::types::{Credential, RequestId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, warn};

/// Scoped credential plus an optional deadline, shared by reference
///
/// Cloning is cheap and every clone observes the same state.
#[derive(Clone)]
pub struct CancellationContext {
    shared: Arc<Shared>,
}

struct Shared {
    credential: Credential,
    runtime: Option<Handle>,
    state: Mutex<State>,
}

/// An attached request as seen by its context
struct Tracked {
    token: CancellationToken,
    /// Set under the lock when an expiry sweep claims the request
    doomed: bool,
}

#[derive(Default)]
struct State {
    expired: bool,
    in_flight: HashMap<RequestId, Tracked>,
    next_request: u64,
    /// Bumped on every arm/disarm; a timer only fires if its generation is current
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl State {
    fn disarm(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        // State stays consistent across every critical section, so a poisoned
        // lock is still usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expire<F>(&self, generation: u64, on_expire: F)
    where
        F: FnOnce(),
    {
        let snapshot: Vec<CancellationToken> = {
            let mut state = self.state();
            if state.generation != generation {
                debug!("Stale context deadline ignored");
                return;
            }
            state.expired = true;
            state.timer = None;
            // Claimed requests count as aborted from here on, even if their
            // transport finishes before the tokens below are cancelled
            state
                .in_flight
                .values_mut()
                .map(|tracked| {
                    tracked.doomed = true;
                    tracked.token.clone()
                })
                .collect()
        };

        warn!(
            in_flight = snapshot.len(),
            "Context deadline expired, aborting in-flight requests"
        );
        on_expire();
        for token in snapshot {
            token.cancel();
        }
    }
}

impl CancellationContext {
    /// Create a context carrying `credential`
    ///
    /// When called inside a Tokio runtime, deadlines armed later run on that
    /// runtime even if [`arm`](Self::arm) is called from outside it.
    pub fn new(credential: Credential) -> Self {
        Self::build(credential, Handle::try_current().ok())
    }

    /// Create a context whose deadlines run on `runtime`
    pub fn with_runtime(credential: Credential, runtime: Handle) -> Self {
        Self::build(credential, Some(runtime))
    }

    fn build(credential: Credential, runtime: Option<Handle>) -> Self {
        Self {
            shared: Arc::new(Shared {
                credential,
                runtime,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// The credential sent with every attached request
    pub fn credential(&self) -> &Credential {
        &self.shared.credential
    }

    /// Whether the armed deadline has fired
    pub fn is_expired(&self) -> bool {
        self.shared.state().expired
    }

    /// Whether a deadline is currently pending
    pub fn is_armed(&self) -> bool {
        self.shared.state().timer.is_some()
    }

    /// Number of attached requests that have not completed yet
    pub fn in_flight(&self) -> usize {
        self.shared.state().in_flight.len()
    }

    /// Register a request for tracking and abort-on-expiry
    ///
    /// The request counts as in flight until the returned guard is dropped,
    /// whatever the reason it completed.
    ///
    /// # Errors
    ///
    /// Returns [`AttachError::AlreadyExpired`] once the deadline has fired. The
    /// caller must not send the request.
    pub fn attach(&self) -> Result<AttachedRequest, AttachError> {
        let mut state = self.shared.state();
        if state.expired {
            debug!("Refusing to attach request to expired context");
            return Err(AttachError::AlreadyExpired);
        }

        state.next_request += 1;
        let id = RequestId(state.next_request);
        let token = CancellationToken::new();
        state.in_flight.insert(
            id,
            Tracked {
                token: token.clone(),
                doomed: false,
            },
        );
        debug!(request_id = %id, in_flight = state.in_flight.len(), "Attached request to context");

        Ok(AttachedRequest {
            id,
            token,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Arm a one-shot deadline
    ///
    /// Any previously armed deadline is discarded and the expired flag is
    /// cleared. After `deadline` elapses, unless [`cancel_arm`](Self::cancel_arm)
    /// or another `arm` intervenes, the context expires: it is marked expired,
    /// `on_expire` runs once, and then every request in flight at that moment
    /// is aborted.
    ///
    /// The timer runs on the runtime captured when the context was created,
    /// or else on the runtime `arm` is called from.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::NoRuntime`] if neither runtime is available. The
    /// previous deadline, if any, is left untouched.
    pub fn arm<F>(&self, deadline: Duration, on_expire: F) -> Result<(), ArmError>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = match &self.shared.runtime {
            Some(runtime) => runtime.clone(),
            None => Handle::try_current().map_err(|_| ArmError::NoRuntime)?,
        };

        let generation = {
            let mut state = self.shared.state();
            state.disarm();
            state.expired = false;
            state.generation
        };

        let shared = Arc::clone(&self.shared);
        let timer = runtime.spawn(async move {
            tokio::time::sleep(deadline).await;
            shared.expire(generation, on_expire);
        });

        let mut state = self.shared.state();
        if state.generation == generation && !state.expired {
            state.timer = Some(timer);
            debug!(deadline_ms = deadline.as_millis(), "Context deadline armed");
        } else {
            // Another arm/cancel_arm won the race, or the deadline already fired
            timer.abort();
        }
        Ok(())
    }

    /// Arm with the configured default deadline, if there is one
    ///
    /// Returns whether a deadline was armed.
    ///
    /// # Errors
    ///
    /// Same as [`arm`](Self::arm).
    pub fn arm_with_config<F>(&self, config: &FetchConfig, on_expire: F) -> Result<bool, ArmError>
    where
        F: FnOnce() + Send + 'static,
    {
        match config.default_deadline {
            Some(deadline) => {
                self.arm(deadline, on_expire)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Disarm the pending deadline, if any
    pub fn cancel_arm(&self) {
        let mut state = self.shared.state();
        if state.timer.is_some() {
            debug!("Context deadline cancelled");
        }
        state.disarm();
    }
}

impl std::fmt::Debug for CancellationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state();
        f.debug_struct("CancellationContext")
            .field("expired", &state.expired)
            .field("in_flight", &state.in_flight.len())
            .field("armed", &state.timer.is_some())
            .finish_non_exhaustive()
    }
}

/// A request registered with a [`CancellationContext`]
///
/// Dropping the guard marks the request complete and removes it from the
/// context's in-flight set.
#[must_use = "dropping the guard detaches the request immediately"]
pub struct AttachedRequest {
    id: RequestId,
    token: CancellationToken,
    shared: Arc<Shared>,
}

impl AttachedRequest {
    /// The request's identifier within its context
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Whether the request has been aborted
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the request is aborted
    pub fn aborted(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Abort this request only
    ///
    /// Safe to call any number of times, including after the request completed.
    pub fn abort(&self) {
        self.token.cancel();
    }

    /// Detach the request now that its transport has finished
    ///
    /// Returns true if the request was aborted before it completed, either
    /// directly or because an expiry sweep claimed it. In that case whatever
    /// the transport produced must be discarded: the sweep may still be
    /// running `on_expire` and not have cancelled the token yet.
    pub fn complete(self) -> bool {
        self.detach()
    }

    fn detach(&self) -> bool {
        let mut state = self.shared.state();
        let doomed = match state.in_flight.remove(&self.id) {
            Some(tracked) => {
                debug!(
                    request_id = %self.id,
                    in_flight = state.in_flight.len(),
                    "Detached request from context"
                );
                tracked.doomed
            }
            None => false,
        };
        doomed || self.token.is_cancelled()
    }
}

impl Drop for AttachedRequest {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for AttachedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedRequest")
            .field("id", &self.id)
            .field("aborted", &self.is_aborted())
            .finish()
    }
}
