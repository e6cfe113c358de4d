//! Scope initialization for model merges.
//!
//! Before a model merger runs, the comparison scope for its resources is
//! expanded asynchronously. The orchestrator blocks on an explicit
//! [`ScopeFuture`] promise; cancellation is a distinct outcome, never an
//! exception to retry through.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::error::MergeError;
use crate::resource::{ResourceId, ResourceResolver};

// ---------------------------------------------------------------------------
// CancelToken
// ---------------------------------------------------------------------------

/// Externally supplied cancellation flag checked during scope waits.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// ScopeFuture
// ---------------------------------------------------------------------------

/// How scope initialization ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeOutcome {
    /// The scope is ready; the model merge may proceed.
    Ready,
    /// The operation was cancelled. Fatal to the whole merge.
    Cancelled,
    /// Expansion failed. Fatal to the whole merge.
    Failed(String),
}

#[derive(Default)]
struct Shared {
    outcome: Mutex<Option<ScopeOutcome>>,
    ready: Condvar,
}

/// A one-shot promise for scope initialization.
pub struct ScopeFuture {
    shared: Arc<Shared>,
}

/// The completing half of a [`ScopeFuture`].
pub struct ScopeHandle {
    shared: Arc<Shared>,
}

impl ScopeFuture {
    /// An unresolved future plus the handle that completes it.
    #[must_use]
    pub fn pending() -> (Self, ScopeHandle) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: Arc::clone(&shared),
            },
            ScopeHandle { shared },
        )
    }

    /// An already-ready future, for synchronous scope managers.
    #[must_use]
    pub fn ready() -> Self {
        let (future, handle) = Self::pending();
        handle.complete(ScopeOutcome::Ready);
        future
    }

    /// Block until the scope resolves or `cancel` fires.
    ///
    /// The wait wakes periodically to re-check both conditions rather than
    /// parking once, so a cancellation that races the completion is still
    /// observed promptly. A fired token yields [`ScopeOutcome::Cancelled`]
    /// even if the expansion would have finished later.
    #[must_use]
    pub fn wait(&self, cancel: &CancelToken) -> ScopeOutcome {
        let mut guard = self
            .shared
            .outcome
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        loop {
            if let Some(outcome) = guard.clone() {
                return outcome;
            }
            if cancel.is_cancelled() {
                return ScopeOutcome::Cancelled;
            }
            let (next, _timeout) = self
                .shared
                .ready
                .wait_timeout(guard, Duration::from_millis(50))
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            guard = next;
        }
    }
}

impl ScopeHandle {
    /// Resolve the future. Later completions are ignored.
    pub fn complete(&self, outcome: ScopeOutcome) {
        let mut guard = self
            .shared
            .outcome
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(outcome);
        }
        self.shared.ready.notify_all();
    }
}

// ---------------------------------------------------------------------------
// ScopeManager
// ---------------------------------------------------------------------------

/// Starts scope expansion for a model's resources.
pub trait ScopeManager: Send + Sync {
    fn begin(&self, model: &[ResourceId]) -> Result<ScopeFuture, MergeError>;
}

/// Default manager: expands the scope on a worker thread.
///
/// Expansion here is metadata warm-up over the model's members; the value of
/// the thread is keeping the orchestrator's wait honest against a genuinely
/// asynchronous completion.
pub struct ThreadedScopeManager {
    resolver: Arc<dyn ResourceResolver>,
}

impl ThreadedScopeManager {
    #[must_use]
    pub fn new(resolver: Arc<dyn ResourceResolver>) -> Self {
        Self { resolver }
    }
}

impl ScopeManager for ThreadedScopeManager {
    fn begin(&self, model: &[ResourceId]) -> Result<ScopeFuture, MergeError> {
        let (future, handle) = ScopeFuture::pending();
        let resolver = Arc::clone(&self.resolver);
        let members = model.to_vec();
        std::thread::spawn(move || {
            let outcome = match resolver.refresh(&members) {
                Ok(()) => ScopeOutcome::Ready,
                Err(err) => ScopeOutcome::Failed(err.to_string()),
            };
            handle.complete(outcome);
        });
        Ok(future)
    }
}
