//! Auth service boundary.
//!
//! ARCHITECTURE
//! ============
//! `AuthService` is the seam between session handling and the hosted auth
//! API. `BackendClient` implements it over HTTP; tests substitute mocks.
//!
//! Session-change notifications are delivered through `AuthListeners`: each
//! subscriber gets its own unbounded channel plus an `AuthSubscription`
//! whose `unsubscribe` removes the channel from the registry. Unsubscribing
//! is idempotent and also happens on drop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tracing::debug;

use super::types::{AuthChange, Session};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by auth operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The service rejected the credentials or token.
    #[error("{0}")]
    Rejected(String),

    /// The operation needs a session and none is held.
    #[error("no active session")]
    NoSession,

    /// The HTTP request could not be sent or the body could not be read.
    #[error("auth request failed: {0}")]
    Request(String),

    /// The service returned an unexpected non-success status.
    #[error("auth service error: status {status}: {message}")]
    Response { status: u16, message: String },

    /// The response body could not be deserialized.
    #[error("auth response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// SERVICE TRAIT
// =============================================================================

/// Hosted auth API consumed by the session layer. Enables mocking in tests.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] for bad credentials, or a transport
    /// error if the service is unreachable.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// The session currently held, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the session could not be determined.
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    /// Register for session-change notifications.
    fn on_auth_state_change(&self) -> AuthSubscription;

    /// End the current session on the service.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails. Implementations still
    /// drop their local session and notify subscribers.
    async fn sign_out(&self) -> Result<(), AuthError>;
}

// =============================================================================
// LISTENER REGISTRY
// =============================================================================

type ListenerMap = Mutex<HashMap<u64, mpsc::UnboundedSender<AuthChange>>>;

/// Fan-out registry of session-change subscribers.
#[derive(Default)]
pub struct AuthListeners {
    inner: Arc<ListenerMap>,
    next_id: AtomicU64,
}

impl AuthListeners {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber.
    pub fn subscribe(&self) -> AuthSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.inner).insert(id, tx);
        debug!(subscription = id, "auth subscriber added");
        AuthSubscription {
            events: rx,
            handle: SubscriptionHandle { id, registry: Arc::downgrade(&self.inner), active: AtomicBool::new(true) },
        }
    }

    /// Deliver `change` to every live subscriber, pruning closed ones.
    pub fn emit(&self, change: &AuthChange) {
        let mut listeners = lock(&self.inner);
        listeners.retain(|_, tx| tx.send(change.clone()).is_ok());
        debug!(event = ?change.event, subscribers = listeners.len(), "auth change emitted");
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock(map: &ListenerMap) -> std::sync::MutexGuard<'_, HashMap<u64, mpsc::UnboundedSender<AuthChange>>> {
    // Map writes are single calls, so a poisoned guard is still consistent.
    map.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// A live registration: the event stream plus its cancel handle.
pub struct AuthSubscription {
    events: mpsc::UnboundedReceiver<AuthChange>,
    handle: SubscriptionHandle,
}

impl AuthSubscription {
    /// Receive the next notification; `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<AuthChange> {
        self.events.recv().await
    }

    /// Cancel the registration. See [`SubscriptionHandle::unsubscribe`].
    pub fn unsubscribe(&self) -> bool {
        self.handle.unsubscribe()
    }

    /// Split into the event stream and the cancel handle so they can live
    /// in different owners.
    #[must_use]
    pub fn into_parts(self) -> (mpsc::UnboundedReceiver<AuthChange>, SubscriptionHandle) {
        (self.events, self.handle)
    }
}

/// Cancels one registration in an [`AuthListeners`] registry.
pub struct SubscriptionHandle {
    id: u64,
    registry: Weak<ListenerMap>,
    active: AtomicBool,
}

impl SubscriptionHandle {
    /// Remove the registration. Returns `true` only for the call that
    /// removed it; repeated calls are no-ops.
    pub fn unsubscribe(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(&self.id);
        }
        debug!(subscription = self.id, "auth subscriber removed");
        true
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
