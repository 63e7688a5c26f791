//! Session mirror — keeps the store's identity in step with the auth service.
//!
//! ARCHITECTURE
//! ============
//! `start` registers with the auth service before anything else, then a
//! listener task forwards every notification to `on_session_change`. Each
//! notification rewrites the identity (new epoch) and, when someone is
//! signed in, spawns a profile fetch bound to that epoch. Fetches run
//! concurrently; the store's epoch check decides which result lands.
//!
//! LIFECYCLE
//! =========
//! `teardown` unsubscribes, stops the listener, and aborts in-flight
//! fetches. It is idempotent and also runs on drop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::store::{IdentityWrite, ProfileStore};
use crate::net::auth::SubscriptionHandle;
use crate::net::types::AuthChange;

struct Listener {
    subscription: SubscriptionHandle,
    task: JoinHandle<()>,
}

struct MirrorInner {
    store: ProfileStore,
    fetches: Mutex<JoinSet<()>>,
    torn_down: AtomicBool,
}

impl MirrorInner {
    fn on_session_change(&self, change: AuthChange) {
        if self.torn_down.load(Ordering::Acquire) {
            return;
        }
        debug!(event = ?change.event, user_id = ?change.identity().map(|i| i.id), "session change");

        let Some(ticket) = self.store.set_identity(change.identity().cloned()) else {
            return;
        };

        let store = self.store.clone();
        let mut fetches = lock(&self.fetches);
        while fetches.try_join_next().is_some() {}
        fetches.spawn(async move {
            store.fetch_profile_for(ticket).await;
        });
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mirrors the auth service's session into a [`ProfileStore`].
pub struct SessionMirror {
    inner: Arc<MirrorInner>,
    listener: Mutex<Option<Listener>>,
}

impl SessionMirror {
    /// Subscribe to session changes and start forwarding them to `store`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(store: ProfileStore) -> Self {
        let (mut events, subscription) = store.auth().on_auth_state_change().into_parts();
        let inner = Arc::new(MirrorInner {
            store,
            fetches: Mutex::new(JoinSet::new()),
            torn_down: AtomicBool::new(false),
        });

        let task = tokio::spawn({
            let inner = Arc::clone(&inner);
            async move {
                while let Some(change) = events.recv().await {
                    inner.on_session_change(change);
                }
                debug!("auth subscription closed");
            }
        });

        Self { inner, listener: Mutex::new(Some(Listener { subscription, task })) }
    }

    #[must_use]
    pub fn store(&self) -> &ProfileStore {
        &self.inner.store
    }

    /// Read the current session once, load its profile, and clear the
    /// loading flag. The flag is cleared even if every call fails.
    ///
    /// A notification that lands while the session is being read is newer
    /// than the read, so its identity is kept.
    pub async fn initialize(&self) {
        let store = &self.inner.store;
        let epoch = store.snapshot().epoch();
        let identity = match store.auth().get_session().await {
            Ok(Some(session)) => {
                info!(user_id = %session.user.id, "existing session found");
                Some(session.user)
            }
            Ok(None) => {
                debug!("no existing session");
                None
            }
            Err(e) => {
                warn!(error = %e, "session check failed, continuing signed out");
                None
            }
        };

        match store.set_identity_if_current(epoch, identity) {
            IdentityWrite::Committed(Some(ticket)) => {
                store.fetch_profile_for(ticket).await;
            }
            IdentityWrite::Committed(None) => {}
            IdentityWrite::Superseded => debug!("session changed during startup check, keeping newer state"),
        }
        store.set_loading(false);
    }

    /// Apply one notification from the auth service. Normally called by the
    /// listener task; ignored after teardown.
    pub fn on_session_change(&self, change: AuthChange) {
        self.inner.on_session_change(change);
    }

    /// Stop mirroring. Returns `true` only for the call that tore down.
    pub fn teardown(&self) -> bool {
        if self.inner.torn_down.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(listener) = lock(&self.listener).take() {
            listener.subscription.unsubscribe();
            listener.task.abort();
        }
        lock(&self.inner.fetches).abort_all();
        info!("session mirror torn down");
        true
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::Acquire)
    }
}

impl Drop for SessionMirror {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
#[path = "mirror_test.rs"]
mod tests;
