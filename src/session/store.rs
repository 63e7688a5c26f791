//! Profile store — the mirrored identity, its profile, and the loading flag.
//!
//! DESIGN
//! ======
//! State lives in a `watch` channel so views can observe it and so every
//! write is a single synchronous `send_modify`/`send_if_modified`. Nothing
//! is locked across an await.
//!
//! Every identity write bumps `epoch`. A profile fetch is dispatched with a
//! `FetchTicket` carrying the epoch it was issued under, and its result is
//! committed only if that epoch is still current. A slow fetch for a
//! previous identity therefore can never overwrite the profile of a newer one.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::net::auth::{AuthError, AuthService};
use crate::net::records::ProfileSource;
use crate::net::types::{Identity, Profile};

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Point-in-time view of the auth state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    /// `true` until the first session check has finished.
    pub loading: bool,
    epoch: u64,
}

impl AuthSnapshot {
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self { identity: None, profile: None, loading: true, epoch: 0 }
    }
}

/// Binds a profile fetch to the identity and epoch it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub user_id: Uuid,
    pub epoch: u64,
}

// =============================================================================
// STORE
// =============================================================================

/// Shared handle to the auth state. Clones refer to the same state.
#[derive(Clone)]
pub struct ProfileStore {
    state: Arc<watch::Sender<AuthSnapshot>>,
    auth: Arc<dyn AuthService>,
    profiles: Arc<dyn ProfileSource>,
}

impl ProfileStore {
    #[must_use]
    pub fn new(auth: Arc<dyn AuthService>, profiles: Arc<dyn ProfileSource>) -> Self {
        let (tx, _) = watch::channel(AuthSnapshot::default());
        Self { state: Arc::new(tx), auth, profiles }
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    pub(crate) fn auth(&self) -> &Arc<dyn AuthService> {
        &self.auth
    }

    /// Ticket for the identity currently held, if any.
    #[must_use]
    pub fn ticket(&self) -> Option<FetchTicket> {
        let state = self.state.borrow();
        state.identity.as_ref().map(|i| FetchTicket { user_id: i.id, epoch: state.epoch })
    }

    pub fn set_profile(&self, profile: Option<Profile>) {
        self.state.send_modify(|s| s.profile = profile);
    }

    pub fn set_loading(&self, loading: bool) {
        self.state.send_modify(|s| s.loading = loading);
    }

    /// Replace the identity and start a new epoch.
    ///
    /// The profile is cleared when the identity becomes absent or belongs
    /// to a different user. Returns the ticket to fetch the new identity's
    /// profile with.
    pub(crate) fn set_identity(&self, identity: Option<Identity>) -> Option<FetchTicket> {
        let mut ticket = None;
        self.state.send_modify(|s| ticket = replace_identity(s, identity));
        ticket
    }

    /// Like [`set_identity`](Self::set_identity), but only while the store
    /// is still at `epoch`. A newer identity write wins and this one is
    /// dropped.
    #[must_use]
    pub(crate) fn set_identity_if_current(&self, epoch: u64, identity: Option<Identity>) -> IdentityWrite {
        let mut outcome = IdentityWrite::Superseded;
        self.state.send_if_modified(|s| {
            if s.epoch != epoch {
                return false;
            }
            outcome = IdentityWrite::Committed(replace_identity(s, identity));
            true
        });
        outcome
    }

    /// Fetch the profile of the identity currently held.
    ///
    /// With no identity the profile is cleared. Lookup failures are logged
    /// and leave the profile empty.
    pub async fn fetch_profile(&self) -> Option<Profile> {
        match self.ticket() {
            Some(ticket) => self.fetch_profile_for(ticket).await,
            None => {
                self.set_profile(None);
                None
            }
        }
    }

    /// Fetch the profile for `ticket` and commit it if the ticket is still
    /// current. Returns the profile only when it was committed.
    pub async fn fetch_profile_for(&self, ticket: FetchTicket) -> Option<Profile> {
        let fetched = match self.profiles.fetch_profile(ticket.user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id = %ticket.user_id, error = %e, "profile fetch failed");
                return None;
            }
        };

        if fetched.is_none() {
            debug!(user_id = %ticket.user_id, "no profile row");
        }

        if self.commit_profile(ticket, fetched.clone()) {
            fetched
        } else {
            debug!(user_id = %ticket.user_id, epoch = ticket.epoch, "discarding stale profile");
            None
        }
    }

    fn commit_profile(&self, ticket: FetchTicket, profile: Option<Profile>) -> bool {
        let mut accepted = false;
        self.state.send_if_modified(|s| {
            if s.epoch != ticket.epoch {
                return false;
            }
            accepted = true;
            if s.profile == profile {
                return false;
            }
            s.profile = profile;
            true
        });
        accepted
    }

    /// Sign out on the service, then clear identity and profile locally no
    /// matter how the service call went.
    ///
    /// # Errors
    ///
    /// Returns the service error after the local state has been cleared.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self.auth.sign_out().await;
        if let Err(e) = &result {
            warn!(error = %e, "sign-out failed on the service, clearing local session anyway");
        }
        self.set_identity(None);
        result
    }
}

/// Result of a conditional identity write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdentityWrite {
    /// Written; carries the ticket for the new identity, if any.
    Committed(Option<FetchTicket>),
    /// The epoch moved on before the write; nothing changed.
    Superseded,
}

fn replace_identity(s: &mut AuthSnapshot, identity: Option<Identity>) -> Option<FetchTicket> {
    let same_user = matches!((&s.identity, &identity), (Some(old), Some(new)) if old.id == new.id);
    if !same_user {
        s.profile = None;
    }
    s.epoch += 1;
    let ticket = identity.as_ref().map(|i| FetchTicket { user_id: i.id, epoch: s.epoch });
    s.identity = identity;
    ticket
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
