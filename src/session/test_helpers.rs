//! Test doubles for the auth and profile boundaries.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use time::macros::datetime;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::net::auth::{AuthError, AuthListeners, AuthService, AuthSubscription};
use crate::net::records::{ProfileSource, RecordError};
use crate::net::types::{AuthChange, AuthEvent, Identity, Profile, Session};

pub fn profile(id: Uuid, name: &str) -> Profile {
    Profile {
        id,
        name: name.to_owned(),
        bio: None,
        avatar_url: None,
        banner_url: None,
        wallet_address: None,
        created_at: datetime!(2024-05-01 10:00:00 UTC),
        updated_at: datetime!(2024-05-01 10:00:00 UTC),
    }
}

pub fn session_for(id: Uuid) -> Session {
    Session {
        access_token: format!("at-{id}"),
        refresh_token: format!("rt-{id}"),
        token_type: "bearer".into(),
        expires_in: None,
        expires_at: None,
        user: Identity::new(id),
    }
}

pub fn signed_in(id: Uuid) -> AuthChange {
    AuthChange { event: AuthEvent::SignedIn, session: Some(session_for(id)) }
}

pub fn signed_out() -> AuthChange {
    AuthChange { event: AuthEvent::SignedOut, session: None }
}

// =============================================================================
// MockAuth
// =============================================================================

#[derive(Default)]
pub struct MockAuth {
    pub listeners: AuthListeners,
    pub session: Mutex<Option<Session>>,
    pub fail_get_session: bool,
    pub fail_sign_out: bool,
    /// Password accepted by `sign_in_with_password`.
    pub password: Option<String>,
    pub sign_out_calls: AtomicUsize,
    /// Holds the next `get_session`: signals entry, then waits for release.
    pub(crate) session_gate: Mutex<Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>>,
}

impl MockAuth {
    pub fn with_session(session: Session) -> Self {
        Self { session: Mutex::new(Some(session)), ..Self::default() }
    }

    /// Hold the next `get_session`. Returns a receiver that fires once the
    /// call is waiting and the sender that lets it finish.
    pub fn gate_get_session(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        *self.session_gate.lock().unwrap() = Some((entered_tx, release_rx));
        (entered_rx, release_tx)
    }
}

#[async_trait::async_trait]
impl AuthService for MockAuth {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        if self.password.as_deref() != Some(password) {
            return Err(AuthError::Rejected("Invalid login credentials".into()));
        }
        let session = Session {
            user: Identity::new(Uuid::new_v4()).with_email(email),
            ..session_for(Uuid::nil())
        };
        *self.session.lock().unwrap() = Some(session.clone());
        self.listeners.emit(&AuthChange { event: AuthEvent::SignedIn, session: Some(session.clone()) });
        Ok(session)
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let gate = self.session_gate.lock().unwrap().take();
        if let Some((entered, release)) = gate {
            let _ = entered.send(());
            let _ = release.await;
        }
        if self.fail_get_session {
            return Err(AuthError::Request("connection refused".into()));
        }
        Ok(self.session.lock().unwrap().clone())
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.listeners.subscribe()
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out {
            return Err(AuthError::Request("network unreachable".into()));
        }
        *self.session.lock().unwrap() = None;
        self.listeners.emit(&signed_out());
        Ok(())
    }
}

// =============================================================================
// MockProfiles
// =============================================================================

/// Profile source whose lookups can be held open per user.
pub struct MockProfiles {
    rows: HashMap<Uuid, Profile>,
    failing: HashSet<Uuid>,
    gates: Mutex<HashMap<Uuid, oneshot::Receiver<()>>>,
    completed: mpsc::UnboundedSender<Uuid>,
    pub calls: AtomicUsize,
}

impl MockProfiles {
    /// Returns the source and a stream of user ids whose lookup finished.
    pub fn new(rows: Vec<Profile>) -> (Self, mpsc::UnboundedReceiver<Uuid>) {
        let (completed, rx) = mpsc::unbounded_channel();
        let source = Self {
            rows: rows.into_iter().map(|p| (p.id, p)).collect(),
            failing: HashSet::new(),
            gates: Mutex::new(HashMap::new()),
            completed,
            calls: AtomicUsize::new(0),
        };
        (source, rx)
    }

    pub fn failing_for(mut self, id: Uuid) -> Self {
        self.failing.insert(id);
        self
    }

    /// Hold the next lookup for `id` until the returned sender fires.
    pub fn gate(&self, id: Uuid) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(id, rx);
        tx
    }
}

#[async_trait::async_trait]
impl ProfileSource for MockProfiles {
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<Profile>, RecordError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().unwrap().remove(&user_id);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let _ = self.completed.send(user_id);
        if self.failing.contains(&user_id) {
            return Err(RecordError::Response { status: 503, message: "unavailable".into() });
        }
        Ok(self.rows.get(&user_id).cloned())
    }
}
