//! Client-side session state: the profile store and the mirror that keeps
//! it in step with the auth service.
//!
//! ERROR HANDLING
//! ==============
//! Only sign-in failures reach the user, as a one-shot notice. Profile and
//! session lookups degrade to "absent", and sign-out always clears local
//! state.

pub mod mirror;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;

use tracing::info;

use crate::net::auth::{AuthError, AuthService};
use crate::net::types::Session;
use crate::notify::Notifier;

pub use mirror::SessionMirror;
pub use store::{AuthSnapshot, FetchTicket, ProfileStore};

/// Sign in with email and password, announcing the outcome as a notice.
///
/// The mirror picks up the new identity from the auth subscription; this
/// function does not touch the store.
///
/// # Errors
///
/// Returns the auth error after publishing it. No retry is attempted.
pub async fn sign_in(
    auth: &dyn AuthService,
    notifier: &Notifier,
    email: &str,
    password: &str,
) -> Result<Session, AuthError> {
    match auth.sign_in_with_password(email, password).await {
        Ok(session) => {
            info!(user_id = %session.user.id, "sign-in succeeded");
            notifier.success("Signed in successfully!");
            Ok(session)
        }
        Err(e) => {
            let message = e.to_string();
            if message.trim().is_empty() {
                notifier.error("Failed to sign in");
            } else {
                notifier.error(message);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
