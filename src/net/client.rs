//! HTTP client for the hosted backend (auth + record APIs).
//!
//! DESIGN
//! ======
//! Thin reqwest wrapper. The current session is held in memory behind a
//! mutex that is never held across an await; every transition (sign-in,
//! refresh, sign-out) is announced through `AuthListeners`.
//!
//! Response handling lives in pure functions (`parse_session`,
//! `parse_rows`, `error_message`) so it can be tested without a server.

use std::sync::Mutex;
use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::auth::{AuthError, AuthListeners, AuthService, AuthSubscription};
use super::records::{ListingSource, ProfileSource, RecordError};
use super::types::{AuthChange, AuthEvent, Listing, Profile, Session};
use crate::config::BackendConfig;

// =============================================================================
// CLIENT
// =============================================================================

pub struct BackendClient {
    http: reqwest::Client,
    config: BackendConfig,
    session: Mutex<Option<Session>>,
    listeners: AuthListeners,
}

impl BackendClient {
    /// Build a client for the configured project.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(config: BackendConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| AuthError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, config, session: Mutex::new(None), listeners: AuthListeners::new() })
    }

    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Adopt a previously persisted session without contacting the service.
    pub fn restore_session(&self, session: Session) {
        info!(user_id = %session.user.id, "session restored");
        self.replace_session(Some(session.clone()));
        self.listeners.emit(&AuthChange { event: AuthEvent::InitialSession, session: Some(session) });
    }

    /// Exchange the held refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NoSession`] if nothing is held, or the service
    /// error. A rejected refresh token drops the local session.
    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let refresh_token = self.current_session().map(|s| s.refresh_token).ok_or(AuthError::NoSession)?;

        let result = self
            .token_request("refresh_token", &serde_json::json!({ "refresh_token": refresh_token }))
            .await;

        match result {
            Ok(session) => {
                debug!(user_id = %session.user.id, "session refreshed");
                self.replace_session(Some(session.clone()));
                self.listeners.emit(&AuthChange { event: AuthEvent::TokenRefreshed, session: Some(session.clone()) });
                Ok(session)
            }
            Err(AuthError::Rejected(reason)) => {
                warn!(%reason, "refresh token rejected, dropping session");
                self.replace_session(None);
                self.listeners.emit(&AuthChange { event: AuthEvent::SignedOut, session: None });
                Err(AuthError::Rejected(reason))
            }
            Err(e) => Err(e),
        }
    }

    fn current_session(&self) -> Option<Session> {
        self.session.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    fn replace_session(&self, session: Option<Session>) -> Option<Session> {
        let mut guard = self.session.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::replace(&mut *guard, session)
    }

    /// Attach `apikey` and the bearer (session token or anon key).
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .current_session()
            .map_or_else(|| self.config.anon_key.clone(), |s| s.access_token);
        request
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {bearer}"))
    }

    async fn token_request(&self, grant_type: &str, body: &serde_json::Value) -> Result<Session, AuthError> {
        let url = format!("{}/auth/v1/token?grant_type={grant_type}", self.config.url);
        let response = self
            .http
            .post(url)
            .header("apikey", &self.config.anon_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(auth_status_error(status, &text));
        }
        parse_session(&text, OffsetDateTime::now_utc())
    }

    async fn get_rows<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, RecordError> {
        let response = self
            .authorize(self.http.get(url))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| RecordError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RecordError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(RecordError::Response { status: status.as_u16(), message: error_message(&text) });
        }
        parse_rows(&text)
    }
}

#[async_trait::async_trait]
impl AuthService for BackendClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self
            .token_request("password", &serde_json::json!({ "email": email, "password": password }))
            .await?;

        info!(user_id = %session.user.id, "signed in");
        self.replace_session(Some(session.clone()));
        self.listeners.emit(&AuthChange { event: AuthEvent::SignedIn, session: Some(session.clone()) });
        Ok(session)
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(session) = self.current_session() else {
            return Ok(None);
        };
        if !session.is_expired_at(OffsetDateTime::now_utc()) {
            return Ok(Some(session));
        }

        match self.refresh_session().await {
            Ok(session) => Ok(Some(session)),
            Err(AuthError::Rejected(_) | AuthError::NoSession) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.listeners.subscribe()
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(session) = self.replace_session(None) else {
            return Ok(());
        };
        self.listeners.emit(&AuthChange { event: AuthEvent::SignedOut, session: None });

        let url = format!("{}/auth/v1/logout", self.config.url);
        let response = self
            .http
            .post(url)
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            info!(user_id = %session.user.id, "signed out");
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(auth_status_error(status, &text))
    }
}

#[async_trait::async_trait]
impl ProfileSource for BackendClient {
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<Profile>, RecordError> {
        let url = profile_url(&self.config.url, user_id);
        Ok(self.get_rows::<Profile>(&url).await?.into_iter().next())
    }
}

#[async_trait::async_trait]
impl ListingSource for BackendClient {
    async fn live_auctions(&self, limit: usize) -> Result<Vec<Listing>, RecordError> {
        self.get_rows(&live_auctions_url(&self.config.url, limit)).await
    }

    async fn fetch_listing(&self, id: Uuid) -> Result<Option<Listing>, RecordError> {
        let url = listing_url(&self.config.url, id);
        Ok(self.get_rows::<Listing>(&url).await?.into_iter().next())
    }
}

// =============================================================================
// URLS
// =============================================================================

fn profile_url(base: &str, user_id: Uuid) -> String {
    format!("{base}/rest/v1/profiles?id=eq.{user_id}&select=*&limit=1")
}

fn listing_url(base: &str, id: Uuid) -> String {
    format!("{base}/rest/v1/nfts?id=eq.{id}&select=*&limit=1")
}

fn live_auctions_url(base: &str, limit: usize) -> String {
    format!(
        "{base}/rest/v1/nfts?select=*&sale_type=eq.auction&auction_end_time=not.is.null&order=auction_end_time.asc&limit={limit}"
    )
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_session(json: &str, issued_at: OffsetDateTime) -> Result<Session, AuthError> {
    let session: Session = serde_json::from_str(json).map_err(|e| AuthError::Parse(e.to_string()))?;
    Ok(session.with_expiry_from(issued_at))
}

fn parse_rows<T: DeserializeOwned>(json: &str) -> Result<Vec<T>, RecordError> {
    serde_json::from_str(json).map_err(|e| RecordError::Parse(e.to_string()))
}

fn auth_status_error(status: StatusCode, body: &str) -> AuthError {
    let message = error_message(body);
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::UNPROCESSABLE_ENTITY => {
            AuthError::Rejected(message)
        }
        _ => AuthError::Response { status: status.as_u16(), message },
    }
}

/// Best human-readable message from an error body.
fn error_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error_description: Option<String>,
        msg: Option<String>,
        message: Option<String>,
        error: Option<String>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(e) => e
            .error_description
            .or(e.msg)
            .or(e.message)
            .or(e.error)
            .unwrap_or_else(|| body.to_owned()),
        Err(_) if body.trim().is_empty() => "empty response".to_owned(),
        Err(_) => body.to_owned(),
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
