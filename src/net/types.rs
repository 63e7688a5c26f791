//! Wire types shared by the auth and record boundaries.
//!
//! Field names follow the backend's JSON (snake_case columns, GoTrue session
//! shape); timestamps are RFC 3339.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::countdown::{RemainingDuration, remaining};

// =============================================================================
// IDENTITY / SESSION
// =============================================================================

/// Authenticated user as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self { id, email: None, role: None }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Auth session returned by sign-in and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: Identity,
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

impl Session {
    /// Whether the access token has expired at `now`. Sessions without an
    /// expiry never expire locally.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| now.unix_timestamp() >= at)
    }

    /// Fill `expires_at` from `expires_in` when the server omitted it.
    #[must_use]
    pub fn with_expiry_from(mut self, issued_at: OffsetDateTime) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in.map(|secs| issued_at.unix_timestamp() + secs);
        }
        self
    }
}

/// Kind of session transition reported to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// One notification from the auth subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthChange {
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(|s| &s.user)
    }
}

// =============================================================================
// PROFILE
// =============================================================================

/// Row of the `profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub banner_url: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// LISTING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Available,
    Sold,
    Auction,
    Draft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleType {
    Fixed,
    Auction,
    Bid,
}

/// Row of the `nfts` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub media_url: String,
    pub owner_id: Uuid,
    pub creator_id: Uuid,
    #[serde(default)]
    pub price: f64,
    pub status: ListingStatus,
    pub sale_type: SaleType,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub likes: i64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub auction_end_time: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Listing {
    /// End instant when this listing is a timed auction.
    #[must_use]
    pub fn auction_end(&self) -> Option<OffsetDateTime> {
        match self.sale_type {
            SaleType::Auction => self.auction_end_time,
            SaleType::Fixed | SaleType::Bid => None,
        }
    }

    /// Time left on the auction at `now`; `None` for non-auction listings.
    #[must_use]
    pub fn time_remaining(&self, now: OffsetDateTime) -> Option<RemainingDuration> {
        self.auction_end().map(|end| remaining(end, now))
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
