//! Record store boundary — single-row lookups against the hosted tables.

use uuid::Uuid;

use super::types::{Listing, Profile};

/// Errors produced by record lookups.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("record request failed: {0}")]
    Request(String),

    #[error("record store error: status {status}: {message}")]
    Response { status: u16, message: String },

    #[error("record response parse failed: {0}")]
    Parse(String),
}

/// Lookup of `profiles` rows by user id.
#[async_trait::async_trait]
pub trait ProfileSource: Send + Sync {
    /// Fetch the profile whose primary key is `user_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordError`] on transport or decode failure. A missing
    /// row is `Ok(None)`.
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<Profile>, RecordError>;
}

/// Lookup of `nfts` rows.
#[async_trait::async_trait]
pub trait ListingSource: Send + Sync {
    /// Timed auctions, soonest-ending first.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordError`] on transport or decode failure.
    async fn live_auctions(&self, limit: usize) -> Result<Vec<Listing>, RecordError>;

    /// A single listing by id.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordError`] on transport or decode failure.
    async fn fetch_listing(&self, id: Uuid) -> Result<Option<Listing>, RecordError>;
}
