//! Backend boundaries: auth service, record store, wire types, and the
//! HTTP client implementing them.
//!
//! ERROR HANDLING
//! ==============
//! Boundary calls return typed errors. The session layer decides which of
//! them degrade to "absent" and which reach the user as a notice.

pub mod auth;
pub mod client;
pub mod records;
pub mod types;

pub use auth::{AuthError, AuthListeners, AuthService, AuthSubscription, SubscriptionHandle};
pub use client::BackendClient;
pub use records::{ListingSource, ProfileSource, RecordError};
pub use types::{AuthChange, AuthEvent, Identity, Listing, ListingStatus, Profile, SaleType, Session};
