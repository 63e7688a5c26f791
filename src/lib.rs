//! # unitrader
//!
//! Client core for the Unitrader NFT marketplace. The marketplace's data and
//! auth live in a hosted backend; this crate is a consumer of it.
//!
//! It contains the auction countdown (a pure time-remaining calculator plus
//! a cancellable one-second ticker), the session mirror that follows the
//! auth service and keeps the signed-in user's profile loaded, and the HTTP
//! client for the backend's auth and record APIs.

pub mod config;
pub mod countdown;
pub mod net;
pub mod notify;
pub mod session;
