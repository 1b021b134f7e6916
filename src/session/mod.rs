//! Session management module.
//!
//! This module holds the current authentication session, its hydration
//! status, and the store that keeps both in sync with a persistence backend.

pub mod credentials;
mod hydration;
mod record;
mod store;

pub use hydration::HydrationStatus;
pub use record::{Session, Snapshot};
pub(crate) use record::validate_token;
pub use store::{RehydrateOutcome, SessionStore};
