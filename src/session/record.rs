//! Session values held by the store.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AuthStoreError;
use crate::Result;

use super::HydrationStatus;

/// The current user's credentials as known to the client.
///
/// `token` and `user` are set and cleared together by the store, but a
/// session read back from storage may carry only one of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque credential.
    pub token: Option<String>,
    /// Identity record, opaque to the store.
    pub user: Option<Value>,
}

impl Session {
    /// Build a session from a validated token and user.
    pub fn new(token: impl Into<String>, user: Value) -> Result<Self> {
        let token = token.into();
        validate_token(&token)?;
        if user.is_null() {
            return Err(AuthStoreError::InvalidSessionInput(
                "user must not be null".into(),
            ));
        }

        Ok(Self {
            token: Some(token),
            user: Some(user),
        })
    }

    /// Check if neither field is set.
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.user.is_none()
    }

    /// Check if only one of the two fields is set.
    pub fn is_partial(&self) -> bool {
        self.token.is_some() != self.user.is_some()
    }
}

/// Reject tokens that cannot be carried in an `Authorization` header.
pub(crate) fn validate_token(token: &str) -> Result<()> {
    if token.trim().is_empty() {
        return Err(AuthStoreError::InvalidSessionInput("token is empty".into()));
    }
    if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AuthStoreError::InvalidSessionInput(
            "token contains whitespace or control characters".into(),
        ));
    }
    Ok(())
}

/// Point-in-time view of the store, delivered to subscribers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Session fields.
    pub session: Session,
    /// Whether rehydration has completed.
    pub hydration: HydrationStatus,
}

impl Snapshot {
    /// Current token, if any.
    pub fn token(&self) -> Option<&str> {
        self.session.token.as_deref()
    }

    /// Current user, if any.
    pub fn user(&self) -> Option<&Value> {
        self.session.user.as_ref()
    }

    /// Whether rehydration has completed.
    pub fn is_hydrated(&self) -> bool {
        self.hydration.is_hydrated()
    }

    /// Hydrated and holding a token.
    pub fn is_authenticated(&self) -> bool {
        self.is_hydrated() && self.session.token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_session() {
        let session = Session::new("abc123", json!({"id": "u1"})).unwrap();
        assert_eq!(session.token.as_deref(), Some("abc123"));
        assert_eq!(session.user.unwrap()["id"], "u1");
    }

    #[test]
    fn test_rejects_empty_token() {
        assert!(Session::new("", json!({"id": "u1"})).is_err());
        assert!(Session::new("   ", json!({"id": "u1"})).is_err());
    }

    #[test]
    fn test_rejects_malformed_token() {
        assert!(Session::new("abc 123", json!({})).is_err());
        assert!(Session::new("abc\n", json!({})).is_err());
        assert!(Session::new("abc\u{7}", json!({})).is_err());
    }

    #[test]
    fn test_rejects_null_user() {
        let err = Session::new("abc", Value::Null).unwrap_err();
        assert!(matches!(err, AuthStoreError::InvalidSessionInput(_)));
    }

    #[test]
    fn test_partial_and_empty() {
        assert!(Session::default().is_empty());
        assert!(!Session::default().is_partial());

        let token_only = Session {
            token: Some("t".into()),
            user: None,
        };
        assert!(token_only.is_partial());
        assert!(!token_only.is_empty());
    }

    #[test]
    fn test_snapshot_authenticated_requires_hydration() {
        let mut snapshot = Snapshot {
            session: Session::new("t", json!({"id": "u"})).unwrap(),
            hydration: HydrationStatus::NotHydrated,
        };
        assert!(!snapshot.is_authenticated());

        snapshot.hydration = HydrationStatus::Hydrated;
        assert!(snapshot.is_authenticated());
        assert_eq!(snapshot.token(), Some("t"));
    }
}
