//! Access gating for consumers of the session store.
//!
//! A gate never makes an authorization decision before the store is
//! hydrated. After that it branches on the token and, optionally, on the
//! user's role.
//!
//! ## Example
//!
//! ```rust
//! use auth_store::gate::{evaluate, AccessDecision};
//! use auth_store::Snapshot;
//!
//! let snapshot = Snapshot::default();
//! assert_eq!(evaluate(&snapshot, "/visits"), AccessDecision::Checking);
//! ```

use serde::Serialize;
use serde_json::Value;

use crate::session::Snapshot;

/// Where unauthenticated visitors are sent.
pub const LOGIN_ROUTE: &str = "/login";

/// Where users without an allowed role are sent.
pub const FORBIDDEN_ROUTE: &str = "/dashboard";

/// Where a login lands when no previous location was recorded.
pub const DEFAULT_LANDING: &str = "/today-route";

/// Outcome of gating a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    /// The store is not hydrated yet; show a neutral "checking session" state.
    Checking,
    /// No session. `from` is kept so the login flow can return there.
    Denied { redirect_to: String, from: String },
    /// Authenticated, but the user's role is not allowed here.
    Forbidden { redirect_to: String, from: String },
    /// Proceed.
    Granted,
}

impl AccessDecision {
    /// Check if access was granted.
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted)
    }

    /// Redirect target, if the decision is a redirect.
    pub fn redirect_to(&self) -> Option<&str> {
        match self {
            AccessDecision::Denied { redirect_to, .. }
            | AccessDecision::Forbidden { redirect_to, .. } => Some(redirect_to),
            _ => None,
        }
    }
}

/// Gate `location` on the session alone.
pub fn evaluate(snapshot: &Snapshot, location: &str) -> AccessDecision {
    if !snapshot.is_hydrated() {
        return AccessDecision::Checking;
    }

    match snapshot.token() {
        None => AccessDecision::Denied {
            redirect_to: LOGIN_ROUTE.to_string(),
            from: location.to_string(),
        },
        Some(_) => AccessDecision::Granted,
    }
}

/// Where to go after a successful login.
///
/// Returns the recorded location, or [`DEFAULT_LANDING`] when there is none
/// or it points back at the login page.
pub fn post_login_target(from: Option<&str>) -> &str {
    match from {
        Some(path) if !path.is_empty() && path != LOGIN_ROUTE => path,
        _ => DEFAULT_LANDING,
    }
}

/// Normalize a role value for comparison.
///
/// Strings are lowercased; objects contribute their `slug` field; anything
/// else normalizes to an empty string.
pub fn normalize_role(value: &Value) -> String {
    match value {
        Value::String(role) => role.to_lowercase(),
        Value::Object(map) => match map.get("slug") {
            Some(Value::String(slug)) => slug.to_lowercase(),
            Some(Value::Number(slug)) => slug.to_string(),
            _ => String::new(),
        },
        _ => String::new(),
    }
}

/// Role of a user record, read from `role` or `roleSlug`.
pub fn user_role(user: &Value) -> String {
    ["role", "roleSlug"]
        .iter()
        .filter_map(|field| user.get(field))
        .map(normalize_role)
        .find(|role| !role.is_empty())
        .unwrap_or_default()
}

/// Gate that also requires one of a set of roles.
#[derive(Debug, Clone, Default)]
pub struct RoleGate {
    roles: Vec<String>,
}

impl RoleGate {
    /// Create a gate allowing the given roles. An empty list allows everyone.
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            roles: roles
                .into_iter()
                .map(|role| role.as_ref().to_lowercase())
                .filter(|role| !role.is_empty())
                .collect(),
        }
    }

    /// Check if a user may pass.
    pub fn allows(&self, user: Option<&Value>) -> bool {
        if self.roles.is_empty() {
            return true;
        }
        let role = user.map(user_role).unwrap_or_default();
        !role.is_empty() && self.roles.iter().any(|allowed| *allowed == role)
    }

    /// Gate `location` on the session, then on the role.
    pub fn evaluate(&self, snapshot: &Snapshot, location: &str) -> AccessDecision {
        match evaluate(snapshot, location) {
            AccessDecision::Granted if !self.allows(snapshot.user()) => AccessDecision::Forbidden {
                redirect_to: FORBIDDEN_ROUTE.to_string(),
                from: location.to_string(),
            },
            decision => decision,
        }
    }
}
