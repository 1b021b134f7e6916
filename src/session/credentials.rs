//! Credential extraction from login responses and header formatting.

use serde_json::Value;

use super::Session;
use crate::error::AuthStoreError;
use crate::Result;

const BEARER: &str = "Bearer ";

/// Body fields that may carry the token, in priority order.
const TOKEN_FIELDS: [&str; 3] = ["access_token", "token", "jwt"];

/// Body fields that may carry the user, in priority order.
const USER_FIELDS: [&str; 3] = ["user", "data", "payload"];

/// Format a token as an `Authorization` header value.
pub fn bearer(token: &str) -> String {
    format!("{BEARER}{token}")
}

/// Strip a case-insensitive `Bearer` scheme from a header value.
///
/// Values without the scheme are returned trimmed.
pub fn strip_bearer(header: &str) -> &str {
    let header = header.trim_start();
    match header.get(..BEARER.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(BEARER) => header[BEARER.len()..].trim(),
        _ => header.trim_end(),
    }
}

/// Resolve a session from a login response.
///
/// The token is taken from the body (`access_token`, `token`, `jwt`) and
/// falls back to the `Authorization` header. The user is the first of
/// `user`, `data`, `payload`, or else the whole body.
pub fn resolve_login_response(body: &Value, authorization: Option<&str>) -> Result<Session> {
    let from_body = TOKEN_FIELDS
        .iter()
        .filter_map(|field| body.get(field).and_then(Value::as_str))
        .find(|token| !token.is_empty());

    let token = from_body
        .or_else(|| authorization.map(strip_bearer).filter(|t| !t.is_empty()))
        .ok_or_else(|| {
            AuthStoreError::MissingCredential("login response did not include an access token".into())
        })?;

    let user = USER_FIELDS
        .iter()
        .filter_map(|field| body.get(field))
        .find(|value| !value.is_null())
        .cloned()
        .unwrap_or_else(|| body.clone());

    Session::new(token, user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bearer_format() {
        assert_eq!(bearer("abc"), "Bearer abc");
    }

    #[test]
    fn test_strip_bearer() {
        assert_eq!(strip_bearer("Bearer abc"), "abc");
        assert_eq!(strip_bearer("bearer   abc"), "abc");
        assert_eq!(strip_bearer("abc"), "abc");
        assert_eq!(strip_bearer("Bear"), "Bear");
    }

    #[test]
    fn test_access_token_and_user() {
        let body = json!({"access_token": "t1", "user": {"id": "u1", "name": "Sara"}});
        let session = resolve_login_response(&body, None).unwrap();
        assert_eq!(session.token.as_deref(), Some("t1"));
        assert_eq!(session.user.unwrap()["name"], "Sara");
    }

    #[test]
    fn test_token_field_priority() {
        let body = json!({"jwt": "j", "token": "t", "data": {"id": 7}});
        let session = resolve_login_response(&body, None).unwrap();
        assert_eq!(session.token.as_deref(), Some("t"));
        assert_eq!(session.user.unwrap()["id"], 7);
    }

    #[test]
    fn test_header_fallback() {
        let body = json!({"id": "u9"});
        let session = resolve_login_response(&body, Some("Bearer from-header")).unwrap();
        assert_eq!(session.token.as_deref(), Some("from-header"));
        // Whole body is the user when no wrapper field exists.
        assert_eq!(session.user.unwrap()["id"], "u9");
    }

    #[test]
    fn test_missing_token() {
        let err = resolve_login_response(&json!({"user": {}}), None).unwrap_err();
        assert!(matches!(err, AuthStoreError::MissingCredential(_)));

        let err = resolve_login_response(&json!({"token": ""}), Some("Bearer ")).unwrap_err();
        assert!(matches!(err, AuthStoreError::MissingCredential(_)));
    }
}
