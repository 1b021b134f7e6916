//! Stored representation of a session.
//!
//! Sessions are written as `{"state": {"token": ..., "user": ...}, "version": 0}`.
//! The bare `{"token": ..., "user": ...}` form is still accepted on read.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::session::{validate_token, Session};
use crate::Result;

/// Envelope version written by this crate.
pub const VERSION: u32 = 0;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    state: &'a Session,
    version: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Stored {
    Envelope {
        state: Session,
        #[serde(default)]
        version: u32,
    },
    Bare(Session),
}

/// Encode a session for storage.
pub fn encode(session: &Session) -> Result<String> {
    let envelope = EnvelopeRef {
        state: session,
        version: VERSION,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Decode a stored value.
///
/// Returns `Ok(None)` when the value was written with a different envelope
/// version. Empty-string tokens and `null` users decode as absent, and so
/// does any token that `Session::new` would have refused.
pub fn decode(raw: &str) -> Result<Option<Session>> {
    let session = match serde_json::from_str::<Stored>(raw)? {
        Stored::Envelope { state, version } if version == VERSION => state,
        Stored::Envelope { version, .. } => {
            warn!(version, expected = VERSION, "discarding stored session with unknown version");
            return Ok(None);
        }
        Stored::Bare(session) => session,
    };

    Ok(Some(normalize(session)))
}

fn normalize(mut session: Session) -> Session {
    let drop_token = match session.token.as_deref() {
        Some(t) if t.trim().is_empty() => true,
        Some(t) if validate_token(t).is_err() => {
            warn!("discarding stored token with invalid characters");
            true
        }
        _ => false,
    };
    if drop_token {
        session.token = None;
    }
    session
}
