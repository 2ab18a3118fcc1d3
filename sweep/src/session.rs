use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Bearer credentials for an already authenticated account.
///
/// Produced by whatever performed the login and persisted by the caller.
/// Nothing in this crate mutates or refreshes it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub did: String,
    pub handle: String,
    pub access_jwt: String,
    #[serde(default)]
    pub refresh_jwt: String,
}

impl Session {
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Cheap local check run before any network activity.
    pub fn ensure_usable(&self) -> Result<(), SessionError> {
        if self.access_jwt.trim().is_empty() {
            return Err(SessionError::Unusable("an access token"));
        }
        if self.did.trim().is_empty() {
            return Err(SessionError::Unusable("a DID"));
        }
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("did", &self.did)
            .field("handle", &self.handle)
            .field("access_jwt", &"<redacted>")
            .field("refresh_jwt", &"<redacted>")
            .finish()
    }
}
