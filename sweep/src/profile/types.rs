use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::profile::sanitize::sanitize;

/// Relationship between the session's account and a profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<bool>,
    /// AT-URI of the viewer's block record, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking: Option<String>,
    /// AT-URI of the viewer's follow record, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub following: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followed_by: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Enriched profile as handed to callers. Always built from sanitized JSON,
/// so it serializes back to plain data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedProfile {
    pub did: String,
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follows_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub labels: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer: Option<ViewerState>,
    /// Every other upstream field, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DetailedProfile {
    /// Sanitizes a raw upstream record and decodes it.
    pub fn from_raw(raw: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(sanitize(raw))
    }

    /// Post count, treating an absent count as zero.
    pub fn posts(&self) -> u64 {
        self.posts_count.unwrap_or(0)
    }

    pub fn is_blocking(&self) -> bool {
        self.viewer.as_ref().is_some_and(|v| v.blocking.is_some())
    }

    /// Whether this profile answers a lookup for `actor` (handle or DID).
    pub fn matches_actor(&self, actor: &str) -> bool {
        self.did == actor || self.handle.eq_ignore_ascii_case(actor)
    }
}

/// Basic profile as listed by the follow graph endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub did: String,
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer: Option<ViewerState>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outcome of a bulk fetch: every requested handle is either in `profiles`
/// or in `failed`, once per occurrence in the input.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub requested: usize,
    /// Not in input order: groups complete concurrently.
    pub profiles: Vec<DetailedProfile>,
    pub failed: Vec<String>,
}

impl BatchResult {
    pub fn new(requested: usize) -> Self {
        Self {
            requested,
            profiles: Vec::with_capacity(requested),
            failed: Vec::new(),
        }
    }

    pub fn loaded(&self) -> usize {
        self.profiles.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} of {} profiles loaded, {} failed",
            self.loaded(),
            self.requested,
            self.failed.len()
        )
    }
}
