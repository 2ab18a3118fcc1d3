use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::profile::ProfileView;

/// `app.bsky.actor.getProfiles` output. Profiles stay raw until sanitized.
#[derive(Debug, Deserialize)]
pub struct ProfilesEnvelope {
    pub profiles: Vec<Value>,
}

/// `app.bsky.graph.getFollows` output.
#[derive(Debug, Deserialize)]
pub struct FollowsEnvelope {
    #[serde(default)]
    pub follows: Vec<ProfileView>,
    pub cursor: Option<String>,
}

/// `app.bsky.graph.getFollowers` output.
#[derive(Debug, Deserialize)]
pub struct FollowersEnvelope {
    #[serde(default)]
    pub followers: Vec<ProfileView>,
    pub cursor: Option<String>,
}

/// Body of any non-2xx XRPC response.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateRecordRequest<'a> {
    pub repo: &'a str,
    pub collection: &'a str,
    pub record: Value,
}

#[derive(Debug, Serialize)]
pub struct DeleteRecordRequest<'a> {
    pub repo: &'a str,
    pub collection: &'a str,
    pub rkey: &'a str,
}

/// Reference to a freshly written record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordRef {
    pub uri: String,
    pub cid: String,
}
