//! Follow graph: listing and bulk unfollow / block.

pub mod actions;
pub mod at_uri;
pub mod listing;

use async_trait::async_trait;
use serde_json::Value;

use crate::profile::{DetailedProfile, ProfileView};
use crate::session::Session;
use crate::xrpc::{RecordRef, XrpcError};

pub use actions::{ActionReport, block, unfollow};
pub use at_uri::{AtUri, parse_at_uri};
pub use listing::{list_followers, list_follows};

pub const FOLLOW_COLLECTION: &str = "app.bsky.graph.follow";
pub const BLOCK_COLLECTION: &str = "app.bsky.graph.block";

/// One page of a cursor-paginated graph listing.
#[derive(Debug, Clone, Default)]
pub struct GraphPage {
    pub members: Vec<ProfileView>,
    pub cursor: Option<String>,
}

/// Upstream operations the graph workflows need.
#[async_trait]
pub trait GraphApi: Send + Sync {
    async fn follows_page(
        &self,
        session: &Session,
        actor: &str,
        cursor: Option<&str>,
    ) -> Result<GraphPage, XrpcError>;

    async fn followers_page(
        &self,
        session: &Session,
        actor: &str,
        cursor: Option<&str>,
    ) -> Result<GraphPage, XrpcError>;

    async fn get_profile(&self, session: &Session, actor: &str)
    -> Result<DetailedProfile, XrpcError>;

    /// Writes `record` into the session's own repository.
    async fn create_record(
        &self,
        session: &Session,
        collection: &str,
        record: Value,
    ) -> Result<RecordRef, XrpcError>;

    async fn delete_record(&self, session: &Session, uri: &AtUri) -> Result<(), XrpcError>;
}
