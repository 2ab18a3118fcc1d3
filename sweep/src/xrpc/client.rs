use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::graph::{AtUri, GraphApi, GraphPage};
use crate::profile::{DetailedProfile, ProfileLookup, sanitize};
use crate::session::Session;
use crate::xrpc::errors::XrpcError;
use crate::xrpc::types::{
    CreateRecordRequest, DeleteRecordRequest, ErrorBody, FollowersEnvelope, FollowsEnvelope,
    ProfilesEnvelope, RecordRef,
};

const GET_PROFILE: &str = "app.bsky.actor.getProfile";
const GET_PROFILES: &str = "app.bsky.actor.getProfiles";
const GET_FOLLOWS: &str = "app.bsky.graph.getFollows";
const GET_FOLLOWERS: &str = "app.bsky.graph.getFollowers";
const CREATE_RECORD: &str = "com.atproto.repo.createRecord";
const DELETE_RECORD: &str = "com.atproto.repo.deleteRecord";

/// Page size requested from the follow graph endpoints (upstream maximum).
const GRAPH_PAGE_LIMIT: &str = "100";

/// Thin XRPC adapter authenticating every call with the session's access token.
#[derive(Clone)]
pub struct XrpcClient {
    http: Client,
    url: String,
}

impl XrpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, XrpcError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .user_agent(concat!("sweep/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let url = url.into().trim_end_matches('/').to_string();
        Ok(Self { http, url })
    }

    fn endpoint(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.url, nsid)
    }

    async fn query<T: DeserializeOwned>(
        &self,
        session: &Session,
        nsid: &str,
        params: &[(&str, &str)],
    ) -> Result<T, XrpcError> {
        let resp = self
            .http
            .get(self.endpoint(nsid))
            .bearer_auth(&session.access_jwt)
            .query(params)
            .send()
            .await?;

        decode(resp).await
    }

    async fn procedure<B: Serialize, T: DeserializeOwned>(
        &self,
        session: &Session,
        nsid: &str,
        body: &B,
    ) -> Result<T, XrpcError> {
        let resp = self
            .http
            .post(self.endpoint(nsid))
            .bearer_auth(&session.access_jwt)
            .json(body)
            .send()
            .await?;

        decode(resp).await
    }
}

/// Maps an XRPC response onto `T`, or onto `XrpcError::Status` using the
/// standard `{error, message}` body.
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, XrpcError> {
    let status = resp.status();

    if !status.is_success() {
        let body: ErrorBody = resp.json().await.unwrap_or_default();
        let message = body
            .message
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "unknown error".to_string());

        return Err(XrpcError::Status {
            status: status.as_u16(),
            error: body.error,
            message,
        });
    }

    let bytes = resp.bytes().await?;
    // Some procedures answer 200 with an empty body.
    let bytes: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };

    serde_json::from_slice(bytes).map_err(|e| XrpcError::InvalidResponse(e.to_string()))
}

fn from_sanitized<T: DeserializeOwned>(raw: Value) -> Result<T, XrpcError> {
    serde_json::from_value(sanitize(raw)).map_err(|e| XrpcError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl ProfileLookup for XrpcClient {
    #[instrument(skip(self, session, actors), fields(actors = actors.len()), level = "debug")]
    async fn lookup_profiles(
        &self,
        session: &Session,
        actors: &[String],
    ) -> Result<Vec<Value>, XrpcError> {
        let params: Vec<(&str, &str)> = actors.iter().map(|a| ("actors", a.as_str())).collect();

        let envelope: ProfilesEnvelope = self.query(session, GET_PROFILES, &params).await?;

        debug!(returned = envelope.profiles.len(), "profiles fetched");
        Ok(envelope.profiles)
    }

    #[instrument(skip(self, session), level = "debug")]
    async fn lookup_profile(&self, session: &Session, actor: &str) -> Result<Value, XrpcError> {
        self.query(session, GET_PROFILE, &[("actor", actor)]).await
    }
}

#[async_trait]
impl GraphApi for XrpcClient {
    #[instrument(skip(self, session), level = "debug")]
    async fn follows_page(
        &self,
        session: &Session,
        actor: &str,
        cursor: Option<&str>,
    ) -> Result<GraphPage, XrpcError> {
        let mut params = vec![("actor", actor), ("limit", GRAPH_PAGE_LIMIT)];
        if let Some(c) = cursor {
            params.push(("cursor", c));
        }

        let raw: Value = self.query(session, GET_FOLLOWS, &params).await?;
        let envelope: FollowsEnvelope = from_sanitized(raw)?;

        Ok(GraphPage {
            members: envelope.follows,
            cursor: envelope.cursor,
        })
    }

    #[instrument(skip(self, session), level = "debug")]
    async fn followers_page(
        &self,
        session: &Session,
        actor: &str,
        cursor: Option<&str>,
    ) -> Result<GraphPage, XrpcError> {
        let mut params = vec![("actor", actor), ("limit", GRAPH_PAGE_LIMIT)];
        if let Some(c) = cursor {
            params.push(("cursor", c));
        }

        let raw: Value = self.query(session, GET_FOLLOWERS, &params).await?;
        let envelope: FollowersEnvelope = from_sanitized(raw)?;

        Ok(GraphPage {
            members: envelope.followers,
            cursor: envelope.cursor,
        })
    }

    async fn get_profile(
        &self,
        session: &Session,
        actor: &str,
    ) -> Result<DetailedProfile, XrpcError> {
        let raw = self.lookup_profile(session, actor).await?;
        DetailedProfile::from_raw(raw).map_err(|e| XrpcError::InvalidResponse(e.to_string()))
    }

    #[instrument(skip(self, session, record), fields(repo = %session.did), level = "debug")]
    async fn create_record(
        &self,
        session: &Session,
        collection: &str,
        record: Value,
    ) -> Result<RecordRef, XrpcError> {
        let body = CreateRecordRequest {
            repo: &session.did,
            collection,
            record,
        };
        self.procedure(session, CREATE_RECORD, &body).await
    }

    #[instrument(skip(self, session), fields(uri = %uri), level = "debug")]
    async fn delete_record(&self, session: &Session, uri: &AtUri) -> Result<(), XrpcError> {
        let body = DeleteRecordRequest {
            repo: &uri.repo,
            collection: &uri.collection,
            rkey: &uri.rkey,
        };
        let _: Value = self.procedure(session, DELETE_RECORD, &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = XrpcClient::new("https://bsky.social/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint(GET_PROFILES),
            "https://bsky.social/xrpc/app.bsky.actor.getProfiles"
        );
    }
}
