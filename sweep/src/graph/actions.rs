//! Bulk unfollow / block.
//!
//! Handles are processed one after another. A failure on one handle is
//! recorded and the loop moves on; only a session rejection stops it.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::error::GraphError;
use crate::graph::{BLOCK_COLLECTION, FOLLOW_COLLECTION, GraphApi, parse_at_uri};
use crate::session::Session;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionReport {
    pub done: Vec<String>,
    /// Nothing to do: not followed (unfollow) or already blocked (block).
    pub skipped: Vec<String>,
    /// Handle and the reason it failed.
    pub failed: Vec<(String, String)>,
}

impl ActionReport {
    pub fn summary(&self, verb: &str) -> String {
        format!(
            "{} {verb}, {} skipped, {} failed",
            self.done.len(),
            self.skipped.len(),
            self.failed.len()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Done,
    Skipped,
}

/// Deletes the viewer's follow record for every handle that has one.
#[instrument(skip_all, fields(handles = handles.len()))]
pub async fn unfollow<A: GraphApi + ?Sized>(
    api: &A,
    session: &Session,
    handles: &[String],
) -> Result<ActionReport, GraphError> {
    run_each("unfollow", session, handles, |handle| unfollow_one(api, session, handle)).await
}

/// Creates a block record for every handle not already blocked.
#[instrument(skip_all, fields(handles = handles.len()))]
pub async fn block<A: GraphApi + ?Sized>(
    api: &A,
    session: &Session,
    handles: &[String],
) -> Result<ActionReport, GraphError> {
    run_each("block", session, handles, |handle| block_one(api, session, handle)).await
}

async fn run_each<'h, F, Fut>(
    action: &'static str,
    session: &Session,
    handles: &'h [String],
    mut op: F,
) -> Result<ActionReport, GraphError>
where
    F: FnMut(&'h str) -> Fut,
    Fut: Future<Output = Result<Outcome, GraphError>>,
{
    if handles.is_empty() {
        return Err(GraphError::NoHandles);
    }
    session.ensure_usable()?;

    let mut report = ActionReport::default();

    for handle in handles {
        match op(handle.as_str()).await {
            Ok(Outcome::Done) => report.done.push(handle.clone()),
            Ok(Outcome::Skipped) => report.skipped.push(handle.clone()),
            Err(e @ GraphError::SessionRejected(_)) => {
                warn!(action, error = %e, "session rejected, stopping");
                return Err(e);
            }
            Err(e) => {
                warn!(action, handle = %handle, error = %e, "action failed");
                report.failed.push((handle.clone(), e.to_string()));
            }
        }
    }

    info!(
        action,
        done = report.done.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "bulk action finished"
    );

    Ok(report)
}

async fn unfollow_one<A: GraphApi + ?Sized>(
    api: &A,
    session: &Session,
    handle: &str,
) -> Result<Outcome, GraphError> {
    let profile = api
        .get_profile(session, handle)
        .await
        .map_err(GraphError::from_upstream)?;

    let Some(follow) = profile.viewer.as_ref().and_then(|v| v.following.as_deref()) else {
        debug!(handle, "not following, skipping");
        return Ok(Outcome::Skipped);
    };

    let uri = parse_at_uri(follow)?;
    if uri.collection != FOLLOW_COLLECTION {
        return Err(GraphError::MalformedUri(follow.to_string()));
    }

    api.delete_record(session, &uri)
        .await
        .map_err(GraphError::from_upstream)?;

    Ok(Outcome::Done)
}

async fn block_one<A: GraphApi + ?Sized>(
    api: &A,
    session: &Session,
    handle: &str,
) -> Result<Outcome, GraphError> {
    let profile = api
        .get_profile(session, handle)
        .await
        .map_err(GraphError::from_upstream)?;

    if profile.is_blocking() {
        debug!(handle, "already blocked, skipping");
        return Ok(Outcome::Skipped);
    }

    let record = json!({
        "$type": BLOCK_COLLECTION,
        "subject": profile.did,
        "createdAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    });

    api.create_record(session, BLOCK_COLLECTION, record)
        .await
        .map_err(GraphError::from_upstream)?;

    Ok(Outcome::Done)
}
