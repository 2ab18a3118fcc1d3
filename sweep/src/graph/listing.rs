use tracing::{info, instrument, warn};

use crate::error::GraphError;
use crate::graph::{GraphApi, GraphPage};
use crate::profile::ProfileView;
use crate::session::Session;
use crate::xrpc::XrpcError;

/// Every account `actor` follows.
#[instrument(skip(api, session))]
pub async fn list_follows<A: GraphApi + ?Sized>(
    api: &A,
    session: &Session,
    actor: &str,
) -> Result<Vec<ProfileView>, GraphError> {
    let out = collect_pages(|cursor| async move {
        api.follows_page(session, actor, cursor.as_deref()).await
    })
    .await?;

    info!(count = out.len(), "follows listed");
    Ok(out)
}

/// Every account following `actor`.
#[instrument(skip(api, session))]
pub async fn list_followers<A: GraphApi + ?Sized>(
    api: &A,
    session: &Session,
    actor: &str,
) -> Result<Vec<ProfileView>, GraphError> {
    let out = collect_pages(|cursor| async move {
        api.followers_page(session, actor, cursor.as_deref()).await
    })
    .await?;

    info!(count = out.len(), "followers listed");
    Ok(out)
}

/// Walks the cursor until the upstream stops handing one out.
/// A cursor that repeats ends the walk instead of looping forever.
async fn collect_pages<F, Fut>(mut next_page: F) -> Result<Vec<ProfileView>, GraphError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<GraphPage, XrpcError>>,
{
    let mut members = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = next_page(cursor.clone())
            .await
            .map_err(GraphError::from_upstream)?;

        members.extend(page.members);

        match page.cursor {
            None => break,
            Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                warn!(cursor = %next, "upstream repeated a cursor, stopping");
                break;
            }
            Some(next) => cursor = Some(next),
        }
    }

    Ok(members)
}
