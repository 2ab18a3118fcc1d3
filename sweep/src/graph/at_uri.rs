use std::fmt;

use crate::error::GraphError;

const SCHEME: &str = "at://";

/// `at://<repo>/<collection>/<rkey>` reference to a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtUri {
    pub repo: String,
    pub collection: String,
    pub rkey: String,
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}/{}", self.repo, self.collection, self.rkey)
    }
}

pub fn parse_at_uri(uri: &str) -> Result<AtUri, GraphError> {
    let malformed = || GraphError::MalformedUri(uri.to_string());

    let rest = uri.strip_prefix(SCHEME).ok_or_else(malformed)?;
    let mut parts = rest.split('/');

    let (Some(repo), Some(collection), Some(rkey), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed());
    };

    if repo.is_empty() || collection.is_empty() || rkey.is_empty() {
        return Err(malformed());
    }

    Ok(AtUri {
        repo: repo.to_string(),
        collection: collection.to_string(),
        rkey: rkey.to_string(),
    })
}
