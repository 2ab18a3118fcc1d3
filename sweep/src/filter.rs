//! Selection of accounts to act on.

use std::collections::{HashMap, HashSet};

use crate::profile::{DetailedProfile, ProfileView};

/// Accounts followed by the viewer that do not follow back.
pub fn non_followers<'a>(
    following: &'a [ProfileView],
    followers: &[ProfileView],
) -> Vec<&'a ProfileView> {
    one_way(following, followers)
}

/// Entries of `list` absent from `reverse`, the opposite direction of the
/// same relationship. Handles compare case-insensitively.
pub fn one_way<'a>(list: &'a [ProfileView], reverse: &[ProfileView]) -> Vec<&'a ProfileView> {
    let back: HashSet<String> = reverse
        .iter()
        .map(|f| f.handle.to_ascii_lowercase())
        .collect();

    list.iter()
        .filter(|f| !back.contains(&f.handle.to_ascii_lowercase()))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct ProfileFilter {
    /// Keep accounts with at most this many posts.
    pub max_posts: Option<u64>,
    /// Drop accounts the viewer already blocks.
    pub exclude_blocking: bool,
    /// Case-insensitive substring match on the handle.
    pub search: Option<String>,
}

impl ProfileFilter {
    /// Filters `candidates` using whatever detailed data is available.
    ///
    /// A candidate without a detailed profile is kept: missing data never
    /// excludes an account.
    pub fn select<'a>(
        &self,
        candidates: &[&'a ProfileView],
        detailed: &[DetailedProfile],
    ) -> Vec<&'a ProfileView> {
        let by_handle: HashMap<String, &DetailedProfile> = detailed
            .iter()
            .map(|p| (p.handle.to_ascii_lowercase(), p))
            .collect();

        let needle = self.search.as_ref().map(|s| s.to_lowercase());

        candidates
            .iter()
            .copied()
            .filter(|c| {
                let Some(p) = by_handle.get(&c.handle.to_ascii_lowercase()) else {
                    return true;
                };
                self.max_posts.is_none_or(|max| p.posts() <= max)
                    && !(self.exclude_blocking && p.is_blocking())
            })
            .filter(|c| {
                needle
                    .as_deref()
                    .is_none_or(|n| c.handle.to_lowercase().contains(n))
            })
            .collect()
    }
}
