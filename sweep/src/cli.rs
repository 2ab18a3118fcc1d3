use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use sweep::config::FetchConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Audience {
    /// Accounts following the session's account.
    Followers,
    /// Accounts the session's account follows.
    Following,
}

#[derive(Debug, Parser)]
#[clap(name = "sweep", version, about = "Bulk profile lookups, unfollows and blocks")]
pub struct Cli {
    /// Session JSON file (overrides SWEEP_SESSION_FILE)
    #[clap(long)]
    pub session: Option<PathBuf>,

    /// Actors per multi-actor lookup
    #[clap(long)]
    pub group_size: Option<usize>,

    /// Lookup groups in flight at once
    #[clap(long)]
    pub concurrency: Option<usize>,

    /// Multi-actor attempts per group before single lookups
    #[clap(long)]
    pub max_retries: Option<u32>,

    /// Linear backoff base in milliseconds
    #[clap(long)]
    pub retry_backoff_ms: Option<u64>,

    /// Pause between waves in milliseconds
    #[clap(long)]
    pub inter_group_delay_ms: Option<u64>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print detailed profiles as JSON, for a follow list or for given handles
    Profiles {
        #[clap(long, value_enum, conflicts_with = "handles", required_unless_present = "handles")]
        of: Option<Audience>,

        handles: Vec<String>,
    },

    /// Print handles from a follow list that pass the filters
    Candidates {
        #[clap(long, value_enum, default_value = "following")]
        of: Audience,

        /// Keep only one-way relationships: followed accounts that do not
        /// follow back, or followers that are not followed back
        #[clap(long)]
        one_way: bool,

        /// Keep accounts with at most this many posts
        #[clap(long)]
        max_posts: Option<u64>,

        /// Drop accounts already blocked
        #[clap(long)]
        exclude_blocking: bool,

        /// Case-insensitive substring filter on the handle
        #[clap(long)]
        search: Option<String>,
    },

    /// Unfollow the given handles
    Unfollow {
        #[clap(required = true)]
        handles: Vec<String>,
    },

    /// Block the given handles
    Block {
        #[clap(required = true)]
        handles: Vec<String>,
    },
}

impl Cli {
    /// Command line flags win over environment values.
    pub fn apply_overrides(&self, fetch: &mut FetchConfig) {
        if let Some(v) = self.group_size {
            fetch.group_size = v;
        }
        if let Some(v) = self.concurrency {
            fetch.concurrency = v;
        }
        if let Some(v) = self.max_retries {
            fetch.max_retries = v;
        }
        if let Some(v) = self.retry_backoff_ms {
            fetch.retry_backoff_ms = v;
        }
        if let Some(v) = self.inter_group_delay_ms {
            fetch.inter_group_delay_ms = v;
        }
    }
}
