mod cli;

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sweep::{
    config::AppConfig,
    filter::{ProfileFilter, one_way},
    graph::{block, list_followers, list_follows, unfollow},
    handle::normalize_all,
    profile::{BatchProfileFetcher, BatchResult, CancelFlag, ProfileView},
    session::Session,
    xrpc::XrpcClient,
};

use cli::{Audience, Cli, Command};

/// Installed once per process. The first Ctrl-C sets the cancel flag, so a
/// running fetch stops before its next wave and the command stops at its
/// next checkpoint. A second Ctrl-C exits immediately.
fn cancel_on_ctrl_c() -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();

    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if flag.is_cancelled() {
                tracing::warn!("second interrupt, exiting");
                std::process::exit(130);
            }
            tracing::warn!("interrupt received, stopping at the next checkpoint");
            flag.cancel();
        }
    });

    cancel
}

fn checkpoint(cancel: &CancelFlag) -> anyhow::Result<()> {
    if cancel.is_cancelled() {
        anyhow::bail!("interrupted");
    }
    Ok(())
}

async fn list(
    client: &XrpcClient,
    session: &Session,
    of: Audience,
) -> anyhow::Result<Vec<ProfileView>> {
    let listed = match of {
        Audience::Followers => list_followers(client, session, &session.handle).await?,
        Audience::Following => list_follows(client, session, &session.handle).await?,
    };
    Ok(listed)
}

async fn fetch_profiles(
    client: Arc<XrpcClient>,
    cfg: &AppConfig,
    session: &Session,
    handles: &[String],
    cancel: &CancelFlag,
) -> anyhow::Result<BatchResult> {
    let fetcher = BatchProfileFetcher::new(client, cfg.fetch.clone()).with_cancel(cancel.clone());

    let result = fetcher
        .fetch(session, handles)
        .await
        .context("detailed profile fetch failed")?;

    tracing::debug!(counters = ?fetcher.counters().snapshot(), "fetch counters");
    eprintln!("{}", result.summary());

    Ok(result)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = AppConfig::from_env().context("invalid environment configuration")?;
    cli.apply_overrides(&mut cfg.fetch);
    cfg.fetch.validate().context("invalid fetch configuration")?;

    common::logger::init_logger("sweep", cfg.json_logs);

    let session_path = cli
        .session
        .clone()
        .or_else(|| cfg.session_file.clone())
        .context("no session: pass --session or set SWEEP_SESSION_FILE")?;

    let session = Session::load(&session_path)
        .with_context(|| format!("failed to load session from {}", session_path.display()))?;
    session.ensure_usable()?;

    tracing::info!(handle = %session.handle, service = %cfg.service_url, "session loaded");

    let client = Arc::new(XrpcClient::new(cfg.service_url.clone(), cfg.http_timeout)?);
    let cancel = cancel_on_ctrl_c();

    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Command::Profiles { of, handles } => {
            let handles = match of {
                Some(of) => list(&client, &session, of)
                    .await?
                    .into_iter()
                    .map(|p| p.handle)
                    .collect(),
                None => normalize_all(&handles),
            };
            checkpoint(&cancel)?;

            let result = fetch_profiles(client, &cfg, &session, &handles, &cancel).await?;
            serde_json::to_writer_pretty(&mut stdout, &result)?;
            writeln!(stdout)?;
        }

        Command::Candidates {
            of,
            one_way: only_one_way,
            max_posts,
            exclude_blocking,
            search,
        } => {
            let listed = list(&client, &session, of).await?;
            checkpoint(&cancel)?;

            let reverse = if only_one_way {
                let opposite = match of {
                    Audience::Followers => Audience::Following,
                    Audience::Following => Audience::Followers,
                };
                let reverse = list(&client, &session, opposite).await?;
                checkpoint(&cancel)?;
                Some(reverse)
            } else {
                None
            };

            let candidates: Vec<&ProfileView> = match &reverse {
                Some(reverse) => one_way(&listed, reverse),
                None => listed.iter().collect(),
            };

            let filter = ProfileFilter {
                max_posts,
                exclude_blocking,
                search,
            };

            // Detailed data is only needed for the post / block criteria.
            let detailed = if filter.max_posts.is_some() || filter.exclude_blocking {
                let handles: Vec<String> = candidates.iter().map(|p| p.handle.clone()).collect();
                fetch_profiles(client.clone(), &cfg, &session, &handles, &cancel)
                    .await?
                    .profiles
            } else {
                Vec::new()
            };

            for profile in filter.select(&candidates, &detailed) {
                writeln!(stdout, "{}", profile.handle)?;
            }
        }

        Command::Unfollow { handles } => {
            let report = unfollow(client.as_ref(), &session, &normalize_all(&handles)).await?;
            serde_json::to_writer_pretty(&mut stdout, &report)?;
            writeln!(stdout)?;
            eprintln!("{}", report.summary("unfollowed"));
        }

        Command::Block { handles } => {
            let report = block(client.as_ref(), &session, &normalize_all(&handles)).await?;
            serde_json::to_writer_pretty(&mut stdout, &report)?;
            writeln!(stdout)?;
            eprintln!("{}", report.summary("blocked"));
        }
    }

    Ok(())
}
