//! Bulk detailed-profile fetch.
//!
//! Handles are split into contiguous groups of `group_size` and the groups
//! run in waves of at most `concurrency`. A wave settles completely before
//! the next one starts, and a group never has more than one upstream call
//! outstanding, so `concurrency` bounds in-flight calls whatever the input
//! size.
//!
//! Each group is driven by an explicit state machine:
//!
//! ```text
//! Pending -> Retrying(n) -> { Succeeded | FallingBack } -> { Succeeded | PartiallyFailed }
//! ```
//!
//! No task is spawned. The groups of a wave are polled together on the
//! caller's task, so the accumulator is never touched concurrently.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::logger::{TraceId, child_span, root_span, warn_if_slow};
use futures::future::try_join_all;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{Instrument, debug, field, info, warn};

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::metrics::counters::FetchCounters;
use crate::profile::types::{BatchResult, DetailedProfile};
use crate::session::Session;
use crate::xrpc::XrpcError;

const SLOW_WAVE: Duration = Duration::from_secs(10);

/// The upstream lookup primitive.
///
/// `lookup_profiles` must never be handed more actors than the upstream
/// per-call limit; the fetcher guarantees that through `group_size`.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn lookup_profiles(
        &self,
        session: &Session,
        actors: &[String],
    ) -> Result<Vec<Value>, XrpcError>;

    async fn lookup_profile(&self, session: &Session, actor: &str) -> Result<Value, XrpcError>;
}

/// Shared flag checked before every wave. Already dispatched calls are
/// left to finish.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupState {
    Pending,
    /// The n-th multi-actor attempt failed and its backoff has elapsed.
    Retrying(u32),
    FallingBack,
    Succeeded,
    PartiallyFailed,
}

impl GroupState {
    fn is_terminal(self) -> bool {
        matches!(self, GroupState::Succeeded | GroupState::PartiallyFailed)
    }
}

/// One contiguous slice of the input and its per-handle resolution.
struct Group<'a> {
    actors: &'a [String],
    resolved: Vec<Option<DetailedProfile>>,
    state: GroupState,
    attempts: u32,
}

impl<'a> Group<'a> {
    fn new(actors: &'a [String]) -> Self {
        Self {
            actors,
            resolved: vec![None; actors.len()],
            state: GroupState::Pending,
            attempts: 0,
        }
    }

    fn unresolved(&self) -> usize {
        self.resolved.iter().filter(|slot| slot.is_none()).count()
    }

    /// Assigns returned profiles to the requested actors. Duplicated actors
    /// each get their own copy; actors the upstream omitted stay unresolved.
    fn absorb(&mut self, found: &[DetailedProfile]) {
        for (slot, actor) in self.resolved.iter_mut().zip(self.actors) {
            if slot.is_none() {
                *slot = found.iter().find(|p| p.matches_actor(actor)).cloned();
            }
        }
    }

    fn finish(self, out: &mut BatchResult) {
        for (slot, actor) in self.resolved.into_iter().zip(self.actors) {
            match slot {
                Some(profile) => out.profiles.push(profile),
                None => out.failed.push(actor.clone()),
            }
        }
    }
}

pub struct BatchProfileFetcher<L: ProfileLookup + ?Sized> {
    lookup: Arc<L>,
    config: FetchConfig,
    counters: FetchCounters,
    cancel: CancelFlag,
}

impl<L: ProfileLookup + ?Sized> BatchProfileFetcher<L> {
    pub fn new(lookup: Arc<L>, config: FetchConfig) -> Self {
        Self {
            lookup,
            config,
            counters: FetchCounters::default(),
            cancel: CancelFlag::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_counters(mut self, counters: FetchCounters) -> Self {
        self.counters = counters;
        self
    }

    pub fn counters(&self) -> &FetchCounters {
        &self.counters
    }

    /// Fetches detailed profiles for every handle.
    ///
    /// Individual failures never fail the call: they end up in
    /// `BatchResult::failed`. Only invalid configuration, an unusable
    /// session, an upstream session rejection (when
    /// `abort_on_session_failure` is set) or cancellation return `Err`.
    pub async fn fetch(
        &self,
        session: &Session,
        handles: &[String],
    ) -> Result<BatchResult, FetchError> {
        let span = root_span("fetch_detailed_profiles", &TraceId::new());
        span.record("actor", field::display(&session.handle));

        self.fetch_inner(session, handles).instrument(span).await
    }

    async fn fetch_inner(
        &self,
        session: &Session,
        handles: &[String],
    ) -> Result<BatchResult, FetchError> {
        self.config.validate()?;

        if handles.is_empty() {
            debug!("no handles requested");
            return Ok(BatchResult::new(0));
        }

        session.ensure_usable()?;

        let concurrency = self.config.concurrency;
        let groups: Vec<&[String]> = handles.chunks(self.config.group_size).collect();
        let total_groups = groups.len();
        let total_waves = total_groups.div_ceil(concurrency);

        info!(
            handles = handles.len(),
            groups = total_groups,
            waves = total_waves,
            concurrency,
            "starting detailed profile fetch"
        );

        let mut result = BatchResult::new(handles.len());

        for (wave_idx, wave) in groups.chunks(concurrency).enumerate() {
            let first_group = wave_idx * concurrency;

            if self.cancel.is_cancelled() {
                warn!(
                    completed_groups = first_group,
                    total_groups, "profile fetch cancelled"
                );
                return Err(FetchError::Cancelled {
                    completed: first_group,
                    total: total_groups,
                });
            }

            let pending = wave
                .iter()
                .enumerate()
                .map(|(offset, &actors)| self.run_group(session, first_group + offset, actors));

            let settled = warn_if_slow("profile_wave", SLOW_WAVE, try_join_all(pending))
                .await
                .map_err(|e| {
                    warn!(error = %e, "upstream rejected the session, aborting batch");
                    FetchError::SessionRejected(e)
                })?;

            for group in settled {
                group.finish(&mut result);
            }

            debug!(
                wave = wave_idx + 1,
                total_waves,
                loaded = result.loaded(),
                failed = result.failed.len(),
                "wave settled"
            );

            if wave_idx + 1 < total_waves && self.config.inter_group_delay_ms > 0 {
                sleep(self.config.inter_group_delay()).await;
            }
        }

        info!(
            requested = result.requested,
            loaded = result.loaded(),
            failed = result.failed.len(),
            "detailed profile fetch finished"
        );

        Ok(result)
    }

    async fn run_group<'a>(
        &self,
        session: &Session,
        index: usize,
        actors: &'a [String],
    ) -> Result<Group<'a>, XrpcError> {
        let span = child_span("profile_group");
        span.record("group", index as u64);

        self.drive(session, Group::new(actors)).instrument(span).await
    }

    async fn drive<'a>(
        &self,
        session: &Session,
        mut group: Group<'a>,
    ) -> Result<Group<'a>, XrpcError> {
        while !group.state.is_terminal() {
            group.state = match group.state {
                GroupState::Pending | GroupState::Retrying(_) => {
                    self.attempt_multi(session, &mut group).await?
                }
                GroupState::FallingBack => self.fall_back(session, &mut group).await?,
                terminal => terminal,
            };
        }

        Ok(group)
    }

    async fn attempt_multi(
        &self,
        session: &Session,
        group: &mut Group<'_>,
    ) -> Result<GroupState, XrpcError> {
        group.attempts += 1;
        let attempt = group.attempts;

        FetchCounters::bump(&self.counters.multi_lookups);

        match self.lookup_group(session, group.actors).await {
            Ok(found) => {
                group.absorb(&found);

                let missing = group.unresolved();
                if missing == 0 {
                    debug!(attempt, "group resolved");
                    return Ok(GroupState::Succeeded);
                }

                debug!(missing, "upstream omitted actors, resolving them one by one");
                FetchCounters::bump(&self.counters.groups_fallen_back);
                Ok(GroupState::FallingBack)
            }
            Err(e) if self.is_fatal(&e) => Err(e),
            Err(e) => {
                FetchCounters::bump(&self.counters.failed_lookups);

                if attempt < self.config.max_retries {
                    let delay = self.config.backoff_for(attempt);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        rate_limited = e.is_rate_limited(),
                        error = %e,
                        "group lookup failed, retrying"
                    );
                    FetchCounters::bump(&self.counters.groups_retried);
                    sleep(delay).await;
                    return Ok(GroupState::Retrying(attempt));
                }

                warn!(
                    attempts = attempt,
                    actors = group.actors.len(),
                    rate_limited = e.is_rate_limited(),
                    error = %e,
                    "group exhausted retries, falling back to single lookups"
                );
                FetchCounters::bump(&self.counters.groups_fallen_back);
                Ok(GroupState::FallingBack)
            }
        }
    }

    /// Resolves every still-missing actor with its own lookup, in input order.
    async fn fall_back(
        &self,
        session: &Session,
        group: &mut Group<'_>,
    ) -> Result<GroupState, XrpcError> {
        for (slot, actor) in group.resolved.iter_mut().zip(group.actors) {
            if slot.is_some() {
                continue;
            }

            FetchCounters::bump(&self.counters.single_lookups);

            let looked_up = self.lookup.lookup_profile(session, actor).await;
            match looked_up.and_then(decode) {
                Ok(profile) => *slot = Some(profile),
                Err(e) if self.is_fatal(&e) => return Err(e),
                Err(e) => {
                    FetchCounters::bump(&self.counters.failed_lookups);
                    debug!(actor = %actor, error = %e, "single lookup failed");
                }
            }
        }

        Ok(if group.unresolved() == 0 {
            GroupState::Succeeded
        } else {
            GroupState::PartiallyFailed
        })
    }

    async fn lookup_group(
        &self,
        session: &Session,
        actors: &[String],
    ) -> Result<Vec<DetailedProfile>, XrpcError> {
        let raw = self.lookup.lookup_profiles(session, actors).await?;
        raw.into_iter().map(decode).collect()
    }

    fn is_fatal(&self, e: &XrpcError) -> bool {
        self.config.abort_on_session_failure && e.is_auth_failure()
    }
}

fn decode(raw: Value) -> Result<DetailedProfile, XrpcError> {
    DetailedProfile::from_raw(raw)
        .map_err(|e| XrpcError::InvalidResponse(format!("malformed profile: {e}")))
}

/// Caller-facing entry point: one fetch with a throwaway fetcher.
pub async fn fetch_detailed_profiles<L: ProfileLookup + ?Sized>(
    lookup: Arc<L>,
    session: &Session,
    handles: &[String],
    config: FetchConfig,
) -> Result<BatchResult, FetchError> {
    BatchProfileFetcher::new(lookup, config)
        .fetch(session, handles)
        .await
}
