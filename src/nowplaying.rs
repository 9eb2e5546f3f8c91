//! Keeps one "now playing" message per guild in step with playback.
//!
//! A [`StatusReconciler`] owns the table of bindings (which message shows a
//! guild's status) and, on every [`tick`](StatusReconciler::tick), re-renders
//! each bound message. Bindings whose guild, channel or message went away, or
//! whose track has ended, are dropped. Edits are fire-and-forget; a failed edit
//! drops its binding from the completion task and is never retried.

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    actor::{self, Actor, ActorError, ActorStatus},
    config::BotConfig,
    entity::{ChannelId, GuildId, MessageId},
    gateway::{Gateway, Playback},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusBinding {
    pub guild: GuildId,
    pub channel: ChannelId,
    pub message: MessageId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PruneReason {
    GuildGone,
    ChannelGone,
    TrackEnded,
    EditFailed,
}

impl PruneReason {
    fn as_str(self) -> &'static str {
        match self {
            PruneReason::GuildGone => "guild_gone",
            PruneReason::ChannelGone => "channel_gone",
            PruneReason::TrackEnded => "track_ended",
            PruneReason::EditFailed => "edit_failed",
        }
    }
}

/// At most one binding per guild. Shared between the periodic pass and the
/// edit completion tasks. Every change refreshes the `nowplaying_bindings`
/// gauge.
#[derive(Clone, Default)]
pub struct BindingTable {
    inner: Arc<Mutex<HashMap<GuildId, StatusBinding>>>,
}

impl BindingTable {
    /// Replaces any existing binding for the guild and returns it.
    pub fn bind(&self, binding: StatusBinding) -> Option<StatusBinding> {
        let mut inner = self.inner.lock();
        let previous = inner.insert(binding.guild, binding);
        record_len(inner.len());
        previous
    }

    pub fn unbind(&self, guild: GuildId) -> Option<StatusBinding> {
        let mut inner = self.inner.lock();
        let removed = inner.remove(&guild);
        record_len(inner.len());
        removed
    }

    /// Unbinds only if `message` is the one currently bound for the guild.
    pub fn unbind_message(&self, guild: GuildId, message: MessageId) -> bool {
        let mut inner = self.inner.lock();
        match inner.get(&guild) {
            Some(binding) if binding.message == message => {
                inner.remove(&guild);
                record_len(inner.len());
                true
            }
            _ => false,
        }
    }

    /// Unbinds only if the guild is still bound exactly as in `binding`; a
    /// newer binding for the same guild is left alone.
    fn remove_if_unchanged(&self, binding: &StatusBinding) -> bool {
        let mut inner = self.inner.lock();
        if inner.get(&binding.guild) == Some(binding) {
            inner.remove(&binding.guild);
            record_len(inner.len());
            true
        } else {
            false
        }
    }

    pub fn get(&self, guild: GuildId) -> Option<StatusBinding> {
        self.inner.lock().get(&guild).copied()
    }

    pub fn snapshot(&self) -> Vec<StatusBinding> {
        self.inner.lock().values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

fn record_len(len: usize) {
    metrics::gauge!("nowplaying_bindings").set(len as f64);
}

/// Outcome of one reconciliation pass.
///
/// The pass's edits keep running in the background; dropping the report
/// detaches them. [`settle`](TickReport::settle) waits for all of them instead.
pub struct TickReport {
    pub edited: usize,
    pub pruned: usize,
    inflight: JoinSet<()>,
}

impl TickReport {
    pub async fn settle(mut self) {
        while let Some(res) = self.inflight.join_next().await {
            if let Err(err) = res {
                tracing::warn!("status edit task failed: {err}");
            }
        }
    }
}

impl Drop for TickReport {
    fn drop(&mut self) {
        self.inflight.detach_all();
    }
}

pub struct StatusReconciler<G, P> {
    bindings: BindingTable,
    gateway: Arc<G>,
    playback: Arc<P>,
}

impl<G: Gateway, P: Playback> StatusReconciler<G, P> {
    pub fn new(gateway: Arc<G>, playback: Arc<P>) -> Self {
        Self {
            bindings: BindingTable::default(),
            gateway,
            playback,
        }
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Starts tracking `message` as the guild's status message.
    pub fn bind(&self, guild: GuildId, channel: ChannelId, message: MessageId) {
        let previous = self.bindings.bind(StatusBinding {
            guild,
            channel,
            message,
        });
        tracing::debug!(%guild, %channel, %message, replaced = previous.is_some(), "status message bound");
    }

    pub fn unbind(&self, guild: GuildId) {
        if self.bindings.unbind(guild).is_some() {
            tracing::debug!(%guild, "status message unbound");
        }
    }

    /// A message was deleted out from under us. Only the guild's bound
    /// message matters; anything else is ignored.
    pub fn on_external_delete(&self, guild: GuildId, message: MessageId) {
        if self.bindings.unbind_message(guild, message) {
            tracing::debug!(%guild, %message, "bound status message was deleted");
        }
    }

    /// Runs one pass over a snapshot of the bindings. Must be called from
    /// within a tokio runtime; the edits are spawned onto it.
    pub fn tick(&self) -> TickReport {
        let mut stale = Vec::new();
        let mut inflight = JoinSet::new();
        let mut edited = 0;

        for binding in self.bindings.snapshot() {
            let guild = binding.guild;
            if self.gateway.resolve_guild(guild).is_none() {
                stale.push((binding, PruneReason::GuildGone));
                continue;
            }
            if self.gateway.resolve_channel(guild, binding.channel).is_none() {
                stale.push((binding, PruneReason::ChannelGone));
                continue;
            }

            let payload = match self.playback.current_track(guild) {
                Some(now) => self.playback.render_active(guild, &now),
                None => {
                    // idle is shown once, then the guild is no longer tracked
                    stale.push((binding, PruneReason::TrackEnded));
                    self.playback.render_idle(guild)
                }
            };

            let gateway = self.gateway.clone();
            let bindings = self.bindings.clone();
            inflight.spawn(
                async move {
                    let outcome = gateway
                        .edit_message(binding.channel, binding.message, payload)
                        .await;
                    metrics::counter!("nowplaying_edits_total", "outcome" => outcome.label()).increment(1);
                    if outcome.is_success() {
                        return;
                    }
                    tracing::debug!(guild = %binding.guild, message = %binding.message, %outcome, "status edit failed");
                    if bindings.remove_if_unchanged(&binding) {
                        record_prune(&binding, PruneReason::EditFailed);
                    }
                }
                .in_current_span(),
            );
            edited += 1;
        }

        let mut pruned = 0;
        for (binding, reason) in stale {
            if self.bindings.remove_if_unchanged(&binding) {
                record_prune(&binding, reason);
                pruned += 1;
            }
        }

        tracing::trace!(edited, pruned, "status pass complete");
        TickReport {
            edited,
            pruned,
            inflight,
        }
    }
}

fn record_prune(binding: &StatusBinding, reason: PruneReason) {
    tracing::debug!(guild = %binding.guild, reason = reason.as_str(), "dropping status binding");
    metrics::counter!("nowplaying_bindings_pruned_total", "reason" => reason.as_str()).increment(1);
}

/// Drives [`StatusReconciler::tick`] at a fixed period until cancelled.
/// Passes never overlap: the next period starts counting after a pass returns.
pub struct ReconcilerActor<G, P> {
    reconciler: Arc<StatusReconciler<G, P>>,
    period: Duration,
    shutdown: CancellationToken,
}

impl<G: Gateway, P: Playback> Actor for ReconcilerActor<G, P> {
    type ID = &'static str;

    fn kind(&self) -> &'static str {
        "status_reconciler"
    }

    fn id(&self) -> Self::ID {
        "nowplaying"
    }

    async fn run(&mut self) -> Result<(), ActorError> {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let report = self.reconciler.tick();
                    if report.pruned > 0 {
                        tracing::debug!(edited = report.edited, pruned = report.pruned, "status pass");
                    }
                }
            }
        }
        Ok(())
    }
}

/// Owns the reconciler and its scheduler. Dropping or stopping the service
/// cancels the schedule; edits already in flight are abandoned.
pub struct StatusService<G, P> {
    reconciler: Arc<StatusReconciler<G, P>>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<ActorStatus>>,
}

impl<G: Gateway, P: Playback> StatusService<G, P> {
    /// Builds the reconciler and, unless image mode is configured, starts
    /// polling right away on the current runtime.
    pub fn start(config: &BotConfig, gateway: Arc<G>, playback: Arc<P>) -> Self {
        let reconciler = Arc::new(StatusReconciler::new(gateway, playback));
        let shutdown = CancellationToken::new();

        let task = if config.np_images {
            tracing::info!("image mode enabled, status messages are not polled");
            None
        } else {
            let actor = ReconcilerActor {
                reconciler: reconciler.clone(),
                period: config.status_interval(),
                shutdown: shutdown.child_token(),
            };
            Some(tokio::spawn(actor::run(actor).in_current_span()))
        };

        Self {
            reconciler,
            shutdown,
            task,
        }
    }

    pub fn reconciler(&self) -> &Arc<StatusReconciler<G, P>> {
        &self.reconciler
    }

    pub fn is_polling(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!("status reconciler task failed: {err}");
            }
        }
    }
}

impl<G, P> Drop for StatusService<G, P> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
