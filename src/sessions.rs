use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::{
    actor,
    entity::GuildId,
    format,
    gateway::{Payload, Playback},
    guild::{GuildHandle, NowPlaying, PlayerEvent},
    queue::QueueKind,
    rng,
};

/// Live playback sessions, one per guild.
#[derive(Clone)]
pub struct Sessions {
    guilds: Arc<RwLock<HashMap<GuildId, GuildHandle>>>,
    events: mpsc::UnboundedSender<PlayerEvent>,
    default_kind: QueueKind,
}

impl Sessions {
    pub fn new(default_kind: QueueKind, events: mpsc::UnboundedSender<PlayerEvent>) -> Self {
        Self {
            guilds: Arc::new(RwLock::new(HashMap::new())),
            events,
            default_kind,
        }
    }

    pub fn get(&self, guild: GuildId) -> Option<GuildHandle> {
        self.guilds.read().get(&guild).cloned()
    }

    /// Returns the guild's session, spawning one on the current runtime if it
    /// has none yet.
    pub fn get_or_create(&self, guild: GuildId) -> GuildHandle {
        if let Some(handle) = self.get(guild) {
            return handle;
        }

        let mut guilds = self.guilds.write();
        guilds
            .entry(guild)
            .or_insert_with(|| {
                let (handle, actor) = GuildHandle::new(
                    guild,
                    self.default_kind,
                    rng::new_rng(None),
                    self.events.clone(),
                );
                tracing::info!(%guild, kind = %self.default_kind, "playback session created");
                tokio::spawn(actor::run(actor).in_current_span());
                handle
            })
            .clone()
    }

    /// Forgets the guild's session. Its actor stops once the last outstanding
    /// handle is dropped.
    pub fn end(&self, guild: GuildId) -> bool {
        let removed = self.guilds.write().remove(&guild).is_some();
        if removed {
            tracing::info!(%guild, "playback session ended");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.guilds.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guilds.read().is_empty()
    }
}

impl Playback for Sessions {
    fn current_track(&self, guild: GuildId) -> Option<NowPlaying> {
        self.get(guild)?.state().current
    }

    fn render_active(&self, guild: GuildId, now: &NowPlaying) -> Payload {
        let state = self.get(guild).map(|h| h.state()).unwrap_or_default();
        format::render_active(now, &state)
    }

    fn render_idle(&self, _guild: GuildId) -> Payload {
        format::render_idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guild::{EndReason, Track};
    use crate::queue::QueueItem;

    #[tokio::test]
    async fn one_session_per_guild() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let sessions = Sessions::new(QueueKind::Fair, tx);
        let a = sessions.get_or_create(GuildId::new(1));
        let b = sessions.get_or_create(GuildId::new(1));
        a.enqueue(QueueItem::new(1u64, Track::new("x", "u", None)))
            .await
            .unwrap();
        assert_eq!(b.snapshot().await.unwrap().len(), 1);
        assert_eq!(sessions.len(), 1);

        assert!(sessions.end(GuildId::new(1)));
        assert!(!sessions.end(GuildId::new(1)));
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn playback_view_follows_session_state() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let sessions = Sessions::new(QueueKind::Linear, tx);
        let guild = GuildId::new(5);
        assert!(sessions.current_track(guild).is_none());

        let handle = sessions.get_or_create(guild);
        handle
            .enqueue(QueueItem::new(4u64, Track::new("Intro", "u", None)))
            .await
            .unwrap();
        handle.track_ended(EndReason::Finished).await.unwrap();

        let now = sessions.current_track(guild).unwrap();
        assert_eq!(now.item.payload.title, "Intro");
        let payload = sessions.render_active(guild, &now);
        assert!(payload.content.contains("**Intro**"));
        assert!(sessions.render_idle(guild).content.contains("No music playing"));
    }
}
