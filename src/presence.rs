use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::UnboundedReceiverStream};

use crate::{
    config::BotConfig,
    gateway::{Activity, Gateway},
    guild::{PlayerEvent, Track},
};

/// Mirrors the playing track into the bot's presence.
///
/// Presence is bot-wide, so the track is only shown while the bot plays in at
/// most one guild; otherwise the configured default is restored.
pub struct PresenceAnnouncer<G> {
    gateway: Arc<G>,
    song_in_status: bool,
    default_activity: Option<Activity>,
}

impl<G: Gateway> PresenceAnnouncer<G> {
    pub fn new(config: &BotConfig, gateway: Arc<G>) -> Self {
        Self {
            gateway,
            song_in_status: config.song_in_status,
            default_activity: config.default_activity(),
        }
    }

    pub fn on_track_start(&self, track: Option<&Track>) {
        if !self.song_in_status {
            return;
        }

        match track {
            Some(track) if self.gateway.voice_connected_guilds() <= 1 => {
                self.set(Some(Activity::listening(track.title.clone())));
            }
            _ => self.reset_default(),
        }
    }

    /// Restores the configured default presence.
    pub fn reset_default(&self) {
        self.set(self.default_activity.clone());
    }

    fn set(&self, activity: Option<Activity>) {
        if self.gateway.activity() == activity {
            return;
        }
        match &activity {
            Some(activity) => tracing::debug!(%activity, "updating presence"),
            None => tracing::debug!("clearing presence"),
        }
        self.gateway.set_activity(activity);
    }

    /// Follows player events until every sender is gone.
    pub async fn run(self, events: mpsc::UnboundedReceiver<PlayerEvent>) {
        let mut events = UnboundedReceiverStream::new(events);
        while let Some(event) = events.next().await {
            match event {
                PlayerEvent::TrackStarted(_, item) => self.on_track_start(Some(&item.payload)),
                PlayerEvent::QueueFinished(_) => self.on_track_start(None),
            }
        }
        tracing::debug!("player event stream closed");
    }
}
