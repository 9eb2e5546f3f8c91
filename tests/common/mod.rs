use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use fairplay::{
    entity::{ChannelId, GuildId, MessageId},
    gateway::{Activity, Channel, EditOutcome, Gateway, Guild, Payload},
    guild::Track,
    queue::QueueItem,
};
use parking_lot::Mutex;

/// Gateway stand-in that knows a fixed set of channels and records what the
/// crate sends to it.
#[derive(Default)]
pub struct RecordingGateway {
    channels: Mutex<HashSet<(GuildId, ChannelId)>>,
    edits: Mutex<Vec<(MessageId, String)>>,
    activity: Mutex<Option<Activity>>,
}

impl RecordingGateway {
    pub fn with_channel(guild: GuildId, channel: ChannelId) -> Arc<Self> {
        let gateway = Self::default();
        gateway.channels.lock().insert((guild, channel));
        Arc::new(gateway)
    }

    pub fn edits(&self) -> Vec<(MessageId, String)> {
        self.edits.lock().clone()
    }
}

impl Gateway for RecordingGateway {
    fn resolve_guild(&self, guild: GuildId) -> Option<Guild> {
        let known = self.channels.lock().iter().any(|(g, _)| *g == guild);
        known.then(|| Guild {
            id: guild,
            name: "test guild".to_string(),
        })
    }

    fn resolve_channel(&self, guild: GuildId, channel: ChannelId) -> Option<Channel> {
        self.channels
            .lock()
            .contains(&(guild, channel))
            .then_some(Channel { id: channel, guild })
    }

    async fn edit_message(
        &self,
        _channel: ChannelId,
        message: MessageId,
        payload: Payload,
    ) -> EditOutcome {
        self.edits.lock().push((message, payload.content));
        EditOutcome::Success
    }

    fn voice_connected_guilds(&self) -> usize {
        1
    }

    fn activity(&self) -> Option<Activity> {
        self.activity.lock().clone()
    }

    fn set_activity(&self, activity: Option<Activity>) {
        *self.activity.lock() = activity;
    }
}

pub fn request(requester: u64, title: &str, secs: u64) -> QueueItem<Track> {
    QueueItem::new(
        requester,
        Track::new(
            title,
            format!("https://media.invalid/{title}"),
            Some(Duration::from_secs(secs)),
        ),
    )
}
