use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::{
    entity::{ChannelId, GuildId, MessageId},
    gateway::{Activity, Channel, EditOutcome, Gateway, Guild, Payload, Playback},
    guild::{NowPlaying, Track},
    queue::QueueItem,
};

#[derive(Default)]
struct GatewayState {
    channels: HashSet<(GuildId, ChannelId)>,
    guilds: HashSet<GuildId>,
    edits: Vec<(ChannelId, MessageId, Payload)>,
    failures: HashMap<MessageId, EditOutcome>,
    voice_guilds: usize,
    activity: Option<Activity>,
    activity_writes: usize,
}

/// In-memory gateway that records edits and presence writes.
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<GatewayState>,
}

impl FakeGateway {
    pub fn add_channel(&self, guild: GuildId, channel: ChannelId) {
        let mut state = self.state.lock();
        state.guilds.insert(guild);
        state.channels.insert((guild, channel));
    }

    pub fn remove_channel(&self, guild: GuildId, channel: ChannelId) {
        self.state.lock().channels.remove(&(guild, channel));
    }

    pub fn remove_guild(&self, guild: GuildId) {
        let mut state = self.state.lock();
        state.guilds.remove(&guild);
        state.channels.retain(|(g, _)| *g != guild);
    }

    /// Every later edit of `message` returns `outcome`.
    pub fn fail_edits(&self, message: MessageId, outcome: EditOutcome) {
        self.state.lock().failures.insert(message, outcome);
    }

    pub fn edits(&self) -> Vec<(ChannelId, MessageId, Payload)> {
        self.state.lock().edits.clone()
    }

    pub fn set_voice_guilds(&self, count: usize) {
        self.state.lock().voice_guilds = count;
    }

    pub fn activity_writes(&self) -> usize {
        self.state.lock().activity_writes
    }
}

impl Gateway for FakeGateway {
    fn resolve_guild(&self, guild: GuildId) -> Option<Guild> {
        self.state.lock().guilds.contains(&guild).then(|| Guild {
            id: guild,
            name: format!("guild {}", guild.get()),
        })
    }

    fn resolve_channel(&self, guild: GuildId, channel: ChannelId) -> Option<Channel> {
        self.state
            .lock()
            .channels
            .contains(&(guild, channel))
            .then_some(Channel { id: channel, guild })
    }

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        payload: Payload,
    ) -> EditOutcome {
        let mut state = self.state.lock();
        state.edits.push((channel, message, payload));
        state
            .failures
            .get(&message)
            .cloned()
            .unwrap_or(EditOutcome::Success)
    }

    fn voice_connected_guilds(&self) -> usize {
        self.state.lock().voice_guilds
    }

    fn activity(&self) -> Option<Activity> {
        self.state.lock().activity.clone()
    }

    fn set_activity(&self, activity: Option<Activity>) {
        let mut state = self.state.lock();
        state.activity = activity;
        state.activity_writes += 1;
    }
}

/// Playback view with hand-set tracks and plain-text rendering.
#[derive(Default)]
pub struct FakePlayback {
    playing: Mutex<HashMap<GuildId, NowPlaying>>,
}

impl FakePlayback {
    pub fn play(&self, guild: GuildId, title: &str) {
        let now = NowPlaying {
            item: QueueItem::new(1u64, Track::new(title, "fake://track", None)),
            started_at: Instant::now(),
        };
        self.playing.lock().insert(guild, now);
    }

    pub fn stop(&self, guild: GuildId) {
        self.playing.lock().remove(&guild);
    }
}

impl Playback for FakePlayback {
    fn current_track(&self, guild: GuildId) -> Option<NowPlaying> {
        self.playing.lock().get(&guild).cloned()
    }

    fn render_active(&self, _guild: GuildId, now: &NowPlaying) -> Payload {
        Payload::new(format!("playing {}", now.item.payload.title))
    }

    fn render_idle(&self, _guild: GuildId) -> Payload {
        Payload::new("idle")
    }
}

/// Metrics recorder that keeps the latest counter and gauge values, keyed as
/// `name{label=value,..}`. Install with `metrics::with_local_recorder`.
#[derive(Default)]
pub struct CapturingRecorder {
    counters: Mutex<HashMap<String, Arc<AtomicU64>>>,
    gauges: Mutex<HashMap<String, Arc<AtomicU64>>>,
}

impl CapturingRecorder {
    pub fn counter(&self, key: &str) -> u64 {
        self.counters
            .lock()
            .get(key)
            .map_or(0, |v| v.load(Ordering::Relaxed))
    }

    pub fn gauge(&self, key: &str) -> Option<f64> {
        self.gauges
            .lock()
            .get(key)
            .map(|v| f64::from_bits(v.load(Ordering::Relaxed)))
    }

    fn render(key: &Key) -> String {
        let labels: Vec<_> = key
            .labels()
            .map(|label| format!("{}={}", label.key(), label.value()))
            .collect();
        if labels.is_empty() {
            key.name().to_string()
        } else {
            format!("{}{{{}}}", key.name(), labels.join(","))
        }
    }
}

impl Recorder for CapturingRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        let cell = self.counters.lock().entry(Self::render(key)).or_default().clone();
        Counter::from_arc(cell)
    }

    fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
        let cell = self.gauges.lock().entry(Self::render(key)).or_default().clone();
        Gauge::from_arc(cell)
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}
