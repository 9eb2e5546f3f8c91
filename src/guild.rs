use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::{
    actor::{Actor, ActorError},
    entity::{GuildId, UserId},
    queue::{Queue, QueueError, QueueItem, QueueKind},
    rng::Rng,
};

const MAILBOX_CAPACITY: usize = 16;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GuildError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("playback session has ended")]
    SessionClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub title: String,
    pub uri: String,
    /// `None` for live streams.
    pub length: Option<Duration>,
}

impl Track {
    pub fn new(title: impl Into<String>, uri: impl Into<String>, length: Option<Duration>) -> Self {
        Self {
            title: title.into(),
            uri: uri.into(),
            length,
        }
    }
}

pub type QueuedTrack = QueueItem<Track>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    Single,
}

impl RepeatMode {
    pub fn emoji(self) -> Option<&'static str> {
        match self {
            RepeatMode::Off => None,
            RepeatMode::All => Some("🔁"),
            RepeatMode::Single => Some("🔂"),
        }
    }

    pub fn user_friendly_name(self) -> &'static str {
        match self {
            RepeatMode::Off => "Off",
            RepeatMode::All => "All",
            RepeatMode::Single => "Single",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub item: QueuedTrack,
    pub started_at: Instant,
}

impl NowPlaying {
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// What a guild session publishes after every message it handles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerState {
    pub current: Option<NowPlaying>,
    pub queued: usize,
    pub repeat: RepeatMode,
}

/// Why the current track stopped playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Played to the end. Repeat mode applies.
    Finished,
    /// Cut short by a skip. Never repeated.
    Skipped,
}

#[derive(Debug, Clone)]
pub enum PlayerEvent {
    TrackStarted(GuildId, QueuedTrack),
    QueueFinished(GuildId),
}

type Reply<T> = oneshot::Sender<T>;

#[derive(Debug)]
pub enum GuildMessage {
    Enqueue(QueuedTrack, Reply<usize>),
    EnqueueAt(usize, QueuedTrack, Reply<()>),
    Remove(usize, Reply<Result<QueuedTrack, QueueError>>),
    RemoveAll(UserId, Reply<usize>),
    Shuffle(UserId, Reply<usize>),
    Skip(usize, Reply<Result<(), QueueError>>),
    Move(usize, usize, Reply<Result<QueuedTrack, QueueError>>),
    Clear(Reply<usize>),
    Snapshot(Reply<Vec<QueuedTrack>>),
    SetQueueKind(QueueKind, Reply<()>),
    SetRepeat(RepeatMode, Reply<()>),
    TrackEnded(EndReason, Reply<Option<QueuedTrack>>),
    Stop(Reply<()>),
}

/// Sole owner of one guild's queue. Every mutation arrives through the
/// mailbox, so requests for the same guild are applied one at a time.
pub struct GuildActor {
    guild_id: GuildId,
    receiver: mpsc::Receiver<GuildMessage>,
    events: mpsc::UnboundedSender<PlayerEvent>,
    state: watch::Sender<PlayerState>,
    rng: Rng,

    queue: Queue<QueuedTrack>,
    current: Option<NowPlaying>,
    repeat: RepeatMode,
}

impl Actor for GuildActor {
    type ID = GuildId;

    fn kind(&self) -> &'static str {
        "guild"
    }

    fn id(&self) -> Self::ID {
        self.guild_id
    }

    async fn run(&mut self) -> Result<(), ActorError> {
        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg);
        }
        tracing::debug!(guild = %self.guild_id, "all handles dropped, ending session");
        Ok(())
    }
}

impl GuildActor {
    fn handle_message(&mut self, msg: GuildMessage) {
        match msg {
            GuildMessage::Enqueue(item, reply) => {
                let index = self.queue.add(item);
                tracing::debug!(guild = %self.guild_id, index, "enqueued");
                self.reply(reply, index);
            }
            GuildMessage::EnqueueAt(index, item, reply) => {
                self.queue.add_at(index, item);
                self.reply(reply, ());
            }
            GuildMessage::Remove(index, reply) => {
                let value = self.queue.remove(index);
                self.reply(reply, value);
            }
            GuildMessage::RemoveAll(requester, reply) => {
                let value = self.queue.remove_all(requester);
                self.reply(reply, value);
            }
            GuildMessage::Shuffle(requester, reply) => {
                let value = self.queue.shuffle(requester, &mut self.rng);
                self.reply(reply, value);
            }
            GuildMessage::Skip(count, reply) => {
                let value = self.queue.skip(count);
                self.reply(reply, value);
            }
            GuildMessage::Move(from, to, reply) => {
                let value = self.queue.move_item(from, to).cloned();
                self.reply(reply, value);
            }
            GuildMessage::Clear(reply) => {
                let value = self.queue.clear();
                self.reply(reply, value);
            }
            GuildMessage::Snapshot(reply) => {
                let value: Vec<_> = self.queue.iter().cloned().collect();
                self.reply(reply, value);
            }
            GuildMessage::SetQueueKind(kind, reply) => {
                if kind != self.queue.kind() {
                    tracing::info!(guild = %self.guild_id, from = %self.queue.kind(), to = %kind, "switching queue type");
                    let previous = std::mem::take(&mut self.queue);
                    self.queue = kind.apply(Some(previous));
                }
                self.reply(reply, ());
            }
            GuildMessage::SetRepeat(mode, reply) => {
                tracing::debug!(guild = %self.guild_id, repeat = mode.user_friendly_name(), "repeat mode set");
                self.repeat = mode;
                self.reply(reply, ());
            }
            GuildMessage::TrackEnded(reason, reply) => {
                let value = self.advance(reason);
                self.reply(reply, value);
            }
            GuildMessage::Stop(reply) => {
                self.queue.clear();
                if self.current.take().is_some() {
                    self.emit(PlayerEvent::QueueFinished(self.guild_id));
                }
                self.reply(reply, ());
            }
        }
    }

    /// Ends the current track and starts the next one, if any.
    fn advance(&mut self, reason: EndReason) -> Option<QueuedTrack> {
        if let Some(ended) = self.current.take() {
            match (reason, self.repeat) {
                (EndReason::Skipped, _) | (EndReason::Finished, RepeatMode::Off) => {}
                (EndReason::Finished, RepeatMode::All) => {
                    self.queue.add(ended.item);
                }
                (EndReason::Finished, RepeatMode::Single) => self.queue.add_at(0, ended.item),
            }
        }

        match self.queue.pull() {
            Ok(item) => {
                tracing::debug!(guild = %self.guild_id, title = %item.payload.title, "track started");
                self.current = Some(NowPlaying {
                    item: item.clone(),
                    started_at: Instant::now(),
                });
                self.emit(PlayerEvent::TrackStarted(self.guild_id, item.clone()));
                Some(item)
            }
            Err(_) => {
                self.emit(PlayerEvent::QueueFinished(self.guild_id));
                None
            }
        }
    }

    /// Publishes the new state before answering, so a caller that awaited the
    /// reply always observes its own change.
    fn reply<T>(&self, reply: Reply<T>, value: T) {
        self.publish();
        let _ = reply.send(value);
    }

    fn emit(&self, event: PlayerEvent) {
        if let Err(err) = self.events.send(event) {
            tracing::trace!(guild = %self.guild_id, "no listener for player event: {:?}", err.0);
        }
    }

    fn publish(&self) {
        let next = PlayerState {
            current: self.current.clone(),
            queued: self.queue.len(),
            repeat: self.repeat,
        };
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
    }
}

#[derive(Clone)]
pub struct GuildHandle {
    sender: mpsc::Sender<GuildMessage>,
    state: watch::Receiver<PlayerState>,
    pub guild_id: GuildId,
}

impl GuildHandle {
    pub fn new(
        guild_id: GuildId,
        kind: QueueKind,
        rng: Rng,
        events: mpsc::UnboundedSender<PlayerEvent>,
    ) -> (Self, GuildActor) {
        let (sender, receiver) = mpsc::channel(MAILBOX_CAPACITY);
        let (state_tx, state_rx) = watch::channel(PlayerState::default());
        let handle = GuildHandle {
            sender,
            state: state_rx,
            guild_id,
        };
        let actor = GuildActor {
            guild_id,
            receiver,
            events,
            state: state_tx,
            rng,
            queue: Queue::new(kind),
            current: None,
            repeat: RepeatMode::Off,
        };
        (handle, actor)
    }

    /// Latest published state; never blocks on the session.
    pub fn state(&self) -> PlayerState {
        self.state.borrow().clone()
    }

    pub async fn enqueue(&self, item: QueuedTrack) -> Result<usize, GuildError> {
        self.request(|tx| GuildMessage::Enqueue(item, tx)).await
    }

    pub async fn enqueue_at(&self, index: usize, item: QueuedTrack) -> Result<(), GuildError> {
        self.request(|tx| GuildMessage::EnqueueAt(index, item, tx)).await
    }

    pub async fn remove(&self, index: usize) -> Result<QueuedTrack, GuildError> {
        Ok(self.request(|tx| GuildMessage::Remove(index, tx)).await??)
    }

    pub async fn remove_all(&self, requester: UserId) -> Result<usize, GuildError> {
        self.request(|tx| GuildMessage::RemoveAll(requester, tx)).await
    }

    pub async fn shuffle(&self, requester: UserId) -> Result<usize, GuildError> {
        self.request(|tx| GuildMessage::Shuffle(requester, tx)).await
    }

    pub async fn skip(&self, count: usize) -> Result<(), GuildError> {
        Ok(self.request(|tx| GuildMessage::Skip(count, tx)).await??)
    }

    pub async fn move_item(&self, from: usize, to: usize) -> Result<QueuedTrack, GuildError> {
        Ok(self.request(|tx| GuildMessage::Move(from, to, tx)).await??)
    }

    pub async fn clear(&self) -> Result<usize, GuildError> {
        self.request(GuildMessage::Clear).await
    }

    pub async fn snapshot(&self) -> Result<Vec<QueuedTrack>, GuildError> {
        self.request(GuildMessage::Snapshot).await
    }

    pub async fn set_queue_kind(&self, kind: QueueKind) -> Result<(), GuildError> {
        self.request(|tx| GuildMessage::SetQueueKind(kind, tx)).await
    }

    pub async fn set_repeat(&self, mode: RepeatMode) -> Result<(), GuildError> {
        self.request(|tx| GuildMessage::SetRepeat(mode, tx)).await
    }

    /// Playback-advance path: the engine stopped the current track, or is
    /// idle and wants the head of the queue. Returns the track that starts next.
    pub async fn track_ended(&self, reason: EndReason) -> Result<Option<QueuedTrack>, GuildError> {
        self.request(|tx| GuildMessage::TrackEnded(reason, tx)).await
    }

    pub async fn stop(&self) -> Result<(), GuildError> {
        self.request(GuildMessage::Stop).await
    }

    async fn request<R>(
        &self,
        message: impl FnOnce(Reply<R>) -> GuildMessage,
    ) -> Result<R, GuildError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(message(tx))
            .await
            .map_err(|_| GuildError::SessionClosed)?;
        rx.await.map_err(|_| GuildError::SessionClosed)
    }
}
