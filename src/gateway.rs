//! Seams to the collaborators this crate drives but does not implement: the
//! chat gateway (guild/channel lookup, message edits, bot presence) and the
//! playback engine (what is playing, and how to show it).

use std::fmt;

use crate::entity::{ChannelId, GuildId, MessageId};
use crate::guild::NowPlaying;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    pub id: GuildId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub guild: GuildId,
}

/// Rendered message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub content: String,
}

impl Payload {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Result of a message edit. Anything but `Success` means the message can no
/// longer be kept up to date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Success,
    NotFound,
    Forbidden,
    TransportError(String),
}

impl EditOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, EditOutcome::Success)
    }

    /// Variant name, used as a metric label.
    pub fn label(&self) -> &'static str {
        match self {
            EditOutcome::Success => "success",
            EditOutcome::NotFound => "not_found",
            EditOutcome::Forbidden => "forbidden",
            EditOutcome::TransportError(_) => "transport_error",
        }
    }
}

impl fmt::Display for EditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditOutcome::TransportError(err) => write!(f, "{}: {err}", self.label()),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Playing,
    Listening,
    Watching,
    Competing,
}

/// Bot-wide presence label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub kind: ActivityKind,
    pub name: String,
}

impl Activity {
    pub fn listening(name: impl Into<String>) -> Self {
        Self {
            kind: ActivityKind::Listening,
            name: name.into(),
        }
    }

    /// Parses a presence setting such as `"listening to lofi"`.
    /// `"none"` and the empty string mean no activity.
    pub fn parse_setting(setting: &str) -> Option<Self> {
        let setting = setting.trim();
        if setting.is_empty() || setting.eq_ignore_ascii_case("none") {
            return None;
        }

        let (head, rest) = match setting.split_once(char::is_whitespace) {
            Some((head, rest)) => (head.to_ascii_lowercase(), rest.trim_start()),
            None => (String::new(), setting),
        };
        let (kind, name) = match head.as_str() {
            "playing" => (ActivityKind::Playing, rest),
            "watching" => (ActivityKind::Watching, rest),
            "competing" => (ActivityKind::Competing, rest),
            "listening" => {
                let name = match rest.split_once(char::is_whitespace) {
                    Some((to, name)) if to.eq_ignore_ascii_case("to") => name.trim_start(),
                    _ => rest,
                };
                (ActivityKind::Listening, name)
            }
            _ => (ActivityKind::Playing, setting),
        };
        Some(Self {
            kind,
            name: name.to_string(),
        })
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.kind {
            ActivityKind::Playing => "playing",
            ActivityKind::Listening => "listening to",
            ActivityKind::Watching => "watching",
            ActivityKind::Competing => "competing in",
        };
        write!(f, "{verb} {}", self.name)
    }
}

/// The chat gateway as seen from this crate.
pub trait Gateway: Send + Sync + 'static {
    fn resolve_guild(&self, guild: GuildId) -> Option<Guild>;

    fn resolve_channel(&self, guild: GuildId, channel: ChannelId) -> Option<Channel>;

    fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        payload: Payload,
    ) -> impl Future<Output = EditOutcome> + Send;

    /// How many guilds the bot currently holds a voice connection in.
    fn voice_connected_guilds(&self) -> usize;

    fn activity(&self) -> Option<Activity>;

    fn set_activity(&self, activity: Option<Activity>);
}

/// Per-guild view of the playback engine.
pub trait Playback: Send + Sync + 'static {
    fn current_track(&self, guild: GuildId) -> Option<NowPlaying>;

    fn render_active(&self, guild: GuildId, now: &NowPlaying) -> Payload;

    fn render_idle(&self, guild: GuildId) -> Payload;
}
