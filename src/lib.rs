//! Fair per-guild playback queues, a periodically reconciled "now playing"
//! status message, and a bot presence that follows the playing track.

pub mod actor;
pub mod config;
pub mod entity;
pub mod format;
pub mod gateway;
pub mod guild;
pub mod nowplaying;
pub mod presence;
pub mod queue;
pub mod rng;
pub mod sessions;

#[cfg(test)]
mod test_utils;
