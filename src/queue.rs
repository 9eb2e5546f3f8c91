//! Ordered playback queue with a pluggable insertion policy.
//!
//! A [`Queue`] is an index-addressable, gap-free sequence. Every positional
//! operation is policy independent; only [`Queue::add`] consults the
//! [`QueueKind`], which decides where a newly requested item lands.

mod fair;

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::entity::UserId;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("index {index} is out of range for a queue of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot skip {count} items in a queue of {len}")]
    SkipOutOfRange { count: usize, len: usize },

    #[error("queue is empty")]
    Empty,
}

/// Anything that can be ordered by requester.
pub trait Queueable {
    fn requester(&self) -> UserId;
}

/// A unit of the queue: who asked for it, and what they asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem<T> {
    pub requester: UserId,
    pub payload: T,
}

impl<T> QueueItem<T> {
    pub fn new(requester: impl Into<UserId>, payload: T) -> Self {
        Self {
            requester: requester.into(),
            payload,
        }
    }
}

impl<T> Queueable for QueueItem<T> {
    fn requester(&self) -> UserId {
        self.requester
    }
}

/// Insertion policy of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    /// Round-robin between requesters.
    #[default]
    Fair,
    /// Plain insertion order.
    Linear,
}

impl QueueKind {
    /// Builds a queue of this policy, carrying over the contents and order of
    /// `previous` when there is one. Nothing already queued is reordered.
    pub fn apply<T: Queueable>(self, previous: Option<Queue<T>>) -> Queue<T> {
        Queue {
            kind: self,
            list: previous.map(|q| q.list).unwrap_or_default(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueueKind::Fair => "fair",
            QueueKind::Linear => "linear",
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fair" => Ok(QueueKind::Fair),
            "linear" => Ok(QueueKind::Linear),
            other => Err(format!("unknown queue type `{other}`, expected `fair` or `linear`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Queue<T> {
    kind: QueueKind,
    list: VecDeque<T>,
}

impl<T: Queueable> Queue<T> {
    pub fn new(kind: QueueKind) -> Self {
        kind.apply(None)
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    /// Adds `item` where the policy places it and returns that index.
    pub fn add(&mut self, item: T) -> usize {
        let index = match self.kind {
            QueueKind::Fair => fair::insertion_index(&self.list, item.requester()),
            QueueKind::Linear => self.list.len(),
        };
        self.list.insert(index, item);
        index
    }

    /// Inserts at `index`, or at the end when `index` is past it.
    pub fn add_at(&mut self, index: usize, item: T) {
        let index = index.min(self.list.len());
        self.list.insert(index, item);
    }

    pub fn get(&self, index: usize) -> Result<&T, QueueError> {
        let len = self.list.len();
        self.list
            .get(index)
            .ok_or(QueueError::IndexOutOfRange { index, len })
    }

    pub fn remove(&mut self, index: usize) -> Result<T, QueueError> {
        let len = self.list.len();
        self.list
            .remove(index)
            .ok_or(QueueError::IndexOutOfRange { index, len })
    }

    /// Removes every item requested by `requester`; the rest keep their order.
    pub fn remove_all(&mut self, requester: UserId) -> usize {
        let before = self.list.len();
        self.list.retain(|item| item.requester() != requester);
        before - self.list.len()
    }

    /// Swaps each of `requester`'s items with a randomly chosen one of their
    /// own slots. Other requesters' items never move. Returns how many items
    /// took part.
    ///
    /// Note this is the classic "swap with any position" loop, so the
    /// resulting permutation is not uniformly distributed.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, requester: UserId, rng: &mut R) -> usize {
        let slots: Vec<usize> = self
            .list
            .iter()
            .enumerate()
            .filter(|(_, item)| item.requester() == requester)
            .map(|(i, _)| i)
            .collect();

        for &first in &slots {
            let second = slots[rng.random_range(0..slots.len())];
            self.list.swap(first, second);
        }
        slots.len()
    }

    /// Drops the first `count` items.
    pub fn skip(&mut self, count: usize) -> Result<(), QueueError> {
        let len = self.list.len();
        if count > len {
            return Err(QueueError::SkipOutOfRange { count, len });
        }
        self.list.drain(..count);
        Ok(())
    }

    /// Moves the item at `from` so it ends up at `to`, where `to` is an index
    /// into the queue after the removal.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<&T, QueueError> {
        let len = self.list.len();
        if from >= len {
            return Err(QueueError::IndexOutOfRange { index: from, len });
        }
        if to >= len {
            return Err(QueueError::IndexOutOfRange { index: to, len });
        }
        let item = self
            .list
            .remove(from)
            .ok_or(QueueError::IndexOutOfRange { index: from, len })?;
        self.list.insert(to, item);
        Ok(&self.list[to])
    }

    /// Removes and returns the head.
    pub fn pull(&mut self) -> Result<T, QueueError> {
        self.list.pop_front().ok_or(QueueError::Empty)
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.list.len();
        self.list.clear();
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.list.iter()
    }
}

impl<T: Queueable> Default for Queue<T> {
    fn default() -> Self {
        Self::new(QueueKind::default())
    }
}
