use std::collections::{HashSet, VecDeque};

use super::Queueable;
use crate::entity::UserId;

/// Where a new item from `requester` goes so that every round of distinct
/// requesters stays intact.
///
/// Start right after the requester's most recent item (or at the head if they
/// have none queued), then walk forward while each requester is new to the
/// walk. The first repeat marks the end of the round the item joins.
pub(super) fn insertion_index<T: Queueable>(list: &VecDeque<T>, requester: UserId) -> usize {
    let mut index = list
        .iter()
        .rposition(|item| item.requester() == requester)
        .map_or(0, |last| last + 1);

    let mut seen = HashSet::new();
    while index < list.len() && seen.insert(list[index].requester()) {
        index += 1;
    }
    index
}
