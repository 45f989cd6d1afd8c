// src/engine/queue.rs

use std::collections::VecDeque;

use tracing::trace;

use crate::exec::RunId;

/// Maximum number of characters per queued block.
pub const BLOCK_SIZE: usize = 1 << 14;

/// Result of [`OutputQueue::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Text was queued. `was_empty` means a drain has to be scheduled.
    Queued { was_empty: bool },
    /// The producer is not the queue's current owner; nothing was queued.
    Stale,
}

#[derive(Debug)]
struct Block {
    text: String,
    chars: usize,
}

/// Output waiting to be delivered to the results panel.
///
/// Text is batched into blocks of at most `block_size` characters: new text
/// first fills the tail block, and only the overflow starts new blocks.
/// Concatenating the drained blocks yields exactly the appended text.
///
/// The queue also records which run currently owns it. Text from any other
/// run is rejected so output of a superseded run never mixes with the
/// current one. Text appended without a producer (status lines) is always
/// accepted.
#[derive(Debug)]
pub struct OutputQueue {
    blocks: VecDeque<Block>,
    owner: Option<RunId>,
    block_size: usize,
}

impl Default for OutputQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputQueue {
    pub fn new() -> Self {
        Self::with_block_size(BLOCK_SIZE)
    }

    /// `block_size` is clamped to at least 1.
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            blocks: VecDeque::new(),
            owner: None,
            block_size: block_size.max(1),
        }
    }

    /// Drop all queued text and forget the owner.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.owner = None;
    }

    pub fn set_owner(&mut self, owner: Option<RunId>) {
        self.owner = owner;
    }

    pub fn owner(&self) -> Option<RunId> {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn append(&mut self, producer: Option<RunId>, text: &str) -> AppendOutcome {
        if producer.is_some() && producer != self.owner {
            trace!(?producer, owner = ?self.owner, "rejecting output from stale producer");
            return AppendOutcome::Stale;
        }

        let was_empty = self.blocks.is_empty();
        if text.is_empty() {
            return AppendOutcome::Queued { was_empty: false };
        }
        if was_empty {
            self.blocks.push_back(Block {
                text: String::new(),
                chars: 0,
            });
        }

        let mut rest = text;
        while !rest.is_empty() {
            let tail_full = self
                .blocks
                .back()
                .is_none_or(|b| b.chars >= self.block_size);
            if tail_full {
                self.blocks.push_back(Block {
                    text: String::new(),
                    chars: 0,
                });
            }

            let Some(tail) = self.blocks.back_mut() else {
                break;
            };
            let available = self.block_size - tail.chars;
            let (head, taken) = split_chars(rest, available);
            tail.text.push_str(head);
            tail.chars += taken;
            rest = &rest[head.len()..];
        }

        AppendOutcome::Queued { was_empty }
    }

    /// Remove the oldest block. The flag tells whether the queue is now empty.
    pub fn pop_front(&mut self) -> Option<(String, bool)> {
        let block = self.blocks.pop_front()?;
        Some((block.text, self.blocks.is_empty()))
    }
}

/// Split off at most `max` characters from the front of `s`.
fn split_chars(s: &str, max: usize) -> (&str, usize) {
    match s.char_indices().nth(max) {
        Some((idx, _)) => (&s[..idx], max),
        None => (s, s.chars().count()),
    }
}
