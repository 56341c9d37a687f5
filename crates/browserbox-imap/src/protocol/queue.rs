//! Client command queue.

use std::collections::{BTreeMap, VecDeque};

use crate::types::{Request, Response};

/// Identifies a queued command for the lifetime of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub(crate) u64);

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a new command goes in the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Priority {
    /// Append to the end.
    #[default]
    Normal,
    /// Jump ahead of the given command, typically the one whose precheck is
    /// running. Falls back to [`Priority::Normal`] if that command is no
    /// longer queued.
    Before(CommandId),
}

/// Per-command queueing options.
#[derive(Debug, Clone, Default)]
pub struct QueueOptions {
    /// Untagged response kinds collected into the completion payload.
    pub accept_untagged: Vec<String>,
    /// Queue position.
    pub priority: Priority,
    /// Hold the command until [`super::Framer::precheck_done`] is called.
    pub precheck: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PrecheckState {
    None,
    Pending,
    Running,
}

#[derive(Debug)]
pub(crate) struct Entry {
    pub id: CommandId,
    pub tag: String,
    pub request: Request,
    pub payload: Option<BTreeMap<String, Vec<Response>>>,
    pub precheck: PrecheckState,
    pub chunks: VecDeque<Vec<u8>>,
}

impl Entry {
    pub fn new(id: CommandId, tag: String, request: Request, options: &QueueOptions) -> Self {
        let payload = (!options.accept_untagged.is_empty()).then(|| {
            options
                .accept_untagged
                .iter()
                .map(|name| (name.trim().to_ascii_uppercase(), Vec::new()))
                .collect()
        });
        Self {
            id,
            tag,
            request,
            payload,
            precheck: if options.precheck {
                PrecheckState::Pending
            } else {
                PrecheckState::None
            },
            chunks: VecDeque::new(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct ClientQueue {
    entries: VecDeque<Entry>,
}

impl ClientQueue {
    /// Inserts an entry. Jumping entries get a `.p` tag suffix.
    pub fn push(&mut self, mut entry: Entry, priority: Priority) {
        if let Priority::Before(ctx) = priority
            && let Some(index) = self.entries.iter().position(|e| e.id == ctx)
        {
            entry.tag.push_str(".p");
            self.entries.insert(index, entry);
            return;
        }
        self.entries.push_back(entry);
    }

    pub fn front_mut(&mut self) -> Option<&mut Entry> {
        self.entries.front_mut()
    }

    pub fn pop_front(&mut self) -> Option<Entry> {
        self.entries.pop_front()
    }

    pub fn get_mut(&mut self, id: CommandId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    pub fn remove(&mut self, id: CommandId) -> Option<Entry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        self.entries.remove(index)
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Entry> + '_ {
        self.entries.drain(..)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn tags(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.tag.as_str()).collect()
    }
}
