use std::collections::HashSet;
use std::fmt;

use crate::domain::{Message, SenderKey};

/// Maximum number of messages kept in a stream
pub const DEFAULT_CAPACITY: usize = 100;

/// A bounded, time-ordered, deduplicated sequence of messages
///
/// Every mutation leaves the stream sorted by timestamp (ties in arrival order), free of
/// duplicate ids and within capacity. Mutations never suspend, so readers only ever see a
/// consistent sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageStream {
    messages: Vec<Message>,
    ids: HashSet<String>,
    capacity: usize,
}

impl MessageStream {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a stream holding at most `capacity` messages (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: Vec::with_capacity(capacity + 1),
            ids: HashSet::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// All retained messages, oldest first
    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Inserts a delivered message unless its id is already present
    ///
    /// The first copy of an id wins; later copies are dropped even if their content differs.
    /// Returns true if the message was inserted (it may still have been evicted straight away
    /// if it is older than everything retained).
    pub fn ingest(&mut self, message: Message) -> bool {
        if self.ids.contains(&message.id) {
            log::trace!("Ignoring duplicate message {}", message.id);
            return false;
        }

        self.insert(message);
        true
    }

    /// Ingests each message in input order and returns how many were new
    pub fn ingest_batch<I>(&mut self, messages: I) -> usize
    where
        I: IntoIterator<Item = Message>,
    {
        let mut inserted = 0;
        for message in messages {
            if self.ingest(message) {
                inserted += 1;
            }
        }
        inserted
    }

    /// Inserts a message authored locally and confirmed by the backend
    ///
    /// Its id comes from the publish call, so it is normally fresh. If the network echo of the
    /// same event was delivered first, that copy is kept and this one is dropped.
    pub fn append_optimistic(&mut self, message: Message) -> bool {
        if self.ids.contains(&message.id) {
            log::debug!("Message {} already delivered before commit", message.id);
            return false;
        }

        self.insert(message);
        true
    }

    /// Deletes every message from `sender` and returns how many were removed
    pub fn remove_by_sender(&mut self, sender: &SenderKey) -> usize {
        let before = self.messages.len();
        let ids = &mut self.ids;
        self.messages.retain(|message| {
            if &message.sender == sender {
                ids.remove(&message.id);
                false
            } else {
                true
            }
        });
        debug_assert_eq!(self.messages.len(), self.ids.len());
        before - self.messages.len()
    }

    /// Messages whose sender is not in `muted`, oldest first
    pub fn visible<'a>(&'a self, muted: &HashSet<SenderKey>) -> Vec<&'a Message> {
        self.messages
            .iter()
            .filter(|message| !muted.contains(&message.sender))
            .collect()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.ids.clear();
    }

    fn insert(&mut self, message: Message) {
        self.ids.insert(message.id.clone());
        self.messages.push(message);
        // `sort_by_key` is stable, so equal timestamps keep arrival order
        self.messages.sort_by_key(|message| message.timestamp);
        self.evict_overflow();
        debug_assert_eq!(self.messages.len(), self.ids.len());
    }

    fn evict_overflow(&mut self) {
        if self.messages.len() <= self.capacity {
            return;
        }

        let excess = self.messages.len() - self.capacity;
        for evicted in self.messages.drain(..excess) {
            self.ids.remove(&evicted.id);
        }
    }
}

impl Default for MessageStream {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageStream[{}/{}]", self.len(), self.capacity)
    }
}
