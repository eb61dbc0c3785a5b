use std::collections::HashSet;

use crate::domain::SenderKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteOutcome {
    Added,
    AlreadyMuted,
    /// The local user cannot be muted
    RejectedSelf,
}

/// Set of muted identities. Holds keys only; messages stay owned by the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MuteList {
    muted: HashSet<SenderKey>,
}

impl MuteList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from persisted keys, skipping the local sentinel
    pub fn from_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = SenderKey>,
    {
        let mut list = Self::new();
        list.extend(keys);
        list
    }

    pub fn keys(&self) -> &HashSet<SenderKey> {
        &self.muted
    }

    pub fn len(&self) -> usize {
        self.muted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.muted.is_empty()
    }

    pub fn is_muted(&self, sender: &SenderKey) -> bool {
        self.muted.contains(sender)
    }

    pub fn mute(&mut self, sender: SenderKey) -> MuteOutcome {
        if sender.is_local() {
            log::warn!("Refusing to mute the local user");
            return MuteOutcome::RejectedSelf;
        }

        if self.muted.insert(sender) {
            MuteOutcome::Added
        } else {
            MuteOutcome::AlreadyMuted
        }
    }

    /// Returns true if the sender was muted
    pub fn unmute(&mut self, sender: &SenderKey) -> bool {
        self.muted.remove(sender)
    }

    /// Muted keys in a stable order, for display
    pub fn sorted(&self) -> Vec<&SenderKey> {
        let mut keys: Vec<&SenderKey> = self.muted.iter().collect();
        keys.sort();
        keys
    }
}

impl Extend<SenderKey> for MuteList {
    fn extend<T: IntoIterator<Item = SenderKey>>(&mut self, iter: T) {
        for key in iter {
            self.mute(key);
        }
    }
}
