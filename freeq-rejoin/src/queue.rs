//! Per-connection queue of channels waiting to be rejoined.

use std::collections::VecDeque;
use std::fmt;

/// One outstanding rejoin attempt.
///
/// Entries are never edited: they are appended when the server reports the
/// channel unavailable and removed when the join is reissued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRejoin {
    pub channel: String,
    /// Channel key (+k) captured from the cached channel record, if any.
    pub key: Option<String>,
}

impl PendingRejoin {
    pub fn new(channel: impl Into<String>, key: Option<String>) -> Self {
        Self {
            channel: channel.into(),
            key: key.filter(|k| !k.is_empty()),
        }
    }
}

/// Renders as the JOIN argument: `#chan` or `#chan key`.
impl fmt::Display for PendingRejoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{} {}", self.channel, key),
            None => f.write_str(&self.channel),
        }
    }
}

/// FIFO of pending rejoins. Duplicates are kept: a channel that goes
/// unavailable twice before a flush is retried twice.
#[derive(Debug, Default)]
pub struct RejoinQueue {
    entries: VecDeque<PendingRejoin>,
}

impl RejoinQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: PendingRejoin) {
        self.entries.push_back(entry);
    }

    pub fn pop_front(&mut self) -> Option<PendingRejoin> {
        self.entries.pop_front()
    }

    /// Take every entry, oldest first, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<PendingRejoin> {
        self.entries.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingRejoin> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_with_duplicates() {
        let mut q = RejoinQueue::new();
        q.push(PendingRejoin::new("#foo", None));
        q.push(PendingRejoin::new("#bar", Some("secret".into())));
        q.push(PendingRejoin::new("#foo", None));
        assert_eq!(q.len(), 3);

        let names: Vec<_> = q.iter().map(|e| e.channel.as_str()).collect();
        assert_eq!(names, ["#foo", "#bar", "#foo"]);

        assert_eq!(q.pop_front().unwrap().channel, "#foo");
        let rest = q.drain();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].key.as_deref(), Some("secret"));
        assert!(q.is_empty());
    }

    #[test]
    fn empty_key_is_no_key() {
        let entry = PendingRejoin::new("#foo", Some(String::new()));
        assert_eq!(entry.key, None);
        assert_eq!(entry.to_string(), "#foo");
    }

    #[test]
    fn display_includes_key() {
        let entry = PendingRejoin::new("#bar", Some("secret".into()));
        assert_eq!(entry.to_string(), "#bar secret");
    }

    #[test]
    fn clear_empties() {
        let mut q = RejoinQueue::new();
        q.push(PendingRejoin::new("#a", None));
        q.clear();
        assert!(q.is_empty());
        assert!(q.pop_front().is_none());
    }
}
