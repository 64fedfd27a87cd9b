//! Channel-name syntax and the client's cached channel record.

/// Channel prefixes recognised when the server doesn't advertise CHANTYPES.
pub const DEFAULT_CHANNEL_PREFIXES: &str = "#&!+";

/// Whether `name` is syntactically a channel: its first character is one of
/// `prefixes`. Empty names are never channels.
pub fn is_channel(name: &str, prefixes: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|first| prefixes.contains(first))
}

/// What the client remembers about a channel it has joined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRecord {
    pub name: String,
    /// Key (+k) used for the channel, if known.
    pub key: Option<String>,
}

impl ChannelRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// The key, if one is set and non-empty.
    pub fn join_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_prefixes() {
        assert!(is_channel("#freeq", DEFAULT_CHANNEL_PREFIXES));
        assert!(is_channel("&local", DEFAULT_CHANNEL_PREFIXES));
        assert!(is_channel("!ABCDEsafe", DEFAULT_CHANNEL_PREFIXES));
        assert!(is_channel("+modeless", DEFAULT_CHANNEL_PREFIXES));
        assert!(!is_channel("alice", DEFAULT_CHANNEL_PREFIXES));
        assert!(!is_channel("", DEFAULT_CHANNEL_PREFIXES));
    }

    #[test]
    fn custom_prefixes() {
        assert!(!is_channel("&local", "#"));
        assert!(is_channel("#only", "#"));
    }

    #[test]
    fn empty_key_is_not_a_key() {
        let rec = ChannelRecord::new("#bar").with_key("");
        assert_eq!(rec.join_key(), None);
        let rec = ChannelRecord::new("#bar").with_key("secret");
        assert_eq!(rec.join_key(), Some("secret"));
    }
}
