//! A concrete IRC [`Connection`] backed by a command channel, and the
//! table of live sessions.
//!
//! `Session` doesn't own a socket. Like the SDK's `ClientHandle`, it turns
//! requests into [`Command`]s on an `mpsc` channel; whoever owns the socket
//! drains the receiver and writes the lines.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::channel::ChannelRecord;
use crate::connection::{Connection, ConnectionRegistry, ProtocolKind};
use crate::error::RejoinError;
use crate::irc::Message;
use crate::queue::RejoinQueue;

/// Commands a session asks its writer to put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join {
        channel: String,
        key: Option<String>,
    },
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Join { channel, key: Some(key) } => write!(f, "JOIN {channel} {key}"),
            Command::Join { channel, key: None } => write!(f, "JOIN {channel}"),
        }
    }
}

/// Per-connection client state.
pub struct Session {
    id: u64,
    protocol: ProtocolKind,
    registered: AtomicBool,
    /// Our confirmed nick (set on 001, updated on NICK).
    nick: Mutex<Option<String>>,
    /// Joined channels, keyed by lowercased name.
    channels: Mutex<HashMap<String, ChannelRecord>>,
    /// Keys we sent with JOINs that the server hasn't confirmed yet.
    pending_keys: Mutex<HashMap<String, String>>,
    rejoin: Mutex<RejoinQueue>,
    cmd_tx: mpsc::Sender<Command>,
}

impl Session {
    pub fn new(id: u64, protocol: ProtocolKind, cmd_tx: mpsc::Sender<Command>) -> Self {
        Self {
            id,
            protocol,
            registered: AtomicBool::new(false),
            nick: Mutex::new(None),
            channels: Mutex::new(HashMap::new()),
            pending_keys: Mutex::new(HashMap::new()),
            rejoin: Mutex::new(RejoinQueue::new()),
            cmd_tx,
        }
    }

    pub fn nick(&self) -> Option<String> {
        self.nick.lock().clone()
    }

    pub fn set_registered(&self, nick: &str) {
        *self.nick.lock() = Some(nick.to_string());
        self.registered.store(true, Ordering::Release);
    }

    pub fn insert_channel(&self, record: ChannelRecord) {
        self.channels
            .lock()
            .insert(record.name.to_ascii_lowercase(), record);
    }

    pub fn remove_channel(&self, name: &str) -> Option<ChannelRecord> {
        self.channels.lock().remove(&name.to_ascii_lowercase())
    }

    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .lock()
            .values()
            .map(|c| c.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Keep the cached channel state in step with what the server says.
    pub fn observe(&self, msg: &Message) {
        let from = msg
            .prefix
            .as_deref()
            .and_then(|p| p.split('!').next())
            .unwrap_or("");
        match msg.command.as_str() {
            // RPL_WELCOME
            "001" => {
                if let Some(nick) = msg.params.first()
                    && !nick.is_empty()
                {
                    self.set_registered(nick);
                }
            }
            "NICK" => {
                if let Some(new_nick) = msg.params.first()
                    && self.is_me(from)
                {
                    *self.nick.lock() = Some(new_nick.clone());
                }
            }
            "JOIN" => {
                if let Some(channel) = msg.params.first()
                    && self.is_me(from)
                {
                    let key = self.pending_keys.lock().remove(&channel.to_ascii_lowercase());
                    let mut record = ChannelRecord::new(channel.clone());
                    record.key = key;
                    self.insert_channel(record);
                }
            }
            "PART" => {
                if let Some(channel) = msg.params.first()
                    && self.is_me(from)
                {
                    self.remove_channel(channel);
                }
            }
            "KICK" => {
                if let (Some(channel), Some(kicked)) = (msg.params.first(), msg.params.get(1))
                    && self.is_me(kicked)
                {
                    self.remove_channel(channel);
                }
            }
            "MODE" => {
                if msg.params.len() >= 2 {
                    self.apply_key_mode(&msg.params[0], &msg.params[1], &msg.params[2..]);
                }
            }
            _ => {}
        }
    }

    fn is_me(&self, nick: &str) -> bool {
        self.nick
            .lock()
            .as_deref()
            .is_some_and(|me| me.eq_ignore_ascii_case(nick))
    }

    /// Track +k / -k. Other mode letters only matter for which argument
    /// belongs to `k`.
    fn apply_key_mode(&self, channel: &str, modes: &str, args: &[String]) {
        let mut channels = self.channels.lock();
        let Some(record) = channels.get_mut(&channel.to_ascii_lowercase()) else {
            return;
        };
        let mut args = args.iter();
        let mut adding = true;
        for c in modes.chars() {
            match c {
                '+' => adding = true,
                '-' => adding = false,
                'k' => {
                    let arg = args.next();
                    record.key = if adding { arg.cloned() } else { None };
                }
                'l' if adding => {
                    args.next();
                }
                'o' | 'v' | 'h' | 'b' | 'e' | 'I' | 'q' => {
                    args.next();
                }
                _ => {}
            }
        }
    }
}

impl Connection for Session {
    fn id(&self) -> u64 {
        self.id
    }

    fn protocol(&self) -> ProtocolKind {
        self.protocol
    }

    fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// A joined channel, or one we've asked to JOIN with a key and the
    /// server hasn't confirmed yet.
    fn find_channel(&self, name: &str) -> Option<ChannelRecord> {
        let lower = name.to_ascii_lowercase();
        if let Some(record) = self.channels.lock().get(&lower) {
            return Some(record.clone());
        }
        self.pending_keys
            .lock()
            .get(&lower)
            .map(|key| ChannelRecord::new(name).with_key(key.clone()))
    }

    fn join(&self, channel: &str, key: Option<&str>) -> Result<(), RejoinError> {
        if let Some(key) = key {
            self.pending_keys
                .lock()
                .insert(channel.to_ascii_lowercase(), key.to_string());
        }
        let cmd = Command::Join {
            channel: channel.to_string(),
            key: key.map(str::to_string),
        };
        self.cmd_tx
            .try_send(cmd)
            .map_err(|e| RejoinError::JoinDispatch {
                conn: self.id,
                channel: channel.to_string(),
                reason: e.to_string(),
            })
    }

    fn rejoin_queue(&self) -> &Mutex<RejoinQueue> {
        &self.rejoin
    }
}

/// Live sessions, keyed by session id.
pub struct Sessions {
    table: DashMap<u64, Arc<Session>>,
    next_id: AtomicU64,
}

impl Sessions {
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create and register a session. Returns the session and the receiving
    /// end of its command channel.
    pub fn open(&self, protocol: ProtocolKind) -> (Arc<Session>, mpsc::Receiver<Command>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(Session::new(id, protocol, cmd_tx));
        self.table.insert(id, Arc::clone(&session));
        tracing::debug!(conn = id, "session opened");
        (session, cmd_rx)
    }

    pub fn get(&self, id: u64) -> Option<Arc<Session>> {
        self.table.get(&id).map(|s| Arc::clone(s.value()))
    }

    /// Drop a session from the live set. The caller is expected to raise
    /// the disconnected signal for it.
    pub fn remove(&self, id: u64) -> Option<Arc<Session>> {
        let removed = self.table.remove(&id).map(|(_, s)| s);
        if removed.is_some() {
            tracing::debug!(conn = id, "session closed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for Sessions {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry for Sessions {
    fn connections(&self) -> Vec<Arc<dyn Connection>> {
        let mut live: Vec<Arc<Session>> = self.table.iter().map(|s| Arc::clone(s.value())).collect();
        live.sort_by_key(|s| s.id);
        live.into_iter().map(|s| s as Arc<dyn Connection>).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(s: &str) -> Message {
        Message::parse(s).unwrap()
    }

    #[test]
    fn join_renders_with_and_without_key() {
        let plain = Command::Join { channel: "#foo".into(), key: None };
        let keyed = Command::Join { channel: "#bar".into(), key: Some("secret".into()) };
        assert_eq!(plain.to_string(), "JOIN #foo");
        assert_eq!(keyed.to_string(), "JOIN #bar secret");
    }

    #[test]
    fn join_sends_command() {
        let sessions = Sessions::new();
        let (s, mut rx) = sessions.open(ProtocolKind::Irc);
        s.join("#bar", Some("secret")).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            Command::Join { channel: "#bar".into(), key: Some("secret".into()) }
        );
    }

    #[test]
    fn join_fails_when_writer_gone() {
        let sessions = Sessions::new();
        let (s, rx) = sessions.open(ProtocolKind::Irc);
        drop(rx);
        let err = s.join("#foo", None).unwrap_err();
        assert!(matches!(err, RejoinError::JoinDispatch { ref channel, .. } if channel == "#foo"));
    }

    #[test]
    fn observe_tracks_registration_and_channels() {
        let sessions = Sessions::new();
        let (s, _rx) = sessions.open(ProtocolKind::Irc);
        assert!(!s.is_registered());

        s.observe(&line(":srv 001 alice :Welcome"));
        assert!(s.is_registered());
        assert_eq!(s.nick().as_deref(), Some("alice"));

        s.join("#Bar", Some("secret")).unwrap();
        s.observe(&line(":alice!a@h JOIN #Bar"));
        s.observe(&line(":bob!b@h JOIN #other"));
        let rec = s.find_channel("#bar").unwrap();
        assert_eq!(rec.name, "#Bar");
        assert_eq!(rec.join_key(), Some("secret"));
        assert!(s.find_channel("#other").is_none());

        s.observe(&line(":alice!a@h PART #bar"));
        assert!(s.find_channel("#bar").is_none());
    }

    #[test]
    fn observe_key_modes() {
        let sessions = Sessions::new();
        let (s, _rx) = sessions.open(ProtocolKind::Irc);
        s.observe(&line(":srv 001 alice :Welcome"));
        s.observe(&line(":alice!a@h JOIN #foo"));

        s.observe(&line(":op!o@h MODE #foo +nk hunter2"));
        assert_eq!(s.find_channel("#foo").unwrap().join_key(), Some("hunter2"));

        s.observe(&line(":op!o@h MODE #foo -k *"));
        assert_eq!(s.find_channel("#foo").unwrap().join_key(), None);
    }

    #[test]
    fn observe_key_among_other_modes() {
        let sessions = Sessions::new();
        let (s, _rx) = sessions.open(ProtocolKind::Irc);
        s.observe(&line(":srv 001 alice :Welcome"));
        s.observe(&line(":alice!a@h JOIN #foo"));

        s.observe(&line(":op!o@h MODE #foo +lk 50 hunter2"));
        assert_eq!(s.find_channel("#foo").unwrap().join_key(), Some("hunter2"));

        s.observe(&line(":op!o@h MODE #foo +ok bob swordfish"));
        assert_eq!(s.find_channel("#foo").unwrap().join_key(), Some("swordfish"));

        s.observe(&line(":op!o@h MODE #foo -lk+b swordfish *!*@spam"));
        assert_eq!(s.find_channel("#foo").unwrap().join_key(), None);

        s.observe(&line(":op!o@h MODE #foo +vlk carol 10 opensesame"));
        assert_eq!(s.find_channel("#foo").unwrap().join_key(), Some("opensesame"));
    }

    #[test]
    fn requested_key_visible_before_join_confirmed() {
        let sessions = Sessions::new();
        let (s, _rx) = sessions.open(ProtocolKind::Irc);
        s.observe(&line(":srv 001 alice :Welcome"));

        s.join("#Bar", Some("secret")).unwrap();
        let rec = s.find_channel("#bar").unwrap();
        assert_eq!(rec.join_key(), Some("secret"));
        assert!(s.channel_names().is_empty(), "not joined yet");

        s.join("#plain", None).unwrap();
        assert!(s.find_channel("#plain").is_none());
    }

    #[test]
    fn bare_welcome_does_not_register() {
        let sessions = Sessions::new();
        let (s, _rx) = sessions.open(ProtocolKind::Irc);
        s.observe(&line(":srv 001"));
        assert!(!s.is_registered());
        assert!(s.nick().is_none());

        s.observe(&line(":srv 001 :"));
        assert!(!s.is_registered());
    }

    #[test]
    fn observe_kick_and_nick_change() {
        let sessions = Sessions::new();
        let (s, _rx) = sessions.open(ProtocolKind::Irc);
        s.observe(&line(":srv 001 alice :Welcome"));
        s.observe(&line(":alice!a@h NICK alice2"));
        assert_eq!(s.nick().as_deref(), Some("alice2"));

        s.observe(&line(":alice2!a@h JOIN #foo"));
        s.observe(&line(":op!o@h KICK #foo alice2 :bye"));
        assert!(s.channel_names().is_empty());
    }

    #[test]
    fn registry_lists_live_sessions() {
        let sessions = Sessions::new();
        let (a, _ra) = sessions.open(ProtocolKind::Irc);
        let (b, _rb) = sessions.open(ProtocolKind::Other("xmpp"));
        assert_eq!(sessions.len(), 2);

        let ids: Vec<u64> = sessions.connections().iter().map(|c| c.id()).collect();
        assert_eq!(ids, [a.id(), b.id()]);

        assert!(sessions.remove(a.id()).is_some());
        assert!(sessions.remove(a.id()).is_none());
        assert!(sessions.get(a.id()).is_none());
        assert_eq!(sessions.connections().len(), 1);
    }
}
