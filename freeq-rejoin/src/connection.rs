//! The connection-side collaborators the rejoin subsystem talks to.
//!
//! The subsystem never owns sockets or sends lines itself. It asks a
//! [`Connection`] for its cached channel state and its rejoin queue, and
//! hands it JOIN requests to send.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::ChannelRecord;
use crate::error::RejoinError;
use crate::queue::RejoinQueue;

/// Which protocol a connection speaks. Only [`ProtocolKind::Irc`]
/// connections take part in rejoining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    Irc,
    Other(&'static str),
}

/// A live server connection.
pub trait Connection: Send + Sync {
    /// Stable identifier, unique among live connections.
    fn id(&self) -> u64;

    fn protocol(&self) -> ProtocolKind;

    /// Registration (001) has completed and JOINs will be honoured.
    fn is_registered(&self) -> bool;

    /// The client's cached record of a channel, if it has one.
    fn find_channel(&self, name: &str) -> Option<ChannelRecord>;

    /// Ask the connection to JOIN `channel`. Fire and forget: the outcome
    /// shows up later as ordinary protocol events.
    fn join(&self, channel: &str, key: Option<&str>) -> Result<(), RejoinError>;

    /// Channels waiting to be rejoined on this connection.
    fn rejoin_queue(&self) -> &Mutex<RejoinQueue>;

    fn is_irc(&self) -> bool {
        self.protocol() == ProtocolKind::Irc
    }
}

/// The set of connections currently alive in the process.
pub trait ConnectionRegistry: Send + Sync {
    fn connections(&self) -> Vec<Arc<dyn Connection>>;
}
