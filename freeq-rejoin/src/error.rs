//! Errors raised inside the rejoin subsystem.
//!
//! None of these escape the event handlers: the handlers log them and treat
//! the event as a no-op. Only [`RejoinError::Config`] and
//! [`RejoinError::NoRuntime`] reach callers, from `ChannelRejoin::start`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RejoinError {
    /// The event payload had fewer parameters than needed.
    #[error("malformed event payload (expected {expected} params): {data:?}")]
    MalformedEvent { expected: usize, data: String },

    /// The unavailable target is a nick or something else, not a channel.
    #[error("{0} is not a channel")]
    NotAChannel(String),

    /// The connection speaks some other protocol.
    #[error("connection {0} is not an IRC connection")]
    WrongProtocol(u64),

    /// The join could not be handed to the connection.
    #[error("could not dispatch JOIN {channel} on connection {conn}: {reason}")]
    JoinDispatch {
        conn: u64,
        channel: String,
        reason: String,
    },

    /// `start` was called outside a tokio runtime.
    #[error("no tokio runtime for the rejoin timer: {0}")]
    NoRuntime(String),

    #[error("invalid rejoin config: {0}")]
    Config(String),
}
