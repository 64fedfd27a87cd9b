//! Delayed rejoin of "temporarily unavailable" IRC channels.
//!
//! When a server answers a JOIN with `437 ERR_UNAVAILRESOURCE` for a channel,
//! the channel is queued on its connection and retried on a fixed cadence
//! (five minutes by default) until the join goes through or the connection
//! drops. This has nothing to do with autorejoin after a kick.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use freeq_rejoin::{ChannelRejoin, EventBus, RejoinConfig, Sessions};
//!
//! # async fn example() -> Result<(), freeq_rejoin::RejoinError> {
//! let bus = Arc::new(EventBus::new());
//! let sessions = Arc::new(Sessions::new());
//! let handle = ChannelRejoin::start(&RejoinConfig::default(), &bus, sessions.clone())?;
//! // ... feed server lines through `bus.dispatch_line(&conn, line)` ...
//! handle.stop();
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod connection;
pub mod error;
pub mod irc;
pub mod queue;
pub mod rejoin;
pub mod session;
pub mod signal;
pub mod timer;

pub use config::RejoinConfig;
pub use connection::{Connection, ConnectionRegistry, ProtocolKind};
pub use error::RejoinError;
pub use queue::{PendingRejoin, RejoinQueue};
pub use rejoin::{ChannelRejoin, RejoinHandle};
pub use session::{Command, Session, Sessions};
pub use signal::EventBus;
