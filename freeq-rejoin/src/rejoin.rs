//! Rejoin channels the server reported as temporarily unavailable.
//!
//! A 437 for a channel queues it on its connection; a recurring timer then
//! reissues a JOIN for everything queued. Entries leave the queue as soon as
//! their JOIN is sent. If the channel is still unavailable the server answers
//! with another 437 and it is queued again, so a channel is retried every
//! pass until it works or the connection goes away. There is no retry cap
//! and no backoff.

use std::ops::ControlFlow;
use std::sync::Arc;

use crate::channel;
use crate::config::RejoinConfig;
use crate::connection::{Connection, ConnectionRegistry};
use crate::error::RejoinError;
use crate::irc;
use crate::queue::PendingRejoin;
use crate::signal::{EventBus, SubscriptionId};
use crate::timer::{self, TimerHandle};

/// Queue a rejoin if the unavailable target in `data` is a channel.
///
/// `data` is the 437 parameter string, `<me> <target> :<text>`. The key is
/// taken from the connection's cached record of the channel, so a channel
/// with no record (or no key on it) is retried without one.
pub fn on_target_unavailable(
    conn: &dyn Connection,
    data: &str,
    prefixes: &str,
) -> Result<PendingRejoin, RejoinError> {
    if !conn.is_irc() {
        return Err(RejoinError::WrongProtocol(conn.id()));
    }
    let params = irc::event_params(data, 2)?;
    let target = params[1];
    if !channel::is_channel(target, prefixes) {
        return Err(RejoinError::NotAChannel(target.to_string()));
    }

    let key = conn
        .find_channel(target)
        .and_then(|rec| rec.join_key().map(str::to_string));
    let entry = PendingRejoin::new(target, key);
    let queued = {
        let mut queue = conn.rejoin_queue().lock();
        queue.push(entry.clone());
        queue.len()
    };
    tracing::info!(
        conn = conn.id(),
        channel = %entry.channel,
        queued,
        "channel temporarily unavailable, will retry"
    );
    Ok(entry)
}

/// Reissue a JOIN for every channel queued on `conn`, oldest first.
/// Returns how many JOINs were handed to the connection.
///
/// The queue lock is only held while taking the entries, so a connection
/// that reacts to `join` by queueing again doesn't loop.
pub fn flush_connection(conn: &dyn Connection) -> usize {
    let pending = conn.rejoin_queue().lock().drain();
    let mut issued = 0;
    for entry in pending {
        match conn.join(&entry.channel, entry.key.as_deref()) {
            Ok(()) => {
                issued += 1;
                tracing::debug!(conn = conn.id(), channel = %entry.channel, "rejoining");
            }
            Err(e) => {
                tracing::warn!(conn = conn.id(), channel = %entry.channel, error = %e, "rejoin failed");
            }
        }
    }
    issued
}

/// One timer pass: flush every registered IRC connection.
pub fn flush_all(registry: &dyn ConnectionRegistry) -> ControlFlow<()> {
    for conn in registry.connections() {
        if conn.is_irc() && conn.is_registered() {
            flush_connection(conn.as_ref());
        }
    }
    ControlFlow::Continue(())
}

/// Forget everything queued on a connection that went away.
/// Returns how many entries were dropped.
pub fn on_disconnected(conn: &dyn Connection) -> Result<usize, RejoinError> {
    if !conn.is_irc() {
        return Err(RejoinError::WrongProtocol(conn.id()));
    }
    let mut queue = conn.rejoin_queue().lock();
    let dropped = queue.len();
    queue.clear();
    if dropped > 0 {
        tracing::debug!(conn = conn.id(), dropped, "discarded pending rejoins");
    }
    Ok(dropped)
}

/// Wires the rejoin handlers to an [`EventBus`] and a recurring timer.
pub struct ChannelRejoin;

impl ChannelRejoin {
    /// Start retrying unavailable channels. Everything is torn down again
    /// by [`RejoinHandle::stop`] or by dropping the handle.
    pub fn start<R>(
        config: &RejoinConfig,
        bus: &Arc<EventBus>,
        registry: Arc<R>,
    ) -> Result<RejoinHandle, RejoinError>
    where
        R: ConnectionRegistry + 'static,
    {
        config.validate()?;

        let timer = timer::spawn_recurring("channel rejoin", config.interval(), move || {
            flush_all(registry.as_ref())
        })?;

        let prefixes = config.channel_prefixes.clone();
        let unavailable = bus.target_unavailable.subscribe_first(move |ev| {
            if let Err(e) = on_target_unavailable(ev.conn.as_ref(), &ev.data, &prefixes) {
                tracing::debug!(conn = ev.conn.id(), error = %e, "ignoring 437");
            }
        });
        let disconnected = bus.disconnected.subscribe(|ev| {
            if let Err(e) = on_disconnected(ev.conn.as_ref()) {
                tracing::debug!(error = %e, "ignoring disconnect");
            }
        });

        tracing::info!(interval_secs = config.interval_secs, "channel rejoin started");
        Ok(RejoinHandle {
            bus: Arc::clone(bus),
            timer: Some(timer),
            subscriptions: Some((unavailable, disconnected)),
        })
    }
}

/// Keeps the rejoin timer and subscriptions alive.
pub struct RejoinHandle {
    bus: Arc<EventBus>,
    timer: Option<TimerHandle>,
    subscriptions: Option<(SubscriptionId, SubscriptionId)>,
}

impl RejoinHandle {
    /// Cancel the timer and both subscriptions. Once this returns no rejoin
    /// callback is running or will run.
    pub fn stop(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        if let Some((unavailable, disconnected)) = self.subscriptions.take() {
            self.bus.target_unavailable.unsubscribe(unavailable);
            self.bus.disconnected.unsubscribe(disconnected);
            tracing::info!("channel rejoin stopped");
        }
    }
}

impl Drop for RejoinHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}
