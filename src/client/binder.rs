//! Client-side identity binding with bounded retry.
//!
//! The user id may not be available the instant the socket opens (it can
//! still be loading from a credential cache or an in-flight profile fetch),
//! so the binder re-checks the identity source on a fixed interval until it
//! appears or the attempt budget runs out. The whole binder is one
//! cancellable task; dropping the handle (or calling `cancel`) stops the
//! retry timer, so no timers leak across reconnect cycles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;

/// Interval between identity re-checks while unbound.
const RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Maximum number of re-checks before giving up (~10 seconds).
const MAX_ATTEMPTS: u32 = 20;

/// An identity the page layer knows about: a user id plus an optional
/// short-lived bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub jwt: Option<String>,
}

/// Where the binder looks for the current identity (e.g. a credential cache
/// or the login flow's output). Polled synchronously.
pub trait IdentitySource: Send + Sync + 'static {
    fn current(&self) -> Option<Identity>;
}

/// Delivers the `auth_user` frame to the server. Fire-and-forget: the
/// protocol has no bind acknowledgement.
#[async_trait]
pub trait BindTransport: Send + Sync + 'static {
    async fn send_auth(&self, identity: Identity);
}

/// Binding state of one connection, observable through `IdentityBinder::state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindState {
    /// Transport open, no identity sent yet.
    Unbound,
    /// Identity wasn't available at open; re-checking on the retry interval.
    Retrying,
    /// `auth_user` sent. The server does not remember this across reconnects.
    Bound,
    /// Attempt budget exhausted. The connection stays usable for topic-room
    /// events but cannot receive user-scoped ones.
    GaveUp,
}

/// Handle to the per-connection binding task.
///
/// One binder is started per connection; on reconnect the old one is
/// cancelled and a fresh one started, because the server forgets the binding
/// when the transport closes.
pub struct IdentityBinder {
    state_rx: watch::Receiver<BindState>,
    changed_tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl IdentityBinder {
    /// Spawn the binding task for a freshly opened connection.
    pub fn start(source: Arc<dyn IdentitySource>, transport: Arc<dyn BindTransport>) -> Self {
        let (state_tx, state_rx) = watch::channel(BindState::Unbound);
        let (changed_tx, changed_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(source, transport, state_tx, changed_rx));
        Self {
            state_rx,
            changed_tx,
            task,
        }
    }

    /// Current binding state.
    pub fn state(&self) -> BindState {
        *self.state_rx.borrow()
    }

    /// Watch for state transitions.
    pub fn state_watch(&self) -> watch::Receiver<BindState> {
        self.state_rx.clone()
    }

    /// Signal that the identity changed (login completed elsewhere in the
    /// page, cross-tab change). The binder re-sends `auth_user` immediately;
    /// re-binding always replaces the previous binding.
    pub fn identity_changed(&self) {
        let _ = self.changed_tx.send(());
    }

    /// Stop the binder and its retry timer. Called from the disconnect path;
    /// also happens implicitly on drop.
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for IdentityBinder {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    source: Arc<dyn IdentitySource>,
    transport: Arc<dyn BindTransport>,
    state_tx: watch::Sender<BindState>,
    mut changed_rx: mpsc::UnboundedReceiver<()>,
) {
    // Identity already known at open: bind straight away, no timer at all.
    if let Some(identity) = source.current() {
        transport.send_auth(identity).await;
        let _ = state_tx.send(BindState::Bound);
    } else {
        let _ = state_tx.send(BindState::Retrying);
        let bound = retry_loop(&source, &transport, &state_tx, &mut changed_rx).await;
        if !bound {
            tracing::warn!(
                "identity never became available; user-scoped events disabled for this connection"
            );
            let _ = state_tx.send(BindState::GaveUp);
        }
    }

    // Bound or gave up: the retry timer is gone. Stay alive only to re-send
    // the binding when the page signals an identity change.
    while changed_rx.recv().await.is_some() {
        if let Some(identity) = source.current() {
            transport.send_auth(identity).await;
            let _ = state_tx.send(BindState::Bound);
        }
    }
}

/// Re-check the source every `RETRY_INTERVAL` up to `MAX_ATTEMPTS` times.
/// Returns true once bound; false when the budget is exhausted. The timer
/// lives only inside this function, so success drops it immediately.
async fn retry_loop(
    source: &Arc<dyn IdentitySource>,
    transport: &Arc<dyn BindTransport>,
    state_tx: &watch::Sender<BindState>,
    changed_rx: &mut mpsc::UnboundedReceiver<()>,
) -> bool {
    let mut ticker = time::interval(RETRY_INTERVAL);
    ticker.tick().await; // First tick fires immediately; skip it.
    let mut attempts = 0u32;
    let mut signal_open = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                attempts += 1;
                if let Some(identity) = source.current() {
                    transport.send_auth(identity).await;
                    let _ = state_tx.send(BindState::Bound);
                    return true;
                }
                if attempts >= MAX_ATTEMPTS {
                    return false;
                }
            }
            // The login flow finished while we were polling: bind now
            // instead of waiting for the next tick.
            changed = changed_rx.recv(), if signal_open => {
                match changed {
                    None => signal_open = false,
                    Some(()) => {
                        if let Some(identity) = source.current() {
                            transport.send_auth(identity).await;
                            let _ = state_tx.send(BindState::Bound);
                            return true;
                        }
                    }
                }
            }
        }
    }
}
