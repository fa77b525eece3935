use crate::types::InboundMessage;
use tokio::sync::broadcast;
use tracing::warn;

/// Lifecycle notifications published by the session manager.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PairingChallenge { code: String },
    Authenticated,
    Ready,
    Disconnected { reason: String },
    AuthenticationFailed { reason: String },
    Message(InboundMessage),
}

/// A live subscription. Only events published after it was created are seen.
/// Dropping it (or calling [`Subscription::cancel`]) unsubscribes.
pub struct Subscription {
    rx: broadcast::Receiver<SessionEvent>,
}

impl Subscription {
    pub(crate) fn new(rx: broadcast::Receiver<SessionEvent>) -> Self {
        Self { rx }
    }

    /// Next event, or `None` once the session manager is gone.
    /// A lagging subscriber skips what it missed and keeps going.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(ev) => return Some(ev),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn cancel(self) {
        drop(self);
    }
}
