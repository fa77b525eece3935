use crate::transport::TransportEvent;
use serde::Serialize;
use std::fmt;

/// Lifecycle of the single messaging session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Initializing,
    AwaitingPairing,
    Authenticated,
    Ready,
    AuthenticationFailed { reason: String },
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::AuthenticationFailed { .. })
    }

    /// The state `event` moves this state to, or `None` if the event does not
    /// apply here. Inbound messages never change state.
    ///
    /// Once started, a fresh pairing challenge or authentication is honoured
    /// from any non-terminal state, so a session that loses its link can be
    /// re-paired without a restart.
    pub fn on_event(&self, event: &TransportEvent) -> Option<SessionState> {
        use SessionState::*;

        if self.is_terminal() || *self == Uninitialized {
            return None;
        }
        match (self, event) {
            (_, TransportEvent::AuthFailure(reason)) => Some(AuthenticationFailed {
                reason: reason.clone(),
            }),
            (_, TransportEvent::PairingChallenge(_)) => Some(AwaitingPairing),
            (_, TransportEvent::Authenticated(_)) => Some(Authenticated),
            (Authenticated, TransportEvent::Ready) => Some(Ready),
            (Authenticated | Ready, TransportEvent::Disconnected(_)) => Some(Initializing),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => f.write_str("uninitialized"),
            SessionState::Initializing => f.write_str("initializing"),
            SessionState::AwaitingPairing => f.write_str("awaiting_pairing"),
            SessionState::Authenticated => f.write_str("authenticated"),
            SessionState::Ready => f.write_str("ready"),
            SessionState::AuthenticationFailed { reason } => {
                write!(f, "authentication_failed: {reason}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionCredential;
    use serde_json::json;

    fn cred() -> TransportEvent {
        TransportEvent::Authenticated(SessionCredential::new(json!({"token": "t"})))
    }

    fn qr() -> TransportEvent {
        TransportEvent::PairingChallenge("2@code".into())
    }

    #[test]
    fn pairing_path_reaches_ready() {
        let s = SessionState::Initializing;
        let s = s.on_event(&qr()).unwrap();
        assert_eq!(s, SessionState::AwaitingPairing);
        let s = s.on_event(&qr()).unwrap();
        assert_eq!(s, SessionState::AwaitingPairing);
        let s = s.on_event(&cred()).unwrap();
        assert_eq!(s, SessionState::Authenticated);
        let s = s.on_event(&TransportEvent::Ready).unwrap();
        assert!(s.is_ready());
    }

    #[test]
    fn restored_session_skips_pairing() {
        let s = SessionState::Initializing.on_event(&cred()).unwrap();
        assert_eq!(s, SessionState::Authenticated);
    }

    #[test]
    fn ready_requires_authentication_first() {
        assert_eq!(SessionState::Initializing.on_event(&TransportEvent::Ready), None);
        assert_eq!(SessionState::AwaitingPairing.on_event(&TransportEvent::Ready), None);
        assert_eq!(SessionState::Ready.on_event(&TransportEvent::Ready), None);
        assert_eq!(SessionState::Uninitialized.on_event(&cred()), None);
        assert_eq!(SessionState::Uninitialized.on_event(&qr()), None);
    }

    #[test]
    fn ready_session_can_be_paired_again() {
        let s = SessionState::Ready.on_event(&qr()).unwrap();
        assert_eq!(s, SessionState::AwaitingPairing);
        assert_eq!(
            SessionState::Authenticated.on_event(&qr()),
            Some(SessionState::AwaitingPairing)
        );
        assert_eq!(SessionState::Ready.on_event(&cred()), Some(SessionState::Authenticated));
    }

    #[test]
    fn disconnect_leaves_ready() {
        let lost = TransportEvent::Disconnected("connection lost".into());
        assert_eq!(SessionState::Ready.on_event(&lost), Some(SessionState::Initializing));
        assert_eq!(
            SessionState::Authenticated.on_event(&lost),
            Some(SessionState::Initializing)
        );
        assert_eq!(SessionState::AwaitingPairing.on_event(&lost), None);
    }

    #[test]
    fn auth_failure_is_terminal() {
        let failed = SessionState::AwaitingPairing
            .on_event(&TransportEvent::AuthFailure("bad".into()))
            .unwrap();
        assert!(failed.is_terminal());
        assert_eq!(failed.on_event(&qr()), None);
        assert_eq!(failed.on_event(&cred()), None);
        assert_eq!(failed.on_event(&TransportEvent::AuthFailure("again".into())), None);
    }

    #[test]
    fn state_serializes_with_a_tag() {
        let v = serde_json::to_value(SessionState::AuthenticationFailed {
            reason: "x".into(),
        })
        .unwrap();
        assert_eq!(v, json!({"state": "authentication_failed", "reason": "x"}));
        assert_eq!(
            serde_json::to_value(SessionState::Ready).unwrap(),
            json!({"state": "ready"})
        );
    }
}
