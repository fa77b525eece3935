use crate::error::BridgeError;
use crate::service::events::{SessionEvent, Subscription};
use crate::service::session_state::SessionState;
use crate::store::SessionStore;
use crate::transport::{EventSink, Transport, TransportEvent};
use crate::types::{Address, InboundMessage, MediaPayload, MessageReceipt, SessionCredential};

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 64;

/// Messages handled by the session actor.
#[derive(Debug)]
pub enum SessionMessage {
    /// Begin initializing the transport. Only honoured from `Uninitialized`.
    Start,
    /// Lifecycle event reported by the transport.
    Transport(TransportEvent),
    GetState(RpcReplyPort<SessionState>),
}

/// Cloneable handle to the single messaging session.
#[derive(Clone)]
pub struct SessionHandle {
    actor: ActorRef<SessionMessage>,
    transport: Arc<dyn Transport>,
    events: broadcast::Sender<SessionEvent>,
    sink: EventSink,
}

impl SessionHandle {
    /// Kick off transport initialization.
    pub fn start(&self) {
        if let Err(e) = ractor::cast!(self.actor, SessionMessage::Start) {
            warn!(error = %e, "session actor is gone; start ignored");
        }
    }

    pub async fn state(&self) -> Result<SessionState, BridgeError> {
        ractor::call!(self.actor, SessionMessage::GetState)
            .map_err(|e| BridgeError::RactorError(format!("GetState RPC failed: {e}")))
    }

    /// Subscribe to lifecycle events from now on. No backlog is replayed.
    pub fn subscribe(&self) -> Subscription {
        Subscription::new(self.events.subscribe())
    }

    /// Feed an externally received event (e.g. from a webhook) into the session.
    pub fn dispatch(&self, event: TransportEvent) {
        if !self.sink.emit(event) {
            warn!("session actor is gone; dropping transport event");
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    async fn ensure_ready(&self) -> Result<(), BridgeError> {
        let state = self.state().await?;
        if state.is_ready() {
            Ok(())
        } else {
            Err(BridgeError::NotReady {
                state: state.to_string(),
            })
        }
    }

    pub async fn is_registered(&self, address: &Address) -> Result<bool, BridgeError> {
        self.ensure_ready().await?;
        self.transport.is_registered(address).await
    }

    pub async fn send_text(
        &self,
        address: &Address,
        body: &str,
    ) -> Result<MessageReceipt, BridgeError> {
        self.ensure_ready().await?;
        let receipt = self.transport.send_text(address, body).await?;
        debug!(to = %address, id = %receipt.message_id, "text sent");
        Ok(receipt)
    }

    pub async fn send_media(
        &self,
        address: &Address,
        media: MediaPayload,
        caption: Option<&str>,
    ) -> Result<MessageReceipt, BridgeError> {
        self.ensure_ready().await?;
        let media = media.resolve().await?;
        let receipt = self.transport.send_media(address, media, caption).await?;
        debug!(to = %address, id = %receipt.message_id, "media sent");
        Ok(receipt)
    }

    pub async fn reply(
        &self,
        to: &InboundMessage,
        body: &str,
    ) -> Result<MessageReceipt, BridgeError> {
        self.ensure_ready().await?;
        self.transport.reply(to, body).await
    }
}

/// Arguments for spawning the session actor.
struct SessionArgs {
    store: SessionStore,
    transport: Arc<dyn Transport>,
    events: broadcast::Sender<SessionEvent>,
    sink: EventSink,
    inbox: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Internal state held by the session actor.
struct SessionActorState {
    state: SessionState,
    store: SessionStore,
    credential: Option<SessionCredential>,
    transport: Arc<dyn Transport>,
    events: broadcast::Sender<SessionEvent>,
    sink: EventSink,
}

struct SessionActor;

#[ractor::async_trait]
impl Actor for SessionActor {
    type Msg = SessionMessage;
    type State = SessionActorState;
    type Arguments = SessionArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let credential = match args.store.load().await {
            Ok(cred) => cred,
            Err(e) => {
                warn!(
                    path = %args.store.path().display(),
                    error = %e,
                    "failed to read session file; starting unauthenticated"
                );
                None
            }
        };
        info!(
            path = %args.store.path().display(),
            restored = credential.is_some(),
            "SessionActor started"
        );

        // Transport events arrive on a plain channel and are folded into the mailbox.
        let mut inbox = args.inbox;
        tokio::spawn(async move {
            while let Some(event) = inbox.recv().await {
                if ractor::cast!(myself, SessionMessage::Transport(event)).is_err() {
                    break;
                }
            }
        });

        Ok(SessionActorState {
            state: SessionState::Uninitialized,
            store: args.store,
            credential,
            transport: args.transport,
            events: args.events,
            sink: args.sink,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SessionMessage::Start => self.handle_start(state),
            SessionMessage::Transport(event) => self.handle_transport_event(state, event).await,
            SessionMessage::GetState(rp) => {
                let _ = rp.send(state.state.clone());
            }
        }
        Ok(())
    }
}

impl SessionActor {
    fn handle_start(&self, state: &mut SessionActorState) {
        if state.state != SessionState::Uninitialized {
            debug!(state = %state.state, "start ignored; session already started");
            return;
        }
        state.state = SessionState::Initializing;
        info!("session initializing");

        let transport = state.transport.clone();
        let credential = state.credential.clone();
        let sink = state.sink.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.initialize(credential, sink.clone()).await {
                sink.emit(TransportEvent::AuthFailure(format!(
                    "transport initialization failed: {e}"
                )));
            }
        });
    }

    async fn handle_transport_event(&self, state: &mut SessionActorState, event: TransportEvent) {
        let event = match event {
            TransportEvent::Message(msg) => {
                debug!(chat = %msg.chat, id = %msg.id, "inbound message");
                let _ = state.events.send(SessionEvent::Message(msg));
                return;
            }
            other => other,
        };

        let Some(next) = state.state.on_event(&event) else {
            debug!(state = %state.state, ?event, "transport event ignored in current state");
            return;
        };
        state.state = next;

        let published = match event {
            TransportEvent::PairingChallenge(code) => {
                info!("pairing code received; waiting for scan");
                SessionEvent::PairingChallenge { code }
            }
            TransportEvent::Authenticated(credential) => {
                info!("session authenticated");
                if let Err(e) = state.store.save(&credential).await {
                    error!(
                        path = %state.store.path().display(),
                        error = %e,
                        "failed to persist session credential"
                    );
                }
                state.credential = Some(credential);
                SessionEvent::Authenticated
            }
            TransportEvent::Ready => {
                info!("session ready");
                SessionEvent::Ready
            }
            TransportEvent::Disconnected(reason) => {
                warn!(reason = %reason, "session disconnected; waiting for the transport to reconnect");
                SessionEvent::Disconnected { reason }
            }
            TransportEvent::AuthFailure(reason) => {
                error!(reason = %reason, "AUTHENTICATION FAILURE; restart required");
                SessionEvent::AuthenticationFailed { reason }
            }
            TransportEvent::Message(_) => return,
        };
        let _ = state.events.send(published);
    }
}

/// Spawn the session actor and return a handle. Call [`SessionHandle::start`]
/// once subscribers are in place.
pub async fn spawn(
    store: SessionStore,
    transport: Arc<dyn Transport>,
) -> Result<SessionHandle, BridgeError> {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    let (tx, inbox) = mpsc::unbounded_channel();
    let sink = EventSink::new(tx);

    let args = SessionArgs {
        store,
        transport: transport.clone(),
        events: events.clone(),
        sink: sink.clone(),
        inbox,
    };
    let (actor, _jh) = Actor::spawn(None, SessionActor, args)
        .await
        .map_err(|e| BridgeError::RactorError(format!("failed to spawn SessionActor: {e}")))?;

    Ok(SessionHandle {
        actor,
        transport,
        events,
        sink,
    })
}
