use crate::service::events::SessionEvent;
use crate::service::session_actor::SessionHandle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Exact-match rules: inbound text -> reply.
const RULES: &[(&str, &str)] = &[("!ping", "pong"), ("hi rika", "ada yang bisa saya bantu?")];

/// Reply for an inbound message body, if any rule matches exactly.
pub fn reply_for(text: &str) -> Option<&'static str> {
    RULES
        .iter()
        .find(|(trigger, _)| *trigger == text)
        .map(|(_, reply)| *reply)
}

/// Run the autoresponder as an independent subscriber until the session goes away.
pub fn spawn(handle: SessionHandle) -> JoinHandle<()> {
    let mut subscription = handle.subscribe();
    tokio::spawn(async move {
        info!(rules = RULES.len(), "autoresponder running");
        while let Some(event) = subscription.recv().await {
            let SessionEvent::Message(msg) = event else {
                continue;
            };
            if msg.from_me {
                continue;
            }
            let Some(reply) = reply_for(&msg.body) else {
                continue;
            };
            match handle.reply(&msg, reply).await {
                Ok(receipt) => debug!(chat = %msg.chat, id = %receipt.message_id, "autoreply sent"),
                Err(e) => warn!(chat = %msg.chat, error = %e, "autoreply failed"),
            }
        }
        info!("autoresponder stopped");
    })
}
