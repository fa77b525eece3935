//! Domain types shared by the transport, the session actor and the HTTP layer.

pub mod address;
pub mod credential;
pub mod message;

pub use address::{Address, NumberFormat};
pub use credential::SessionCredential;
pub use message::{DeliveryStatus, InboundMessage, MediaPayload, MessageReceipt, ResolvedMedia};
