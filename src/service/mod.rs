//! Session management: the state machine, its actor, and event subscribers.

pub mod autoresponder;
pub mod events;
pub mod session_actor;
pub mod session_state;

pub use events::{SessionEvent, Subscription};
pub use session_actor::{SessionHandle, SessionMessage};
pub use session_state::SessionState;
