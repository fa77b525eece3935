pub mod messages;
pub mod status;
pub mod webhook;
