pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod service;
pub mod store;
pub mod transport;
pub mod types;

pub use error::BridgeError;
