pub mod auth;
pub mod send_request;
