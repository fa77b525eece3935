//! Local persistence: the single session credential file.

pub mod session_file;

pub use session_file::SessionStore;
