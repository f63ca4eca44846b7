//! State store client: versioned, typed object storage with watch events.

pub mod client;
pub mod error;
pub mod watch;
