//! Serving requests over a Unix socket

pub mod buffer;
pub mod listener;
pub mod reload;
pub mod store;

pub use buffer::{OutputBuffer, ResponseCode};
pub use listener::{handle_connection, Server};
pub use reload::SnapshotWatcher;
pub use store::{Answer, Store};
