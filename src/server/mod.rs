// src/server/mod.rs

//! Control socket.
//!
//! - [`codec`] handles `\r`-delimited framing and request parsing.
//! - [`listener`] accepts connections and forwards requests to the
//!   coordinator through a `ManagerHandle`.
//! - [`client`] is the matching client used by `taskmasterctl`.

pub mod client;
pub mod codec;
pub mod listener;

pub use client::Client;
pub use codec::{FrameBuffer, ProtocolError, Request, DELIMITER};
pub use listener::Server;
