//! WebSocket broadcast surface.

pub mod ws;

pub use ws::{WsServer, WsSink};
