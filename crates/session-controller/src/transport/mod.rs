//! Transport adapters.

pub mod websocket;

pub use websocket::websocket_router;
