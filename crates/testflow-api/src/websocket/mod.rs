//! WebSocket support: message types, subscriber hub, connection handler.

mod handler;
mod hub;
mod message;

pub use handler::ws_handler;
pub use hub::UpdateHub;
pub use message::WsMessage;
