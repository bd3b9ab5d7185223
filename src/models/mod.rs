pub mod chat;
pub mod device;
pub mod payload;
pub mod user;
pub mod websocket;
