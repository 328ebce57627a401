//! `RoomChat`: client library for a room and private chat server.
//!
//! [`chat`] holds the synchronization state machine, [`transport`] the
//! WebSocket connection, [`api`] the REST calls, and [`client`] the task
//! that ties them together.

pub mod api;
pub mod chat;
pub mod client;
pub mod config;
pub mod console;
pub mod session;
pub mod transport;
