//! Shared protocol definitions for the `RoomChat` wire format.

pub mod api;
pub mod codec;
pub mod frame;
