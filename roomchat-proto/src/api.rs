//! REST bodies of the chat server's `/v1/api` endpoints.
//!
//! Every response is wrapped in an [`ApiResponse`] envelope whose `code` is
//! [`CODE_SUCCESS`] when the request was accepted.

use serde::{Deserialize, Serialize};

/// `code` value of a successful response.
pub const CODE_SUCCESS: i64 = 1;

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// `1` on success, `0` on rejection.
    pub code: i64,
    /// Human-readable status message.
    #[serde(default)]
    pub msg: String,
    /// Response body, absent on rejection and on bare acknowledgements.
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Wraps `data` in a success envelope.
    pub fn success(data: T) -> Self {
        Self {
            code: CODE_SUCCESS,
            msg: "success".to_string(),
            data: Some(data),
        }
    }

    /// Builds a rejection envelope.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self {
            code: 0,
            msg: msg.into(),
            data: None,
        }
    }

    /// Whether the server accepted the request.
    pub const fn is_success(&self) -> bool {
        self.code == CODE_SUCCESS
    }
}

/// A chat participant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Stable user id.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl User {
    /// Creates a user snapshot.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// `POST /login` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Requested display name.
    pub username: String,
}

/// `POST /login` response data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginData {
    /// Server-assigned user id.
    pub id: String,
    /// Display name echoed back.
    pub username: String,
}

/// Entry of `GET /rooms`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Room {
    /// Room id.
    pub id: String,
    /// Room name.
    pub name: String,
    /// Whether joining requires a password.
    pub has_password: bool,
    /// Owner user id.
    pub user_id: String,
    /// Owner display name.
    pub user_name: String,
    /// Number of connected members.
    pub count: u64,
    /// Creation time as formatted by the server.
    pub create_time: Option<String>,
}

/// `GET /rooms/{id}` response data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomDetail {
    /// Room id.
    pub id: String,
    /// Room name.
    pub name: String,
    /// Owner user id.
    pub user_id: String,
    /// Owner display name.
    pub user_name: String,
    /// Number of connected members.
    pub count: u64,
    /// Creation time as formatted by the server.
    pub create_time: Option<String>,
    /// Connected members.
    pub users: Vec<User>,
}

/// `POST /rooms` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    /// Room name.
    pub name: String,
    /// Join password, empty for an open room.
    pub password: String,
    /// Owner user id.
    pub user_id: String,
}

/// `POST /rooms/{id}/join` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    /// Room id.
    pub room_id: String,
    /// Joining user id.
    pub user_id: String,
    /// Joining device id.
    pub device_id: String,
    /// Password, empty for an open room.
    pub password: String,
}
