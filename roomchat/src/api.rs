//! REST client for the chat server.
//!
//! [`ChatApi`] is the seam between the sync loop and HTTP; [`HttpChatApi`]
//! is the `reqwest` implementation. Every call either fully succeeds or
//! returns an [`ApiError`]; there are no retries at this layer.

use std::future::Future;

use serde::de::DeserializeOwned;
use url::Url;

use roomchat_proto::api::{
    ApiResponse, CreateRoomRequest, JoinRoomRequest, LoginData, LoginRequest, Room, RoomDetail,
    User,
};

/// Errors that can occur during REST calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request could not be sent or the body could not be read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success code.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// A success response carried no data.
    #[error("{0} response carried no data")]
    MissingData(&'static str),

    /// The configured base URL cannot carry path segments.
    #[error("invalid api url {0}")]
    InvalidUrl(String),
}

/// REST operations the client depends on.
pub trait ChatApi: Send + Sync {
    /// Log in as `username`.
    fn login(&self, username: &str) -> impl Future<Output = Result<LoginData, ApiError>> + Send;

    /// Users currently connected.
    fn list_users(&self) -> impl Future<Output = Result<Vec<User>, ApiError>> + Send;

    /// All rooms.
    fn list_rooms(&self) -> impl Future<Output = Result<Vec<Room>, ApiError>> + Send;

    /// Create a room owned by `req.user_id`.
    fn create_room(
        &self,
        req: &CreateRoomRequest,
    ) -> impl Future<Output = Result<Room, ApiError>> + Send;

    /// Join a room with this device.
    fn join_room(&self, req: &JoinRoomRequest)
    -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Members and owner of one room.
    fn room_detail(&self, room_id: &str)
    -> impl Future<Output = Result<RoomDetail, ApiError>> + Send;
}

/// [`ChatApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpChatApi {
    /// Create a client for the API rooted at `base_url`
    /// (e.g. `http://localhost:8070/v1/api`).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if `base_url` is not an absolute
    /// http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base,
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Unwrap a response envelope, mapping rejections to [`ApiError::Rejected`].
async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
    endpoint: &'static str,
) -> Result<Option<T>, ApiError> {
    let status = response.status();
    let envelope: ApiResponse<T> = response.json().await?;
    if envelope.is_success() {
        Ok(envelope.data)
    } else {
        tracing::warn!(endpoint, %status, msg = %envelope.msg, "request rejected");
        Err(ApiError::Rejected(envelope.msg))
    }
}

async fn read_data<T: DeserializeOwned>(
    response: reqwest::Response,
    endpoint: &'static str,
) -> Result<T, ApiError> {
    read_envelope(response, endpoint)
        .await?
        .ok_or(ApiError::MissingData(endpoint))
}

impl ChatApi for HttpChatApi {
    async fn login(&self, username: &str) -> Result<LoginData, ApiError> {
        let url = self.endpoint(&["login"])?;
        let body = LoginRequest {
            username: username.to_string(),
        };
        let response = self.client.post(url).json(&body).send().await?;
        read_data(response, "login").await
    }

    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        let url = self.endpoint(&["users"])?;
        let response = self.client.get(url).send().await?;
        Ok(read_envelope(response, "users").await?.unwrap_or_default())
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, ApiError> {
        let url = self.endpoint(&["rooms"])?;
        let response = self.client.get(url).send().await?;
        Ok(read_envelope(response, "rooms").await?.unwrap_or_default())
    }

    async fn create_room(&self, req: &CreateRoomRequest) -> Result<Room, ApiError> {
        let url = self.endpoint(&["rooms"])?;
        let response = self.client.post(url).json(req).send().await?;
        read_data(response, "create room").await
    }

    async fn join_room(&self, req: &JoinRoomRequest) -> Result<(), ApiError> {
        let url = self.endpoint(&["rooms", &req.room_id, "join"])?;
        let response = self.client.post(url).json(req).send().await?;
        read_envelope::<serde_json::Value>(response, "join room")
            .await
            .map(|_| ())
    }

    async fn room_detail(&self, room_id: &str) -> Result<RoomDetail, ApiError> {
        let url = self.endpoint(&["rooms", room_id])?;
        let response = self.client.get(url).send().await?;
        read_data(response, "room detail").await
    }
}
