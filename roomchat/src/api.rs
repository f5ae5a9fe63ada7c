//! REST client for the chat backend.
//!
//! | Operation | Request |
//! |---|---|
//! | [`ChatApi::list_users`] | `GET /users` |
//! | [`ChatApi::create_user`] | `POST /users` |
//! | [`ChatApi::list_rooms`] | `GET /chatrooms` |
//! | [`ChatApi::create_room`] | `POST /chatrooms` |
//! | [`ChatApi::fetch_room`] | `GET /chatrooms/:id` |
//! | [`ChatApi::post_message`] | `POST /messages` |
//!
//! Creation endpoints ignore the response body; callers list again to pick
//! up the backend-assigned identifiers. Message posts are never read back
//! either: the live stream delivers the stored message.

use std::future::Future;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use roomchat_proto::model::{NewMessage, NewParticipant, NewRoom, Participant, Room, RoomDetails, RoomId};

/// Default timeout for a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the REST backend.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request could not be sent or the response not read.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status.
        status: StatusCode,
        /// Response body, possibly empty.
        body: String,
    },

    /// The configured base URL or a derived path is not a valid URL.
    #[error("invalid API url {url:?}: {reason}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
        /// Parser message.
        reason: String,
    },
}

impl ApiError {
    /// Whether the backend reported the resource as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

/// Operations the client needs from the backend.
pub trait ChatApi: Send + Sync {
    /// List all participants.
    fn list_users(&self) -> impl Future<Output = Result<Vec<Participant>, ApiError>> + Send;

    /// Create a participant.
    fn create_user(&self, user: &NewParticipant) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// List all rooms.
    fn list_rooms(&self) -> impl Future<Output = Result<Vec<Room>, ApiError>> + Send;

    /// Create a room.
    fn create_room(&self, room: &NewRoom) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Fetch a room with its message history.
    fn fetch_room(&self, id: RoomId) -> impl Future<Output = Result<RoomDetails, ApiError>> + Send;

    /// Store a new message.
    fn post_message(&self, message: &NewMessage) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// [`ChatApi`] over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    client: reqwest::Client,
    /// Base URL, always ending in `/` so relative joins keep its path.
    base: Url,
}

impl HttpChatApi {
    /// Create a client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// - [`ApiError::InvalidUrl`] if `base_url` is not an `http`/`https` URL.
    /// - [`ApiError::Request`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base = Url::parse(&normalized).map_err(|e| ApiError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme {:?}", base.scheme()),
            });
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    /// The normalized base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base.join(path).map_err(|e| ApiError::InvalidUrl {
            url: format!("{}{path}", self.base),
            reason: e.to_string(),
        })
    }

    /// Send one request and return the successful response.
    async fn request<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.endpoint(path)?;
        tracing::debug!(method = %method, url = %url, "api request");

        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(path, status = %status, "api request rejected");
            return Err(ApiError::Status { status, body });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let resp = self.request::<()>(Method::GET, path, None).await?;
        Ok(resp.json::<T>().await?)
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        self.request(Method::POST, path, Some(body)).await?;
        Ok(())
    }
}

impl ChatApi for HttpChatApi {
    async fn list_users(&self) -> Result<Vec<Participant>, ApiError> {
        self.get_json("users").await
    }

    async fn create_user(&self, user: &NewParticipant) -> Result<(), ApiError> {
        self.post("users", user).await?;
        tracing::info!(name = %user.name, "user created");
        Ok(())
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, ApiError> {
        self.get_json("chatrooms").await
    }

    async fn create_room(&self, room: &NewRoom) -> Result<(), ApiError> {
        self.post("chatrooms", room).await?;
        tracing::info!(name = %room.name, "room created");
        Ok(())
    }

    async fn fetch_room(&self, id: RoomId) -> Result<RoomDetails, ApiError> {
        self.get_json(&format!("chatrooms/{id}")).await
    }

    async fn post_message(&self, message: &NewMessage) -> Result<(), ApiError> {
        self.post("messages", message).await
    }
}
