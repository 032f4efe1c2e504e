//! REST client for the dashboard auth backend.
//!
//! Covers account lifecycle (signup, token login, current user, avatar,
//! password, onboarding, logout), the admin user endpoints and feedback.
//! The client holds no session state: callers attach the bearer token per
//! request with [`DashboardApiClient::with_token`].
//!
//! # Example
//!
//! ```rust,ignore
//! use dashboard_api::DashboardApiClient;
//!
//! let client = DashboardApiClient::new("http://127.0.0.1:8000");
//! let token = client.login("jane@x.com", "longenough1").await?;
//! let me = client.with_token(token.access_token).current_user().await?;
//! println!("signed in as {}", me.username);
//! ```

pub mod directory;
pub mod error;
pub mod types;

pub use directory::DirectoryClient;
pub use error::{ApiError, Result};
pub use types::{
    AdminCreateUserRequest, DirectoryAddress, DirectoryCustomer, FeedbackPublic, FeedbackReceipt,
    SignupRequest, TokenResponse, UserPublic,
};

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use types::{
    AvatarUpdateRequest, ChangePasswordRequest, ErrorBody, FeedbackCreate, MessageResponse,
};

/// Used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone)]
pub struct DashboardApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl DashboardApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(reqwest::Client::new(), base_url)
    }

    /// Reuse an existing connection pool.
    pub fn with_http_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Copy of this client that sends `Authorization: Bearer <token>`.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Register a new account. The backend answers with the created user,
    /// not a token; log in afterwards to obtain one.
    pub async fn signup(&self, request: &SignupRequest) -> Result<UserPublic> {
        tracing::debug!(username = %request.username, "POST /signup");
        self.send(self.client.post(self.url("/signup")).json(request))
            .await
    }

    /// Exchange credentials for an access token (OAuth2 password form).
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse> {
        tracing::debug!("POST /token");
        let form = [("username", email), ("password", password)];
        let token: TokenResponse = self
            .send(self.client.post(self.url("/token")).form(&form))
            .await?;

        if token.access_token.is_empty() {
            return Err(ApiError::Decode("No access token received".to_string()));
        }
        Ok(token)
    }

    pub async fn current_user(&self) -> Result<UserPublic> {
        self.send(self.client.get(self.url("/users/me"))).await
    }

    pub async fn update_avatar(&self, avatar: &str) -> Result<UserPublic> {
        let body = AvatarUpdateRequest {
            avatar: avatar.to_string(),
        };
        self.send(self.client.put(self.url("/users/me/avatar")).json(&body))
            .await
    }

    /// Returns the backend's confirmation message.
    pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<String> {
        let body = ChangePasswordRequest {
            current_password: current_password.to_string(),
            new_password: new_password.to_string(),
        };
        let response: MessageResponse = self
            .send(self.client.post(self.url("/users/change-password")).json(&body))
            .await?;
        Ok(response.message)
    }

    pub async fn complete_onboarding(&self) -> Result<UserPublic> {
        self.send(self.client.post(self.url("/users/me/onboarding-complete")))
            .await
    }

    /// Invalidate the server-side refresh cookie.
    pub async fn logout(&self) -> Result<()> {
        let resp = self.authorize(self.client.post(self.url("/logout"))).send().await?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        Ok(())
    }

    pub async fn list_avatars(&self) -> Result<Vec<String>> {
        self.send(self.client.get(self.url("/avatars"))).await
    }

    pub async fn list_users(&self) -> Result<Vec<UserPublic>> {
        self.send(self.client.get(self.url("/admin/users"))).await
    }

    pub async fn create_user(&self, request: &AdminCreateUserRequest) -> Result<UserPublic> {
        tracing::debug!(username = %request.username, "POST /admin/users");
        self.send(self.client.post(self.url("/admin/users")).json(request))
            .await
    }

    pub async fn submit_feedback(&self, rating: u8, message: &str) -> Result<FeedbackReceipt> {
        let body = FeedbackCreate {
            rating,
            message: message.to_string(),
        };
        self.send(self.client.post(self.url("/feedback")).json(&body))
            .await
    }

    pub async fn list_feedback(&self) -> Result<Vec<FeedbackPublic>> {
        self.send(self.client.get(self.url("/admin/feedback"))).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let resp = self.authorize(request).send().await?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        Ok(resp.json().await?)
    }
}

/// Turn a non-2xx response into an [`ApiError`], preferring the backend's
/// `detail` message over the raw body.
pub(crate) async fn error_from(resp: Response) -> ApiError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body
            }
        });

    tracing::debug!(status = status.as_u16(), %message, "Backend returned an error");

    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
        StatusCode::FORBIDDEN => ApiError::Forbidden(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        other => ApiError::Api {
            status: other.as_u16(),
            message,
        },
    }
}
