//! Auth Gateway backed by the dashboard REST API.

use async_trait::async_trait;
use dashboard_api::{AdminCreateUserRequest, DashboardApiClient, SignupRequest};

use super::gateway::AuthGateway;
use super::types::{Authenticated, Credentials, Session, UserRecord};
use crate::error::Result;
use crate::feedback::FeedbackEntry;
use crate::validation::{NewUser, SignupProfile};

pub struct RestGateway {
    client: DashboardApiClient,
}

impl RestGateway {
    pub fn new(client: DashboardApiClient) -> Self {
        Self { client }
    }

    pub fn from_url(base_url: impl Into<String>) -> Self {
        Self::new(DashboardApiClient::new(base_url))
    }

    fn authed(&self, token: &str) -> DashboardApiClient {
        self.client.with_token(token)
    }
}

/// The backend keys accounts by username; signups use the email local part.
fn username_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

#[async_trait]
impl AuthGateway for RestGateway {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn signup(&self, profile: &SignupProfile) -> Result<Authenticated> {
        let request = SignupRequest {
            username: username_from_email(&profile.email),
            email: profile.email.clone(),
            password: profile.password.clone(),
            full_name: Some(profile.name.clone()),
            avatar: None,
        };
        let created = self.client.signup(&request).await?;
        tracing::info!(username = %created.username, "Account registered");

        let token = self.client.login(&profile.email, &profile.password).await?;
        Ok(Authenticated {
            token: token.access_token,
            session: UserRecord::from(created).to_session(),
        })
    }

    async fn signin(&self, credentials: &Credentials) -> Result<Authenticated> {
        let token = self
            .client
            .login(&credentials.email, &credentials.password)
            .await?;
        let session = self.current_session(&token.access_token).await?;
        Ok(Authenticated {
            token: token.access_token,
            session,
        })
    }

    async fn current_session(&self, token: &str) -> Result<Session> {
        let user = self.authed(token).current_user().await?;
        Ok(UserRecord::from(user).to_session())
    }

    async fn change_avatar(&self, token: &str, avatar: &str) -> Result<Session> {
        let user = self.authed(token).update_avatar(avatar).await?;
        Ok(UserRecord::from(user).to_session())
    }

    async fn change_password(
        &self,
        token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let message = self
            .authed(token)
            .change_password(current_password, new_password)
            .await?;
        tracing::debug!(%message, "Password changed");
        Ok(())
    }

    async fn complete_onboarding(&self, token: &str) -> Result<Session> {
        let user = self.authed(token).complete_onboarding().await?;
        Ok(UserRecord::from(user).to_session())
    }

    async fn signout(&self, token: &str) -> Result<()> {
        self.authed(token).logout().await?;
        Ok(())
    }

    async fn list_avatars(&self) -> Result<Vec<String>> {
        Ok(self.client.list_avatars().await?)
    }

    async fn list_users(&self, token: &str) -> Result<Vec<UserRecord>> {
        let users = self.authed(token).list_users().await?;
        Ok(users.into_iter().map(UserRecord::from).collect())
    }

    async fn create_user(&self, token: &str, user: &NewUser) -> Result<UserRecord> {
        let request = AdminCreateUserRequest {
            username: user.username.trim().to_string(),
            email: user.email.trim().to_string(),
            password: user.password.clone(),
            full_name: user.full_name.clone().filter(|n| !n.trim().is_empty()),
            disabled: user.disabled,
            avatar: user.avatar.clone(),
        };
        let created = self.authed(token).create_user(&request).await?;
        Ok(UserRecord::from(created))
    }

    async fn submit_feedback(&self, token: &str, rating: u8, message: &str) -> Result<String> {
        let receipt = self.authed(token).submit_feedback(rating, message).await?;
        Ok(receipt.feedback_id)
    }

    async fn list_feedback(&self, token: &str) -> Result<Vec<FeedbackEntry>> {
        let entries = self.authed(token).list_feedback().await?;
        Ok(entries.into_iter().map(FeedbackEntry::from).collect())
    }
}
