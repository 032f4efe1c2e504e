//! Auth Gateway - the backend seam of the session store.
//!
//! Implementations talk to a remote or mock backend and normalize its
//! answers into [`Session`] / [`UserRecord`]. They never touch durable
//! storage or session state; the store owns both.

use async_trait::async_trait;

use super::types::{Authenticated, Credentials, Session, UserRecord};
use crate::error::Result;
use crate::feedback::FeedbackEntry;
use crate::validation::{NewUser, SignupProfile};

#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Register an account and sign it in. New accounts are role user with
    /// onboarding incomplete.
    async fn signup(&self, profile: &SignupProfile) -> Result<Authenticated>;

    async fn signin(&self, credentials: &Credentials) -> Result<Authenticated>;

    /// Resolve the identity behind a persisted token.
    async fn current_session(&self, token: &str) -> Result<Session>;

    async fn change_avatar(&self, token: &str, avatar: &str) -> Result<Session>;

    async fn change_password(
        &self,
        token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()>;

    async fn complete_onboarding(&self, token: &str) -> Result<Session>;

    /// Best-effort server-side logout.
    async fn signout(&self, token: &str) -> Result<()>;

    async fn list_avatars(&self) -> Result<Vec<String>>;

    async fn list_users(&self, token: &str) -> Result<Vec<UserRecord>>;

    async fn create_user(&self, token: &str, user: &NewUser) -> Result<UserRecord>;

    async fn submit_feedback(&self, token: &str, rating: u8, message: &str) -> Result<String>;

    async fn list_feedback(&self, token: &str) -> Result<Vec<FeedbackEntry>>;
}
