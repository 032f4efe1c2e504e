//! Auth Gateway backed by a CSV user table held in memory.
//!
//! Used for demos and offline development. The table is read once from a
//! file (or taken from explicit seed users); changes live for the lifetime
//! of the gateway. Tokens have the form `token-<id>`.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::gateway::AuthGateway;
use super::types::{Authenticated, Credentials, Role, Session, UserRecord};
use crate::error::{DashboardError, Result};
use crate::feedback::FeedbackEntry;
use crate::validation::{NewUser, SignupProfile};

/// Avatars offered by the picker.
pub const AVATARS: &[&str] = &[
    "avatar1.png",
    "avatar2.png",
    "avatar3.png",
    "avatar4.png",
    "avatar5.png",
];

const DEFAULT_AVATAR: &str = "avatar1.png";
const TOKEN_PREFIX: &str = "token-";

/// One row of the user table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvUser {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    pub onboarding_completed: bool,
    pub role: Role,
    pub disabled: bool,
}

impl CsvUser {
    fn record(&self) -> UserRecord {
        UserRecord {
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar.clone(),
            disabled: self.disabled,
            onboarding_completed: self.onboarding_completed,
            role: self.role,
        }
    }

    fn session(&self) -> Session {
        self.record().to_session()
    }

    fn token(&self) -> String {
        format!("{TOKEN_PREFIX}{}", self.id)
    }
}

/// Parse `id,username,email,password,full_name,avatar,onboarding_completed,role`.
///
/// Column order is taken from the header line; unknown columns are ignored.
/// Values cannot contain commas.
pub fn parse_users(text: &str) -> Result<Vec<CsvUser>> {
    let mut lines = text.trim().lines();
    let headers: Vec<&str> = match lines.next() {
        Some(header) => header.split(',').map(str::trim).collect(),
        None => return Ok(Vec::new()),
    };

    let mut users = Vec::new();
    for (offset, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = offset + 2;
        let values: Vec<&str> = line.split(',').map(str::trim).collect();
        let field = |name: &str| {
            headers
                .iter()
                .position(|h| *h == name)
                .and_then(|i| values.get(i).copied())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &str| {
            field(name).map(str::to_string).ok_or_else(|| {
                DashboardError::Storage(format!("users csv line {line_no}: missing {name}"))
            })
        };

        let id = required("id")?.parse::<u64>().map_err(|_| {
            DashboardError::Storage(format!("users csv line {line_no}: invalid id"))
        })?;
        let role = field("role")
            .unwrap_or("user")
            .parse::<Role>()
            .map_err(|e| DashboardError::Storage(format!("users csv line {line_no}: {e}")))?;

        users.push(CsvUser {
            id,
            username: required("username")?,
            email: required("email")?,
            password: required("password")?,
            full_name: field("full_name").map(str::to_string),
            avatar: field("avatar").map(str::to_string),
            onboarding_completed: field("onboarding_completed") == Some("true"),
            role,
            disabled: field("disabled") == Some("true"),
        });
    }
    Ok(users)
}

/// Demo accounts used when no CSV file is configured.
pub fn seed_users() -> Vec<CsvUser> {
    vec![
        CsvUser {
            id: 1,
            username: "john_doe".to_string(),
            email: "john@example.com".to_string(),
            password: "password123".to_string(),
            full_name: Some("John Doe".to_string()),
            avatar: Some("avatar1.png".to_string()),
            onboarding_completed: true,
            role: Role::User,
            disabled: false,
        },
        CsvUser {
            id: 2,
            username: "admin_user".to_string(),
            email: "admin@example.com".to_string(),
            password: "admin123".to_string(),
            full_name: Some("Admin User".to_string()),
            avatar: Some("avatar3.png".to_string()),
            onboarding_completed: true,
            role: Role::Admin,
            disabled: false,
        },
    ]
}

pub struct CsvGateway {
    users: RwLock<Vec<CsvUser>>,
    feedback: RwLock<Vec<FeedbackEntry>>,
}

impl CsvGateway {
    pub fn from_users(users: Vec<CsvUser>) -> Self {
        Self {
            users: RwLock::new(users),
            feedback: RwLock::new(Vec::new()),
        }
    }

    pub fn seeded() -> Self {
        Self::from_users(seed_users())
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            DashboardError::Storage(format!("failed to read {}: {e}", path.display()))
        })?;
        let users = parse_users(&text)?;
        tracing::info!(path = %path.display(), count = users.len(), "Loaded users from CSV");
        Ok(Self::from_users(users))
    }

    async fn user_for_token(&self, token: &str) -> Result<CsvUser> {
        let id = token
            .strip_prefix(TOKEN_PREFIX)
            .and_then(|id| id.parse::<u64>().ok())
            .ok_or_else(|| DashboardError::Auth("Invalid or expired token".to_string()))?;

        self.users
            .read()
            .await
            .iter()
            .find(|u| u.id == id && !u.disabled)
            .cloned()
            .ok_or_else(|| DashboardError::Auth("Invalid or expired token".to_string()))
    }

    async fn require_admin(&self, token: &str) -> Result<CsvUser> {
        let user = self.user_for_token(token).await?;
        if user.role != Role::Admin {
            return Err(DashboardError::Forbidden);
        }
        Ok(user)
    }

    /// Apply `change` to the user behind `token` and return the new session.
    async fn update_user<F>(&self, token: &str, change: F) -> Result<Session>
    where
        F: FnOnce(&mut CsvUser),
    {
        let current = self.user_for_token(token).await?;
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|u| u.id == current.id)
            .ok_or_else(|| DashboardError::NotFound("User not found".to_string()))?;
        change(user);
        Ok(user.session())
    }
}

fn next_id(users: &[CsvUser]) -> u64 {
    users.iter().map(|u| u.id).max().unwrap_or(0) + 1
}

#[async_trait]
impl AuthGateway for CsvGateway {
    fn name(&self) -> &'static str {
        "csv"
    }

    async fn signup(&self, profile: &SignupProfile) -> Result<Authenticated> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&profile.email)) {
            return Err(DashboardError::Rejected("Email already exists".to_string()));
        }

        let user = CsvUser {
            id: next_id(&users),
            username: profile
                .email
                .split('@')
                .next()
                .unwrap_or(&profile.email)
                .to_string(),
            email: profile.email.clone(),
            password: profile.password.clone(),
            full_name: Some(profile.name.clone()),
            avatar: Some(DEFAULT_AVATAR.to_string()),
            onboarding_completed: false,
            role: Role::User,
            disabled: false,
        };
        let authenticated = Authenticated {
            token: user.token(),
            session: user.session(),
        };
        users.push(user);
        Ok(authenticated)
    }

    async fn signin(&self, credentials: &Credentials) -> Result<Authenticated> {
        let users = self.users.read().await;
        let user = users
            .iter()
            .find(|u| {
                u.email == credentials.email && u.password == credentials.password && !u.disabled
            })
            .ok_or_else(|| DashboardError::Auth("Invalid email or password".to_string()))?;

        Ok(Authenticated {
            token: user.token(),
            session: user.session(),
        })
    }

    async fn current_session(&self, token: &str) -> Result<Session> {
        Ok(self.user_for_token(token).await?.session())
    }

    async fn change_avatar(&self, token: &str, avatar: &str) -> Result<Session> {
        if !AVATARS.contains(&avatar) {
            return Err(DashboardError::Rejected("Invalid avatar selection".to_string()));
        }
        self.update_user(token, |user| user.avatar = Some(avatar.to_string()))
            .await
    }

    async fn change_password(
        &self,
        token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let user = self.user_for_token(token).await?;
        if user.password != current_password {
            return Err(DashboardError::Rejected(
                "Current password is incorrect".to_string(),
            ));
        }
        self.update_user(token, |user| user.password = new_password.to_string())
            .await?;
        Ok(())
    }

    async fn complete_onboarding(&self, token: &str) -> Result<Session> {
        self.update_user(token, |user| user.onboarding_completed = true)
            .await
    }

    async fn signout(&self, _token: &str) -> Result<()> {
        Ok(())
    }

    async fn list_avatars(&self) -> Result<Vec<String>> {
        Ok(AVATARS.iter().map(|a| a.to_string()).collect())
    }

    async fn list_users(&self, token: &str) -> Result<Vec<UserRecord>> {
        self.require_admin(token).await?;
        Ok(self.users.read().await.iter().map(CsvUser::record).collect())
    }

    async fn create_user(&self, token: &str, user: &NewUser) -> Result<UserRecord> {
        self.require_admin(token).await?;

        let mut users = self.users.write().await;
        if users
            .iter()
            .any(|u| u.username == user.username || u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(DashboardError::Rejected(
                "Username or email already exists".to_string(),
            ));
        }

        let created = CsvUser {
            id: next_id(&users),
            username: user.username.trim().to_string(),
            email: user.email.trim().to_string(),
            password: user.password.clone(),
            full_name: user.full_name.clone().filter(|n| !n.trim().is_empty()),
            avatar: Some(
                user.avatar
                    .clone()
                    .unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
            ),
            onboarding_completed: false,
            role: Role::User,
            disabled: user.disabled,
        };
        let record = created.record();
        users.push(created);
        Ok(record)
    }

    async fn submit_feedback(&self, token: &str, rating: u8, message: &str) -> Result<String> {
        let user = self.user_for_token(token).await?;
        let entry = FeedbackEntry {
            id: Uuid::new_v4().to_string(),
            username: user.username,
            rating,
            message: message.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        };
        let id = entry.id.clone();
        self.feedback.write().await.push(entry);
        Ok(id)
    }

    async fn list_feedback(&self, token: &str) -> Result<Vec<FeedbackEntry>> {
        self.require_admin(token).await?;
        Ok(self.feedback.read().await.clone())
    }
}
