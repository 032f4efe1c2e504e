use std::fmt;
use std::str::FromStr;

use dashboard_api::UserPublic;
use serde::{Deserialize, Serialize};

/// The backend grants admin rights to exactly this account.
pub const ADMIN_USERNAME: &str = "admin";

/// Where avatar images are served from.
pub const AVATAR_BASE_PATH: &str = "/avatars";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// The currently authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque id or username, unique per backend
    pub identity: String,
    pub display_name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub onboarding_complete: bool,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Public URL of the avatar image, if one is set.
    pub fn avatar_url(&self) -> Option<String> {
        self.avatar.as_deref().map(avatar_url)
    }

    /// Single uppercase letter shown when there is no avatar.
    pub fn initial(&self) -> char {
        self.display_name
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('?')
    }
}

pub fn avatar_url(filename: &str) -> String {
    format!("{AVATAR_BASE_PATH}/{filename}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Successful signin/signup: the credential token plus the identity it proves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub token: String,
    pub session: Session,
}

/// A user as listed by the admin endpoints, normalized across backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    pub disabled: bool,
    pub onboarding_completed: bool,
    pub role: Role,
}

impl UserRecord {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.username)
    }

    pub fn to_session(&self) -> Session {
        Session {
            identity: self.username.clone(),
            display_name: self.display_name().to_string(),
            email: self.email.clone(),
            avatar: self.avatar.clone(),
            role: self.role,
            onboarding_complete: self.onboarding_completed,
        }
    }
}

impl From<UserPublic> for UserRecord {
    fn from(user: UserPublic) -> Self {
        let role = if user.username == ADMIN_USERNAME {
            Role::Admin
        } else {
            Role::User
        };
        Self {
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            avatar: user.avatar,
            disabled: user.disabled,
            onboarding_completed: user.onboarding_completed,
            role,
        }
    }
}
