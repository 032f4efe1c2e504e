//! Dashboard surfaces and navigation.

use std::fmt;

use tokio::sync::mpsc;

use crate::auth::guard::RouteRequirements;

pub const SIGNIN_PATH: &str = "/signin";
pub const SIGNUP_PATH: &str = "/signup";
pub const HOME_PATH: &str = "/";
pub const ONBOARDING_PREFIX: &str = "/onboarding";

/// Number of onboarding steps before the completion page.
pub const ONBOARDING_STEPS: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    SignIn,
    SignUp,
    Dashboard,
    Onboarding(u8),
    OnboardingComplete,
    Customers,
    Changelog,
    AccountSettings,
    FeedbackSettings,
    AdminFeedback,
    /// Anything not in the table; kept so it can still be guarded.
    Unknown(String),
}

/// Strip query, fragment and trailing slash.
pub fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        HOME_PATH
    } else {
        trimmed
    }
}

/// True for `/onboarding` and anything below it, but not `/onboardingx`.
pub fn is_onboarding_path(path: &str) -> bool {
    let path = normalize_path(path);
    path == ONBOARDING_PREFIX
        || path
            .strip_prefix(ONBOARDING_PREFIX)
            .is_some_and(|rest| rest.starts_with('/'))
}

impl Route {
    pub fn from_path(path: &str) -> Route {
        let path = normalize_path(path);
        match path {
            SIGNIN_PATH => Route::SignIn,
            SIGNUP_PATH => Route::SignUp,
            HOME_PATH => Route::Dashboard,
            "/onboarding/complete" => Route::OnboardingComplete,
            "/ecommerce/customers" => Route::Customers,
            "/utility/changelog" => Route::Changelog,
            "/settings/account" => Route::AccountSettings,
            "/settings/feedback" => Route::FeedbackSettings,
            "/admin/feedback" => Route::AdminFeedback,
            other => other
                .strip_prefix("/onboarding/")
                .and_then(|step| step.parse::<u8>().ok())
                .filter(|step| (1..=ONBOARDING_STEPS).contains(step))
                .map(Route::Onboarding)
                .unwrap_or_else(|| Route::Unknown(other.to_string())),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::SignIn => SIGNIN_PATH.to_string(),
            Route::SignUp => SIGNUP_PATH.to_string(),
            Route::Dashboard => HOME_PATH.to_string(),
            Route::Onboarding(step) => format!("{ONBOARDING_PREFIX}/{step}"),
            Route::OnboardingComplete => format!("{ONBOARDING_PREFIX}/complete"),
            Route::Customers => "/ecommerce/customers".to_string(),
            Route::Changelog => "/utility/changelog".to_string(),
            Route::AccountSettings => "/settings/account".to_string(),
            Route::FeedbackSettings => "/settings/feedback".to_string(),
            Route::AdminFeedback => "/admin/feedback".to_string(),
            Route::Unknown(path) => path.clone(),
        }
    }

    pub fn requirements(&self) -> RouteRequirements {
        match self {
            Route::SignIn | Route::SignUp => RouteRequirements::public(),
            Route::Onboarding(_) | Route::OnboardingComplete => RouteRequirements::onboarding(),
            Route::AdminFeedback => RouteRequirements::admin(),
            Route::Dashboard
            | Route::Customers
            | Route::Changelog
            | Route::AccountSettings
            | Route::FeedbackSettings
            | Route::Unknown(_) => RouteRequirements::authenticated(),
        }
    }

    /// Where a user goes after finishing `step`.
    pub fn next_onboarding_step(step: u8) -> Route {
        if step >= ONBOARDING_STEPS {
            Route::OnboardingComplete
        } else {
            Route::Onboarding(step + 1)
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Receives navigation requests issued by the session store.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Forwards navigation requests to a channel, in order.
#[derive(Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, path: &str) {
        if self.tx.send(path.to_string()).is_err() {
            tracing::debug!(path, "Navigation dropped, no listener");
        }
    }
}

/// Logs navigation requests; used by the CLI where there is no router.
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, path: &str) {
        tracing::info!(path, "Navigate");
    }
}
