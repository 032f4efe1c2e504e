use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use dashboard_api::directory::DEFAULT_DIRECTORY_URL;
use dashboard_api::DEFAULT_BASE_URL;
use dotenvy::dotenv;

/// Which Auth Gateway implementation backs the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthBackend {
    #[default]
    Rest,
    Csv,
}

impl FromStr for AuthBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(AuthBackend::Rest),
            "csv" => Ok(AuthBackend::Csv),
            other => Err(anyhow!("unknown auth backend '{other}' (expected rest or csv)")),
        }
    }
}

/// Where the customers table gets its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CustomerSourceKind {
    #[default]
    Mock,
    Directory,
    AdminUsers,
}

impl FromStr for CustomerSourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(CustomerSourceKind::Mock),
            "directory" => Ok(CustomerSourceKind::Directory),
            "admin-users" | "admin_users" => Ok(CustomerSourceKind::AdminUsers),
            other => Err(anyhow!(
                "unknown customer source '{other}' (expected mock, directory or admin-users)"
            )),
        }
    }
}

/// Where submitted feedback goes and where the admin table reads it from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedbackSink {
    #[default]
    Rest,
    Local,
}

impl FromStr for FeedbackSink {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(FeedbackSink::Rest),
            "local" => Ok(FeedbackSink::Local),
            other => Err(anyhow!("unknown feedback sink '{other}' (expected rest or local)")),
        }
    }
}

/// What a 401 on an authenticated call does to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnauthorizedPolicy {
    /// Clear the token and fall back to the signin surface
    #[default]
    Logout,
    /// Report the failure, keep the session
    Ignore,
}

impl FromStr for UnauthorizedPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "logout" => Ok(UnauthorizedPolicy::Logout),
            "ignore" => Ok(UnauthorizedPolicy::Ignore),
            other => Err(anyhow!("unknown 401 policy '{other}' (expected logout or ignore)")),
        }
    }
}

/// Inclusive latency window for simulated backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency {
    pub min: Duration,
    pub max: Duration,
}

impl Latency {
    pub const NONE: Latency = Latency {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub fn from_millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min.min(max)),
            max: Duration::from_millis(min.max(max)),
        }
    }

    /// Uniform sample from the window.
    pub fn sample(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            return self.min;
        }
        Duration::from_millis(fastrand::u64(min..=max))
    }
}

impl FromStr for Latency {
    type Err = anyhow::Error;

    /// `"800-2000"` or a single value such as `"0"`.
    fn from_str(s: &str) -> Result<Self> {
        let parse = |v: &str| {
            v.trim()
                .parse::<u64>()
                .with_context(|| format!("invalid latency '{v}'"))
        };
        match s.split_once('-') {
            Some((min, max)) => Ok(Latency::from_millis(parse(min)?, parse(max)?)),
            None => {
                let ms = parse(s)?;
                Ok(Latency::from_millis(ms, ms))
            }
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub directory_url: String,
    pub auth_backend: AuthBackend,
    /// CSV user table for the csv backend; `None` uses the built-in seed users
    pub users_csv: Option<PathBuf>,
    pub customer_source: CustomerSourceKind,
    pub feedback_sink: FeedbackSink,
    pub unauthorized_policy: UnauthorizedPolicy,
    /// JSON file backing durable storage; `None` keeps everything in memory
    pub storage_path: Option<PathBuf>,
    pub mock_latency: Latency,
    pub mock_failure_rate: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_string(),
            directory_url: DEFAULT_DIRECTORY_URL.to_string(),
            auth_backend: AuthBackend::default(),
            users_csv: None,
            customer_source: CustomerSourceKind::default(),
            feedback_sink: FeedbackSink::default(),
            unauthorized_policy: UnauthorizedPolicy::default(),
            storage_path: None,
            mock_latency: Latency::from_millis(800, 2000),
            mock_failure_rate: 0.0,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mock_failure_rate = match var("DASHBOARD_MOCK_FAILURE_RATE") {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .context("DASHBOARD_MOCK_FAILURE_RATE must be a number")?,
            None => defaults.mock_failure_rate,
        };
        if !(0.0..=1.0).contains(&mock_failure_rate) {
            bail!("DASHBOARD_MOCK_FAILURE_RATE must be between 0 and 1");
        }

        Ok(Self {
            api_url: var("DASHBOARD_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            directory_url: var("DASHBOARD_DIRECTORY_URL").unwrap_or(defaults.directory_url),
            auth_backend: var("DASHBOARD_AUTH_BACKEND")
                .map(|v| v.parse())
                .transpose()
                .context("DASHBOARD_AUTH_BACKEND is invalid")?
                .unwrap_or(defaults.auth_backend),
            users_csv: var("DASHBOARD_USERS_CSV").map(PathBuf::from),
            customer_source: var("DASHBOARD_CUSTOMER_SOURCE")
                .map(|v| v.parse())
                .transpose()
                .context("DASHBOARD_CUSTOMER_SOURCE is invalid")?
                .unwrap_or(defaults.customer_source),
            feedback_sink: var("DASHBOARD_FEEDBACK_SINK")
                .map(|v| v.parse())
                .transpose()
                .context("DASHBOARD_FEEDBACK_SINK is invalid")?
                .unwrap_or(defaults.feedback_sink),
            unauthorized_policy: var("DASHBOARD_ON_UNAUTHORIZED")
                .map(|v| v.parse())
                .transpose()
                .context("DASHBOARD_ON_UNAUTHORIZED is invalid")?
                .unwrap_or(defaults.unauthorized_policy),
            storage_path: var("DASHBOARD_STORAGE_PATH").map(PathBuf::from),
            mock_latency: var("DASHBOARD_MOCK_LATENCY_MS")
                .map(|v| v.parse())
                .transpose()
                .context("DASHBOARD_MOCK_LATENCY_MS is invalid")?
                .unwrap_or(defaults.mock_latency),
            mock_failure_rate,
        })
    }
}
