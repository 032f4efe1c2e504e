//! Application assembly: picks every strategy from [`Config`] and wires the
//! shared pieces together.

use std::sync::Arc;

use anyhow::{Context, Result};
use dashboard_api::DirectoryClient;

use crate::auth::{AuthGateway, CsvGateway, RestGateway, SessionStore};
use crate::changelog::ChangelogFeed;
use crate::config::{AuthBackend, Config, CustomerSourceKind};
use crate::error::DashboardError;
use crate::feedback::{FeedbackEntry, FeedbackService};
use crate::mock_api::MockCustomerApi;
use crate::routes::Navigator;
use crate::storage::{
    FileStorage, MemoryStorage, Slot, Storage, CHANGELOG_KEY, FEEDBACK_KEY, TOKEN_KEY,
};
use crate::tables::{
    ActivityEnricher, AdminUserSource, CustomerRow, CustomerStore, DirectoryCustomerSource,
    MockCustomerSource, RowSource, TableReconciler,
};

/// Shared application state
#[derive(Clone)]
pub struct Dashboard {
    pub config: Config,
    pub session: Arc<SessionStore>,
    pub feedback: Arc<FeedbackService>,
    pub changelog: Arc<ChangelogFeed>,
    pub mock_customers: Arc<MockCustomerApi>,
}

async fn open_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    match &config.storage_path {
        Some(path) => {
            let storage = FileStorage::open(path)
                .await
                .with_context(|| format!("Failed to open storage at {}", path.display()))?;
            Ok(Arc::new(storage))
        }
        None => Ok(Arc::new(MemoryStorage::new())),
    }
}

async fn build_gateway(config: &Config) -> Result<Arc<dyn AuthGateway>> {
    match config.auth_backend {
        AuthBackend::Rest => Ok(Arc::new(RestGateway::from_url(config.api_url.clone()))),
        AuthBackend::Csv => match &config.users_csv {
            Some(path) => {
                let gateway = CsvGateway::from_path(path)
                    .await
                    .with_context(|| format!("Failed to load users from {}", path.display()))?;
                Ok(Arc::new(gateway))
            }
            None => {
                tracing::info!("No users CSV configured, using built-in seed users");
                Ok(Arc::new(CsvGateway::seeded()))
            }
        },
    }
}

impl Dashboard {
    /// Build the dashboard. The session is left in `Bootstrapping`; call
    /// [`SessionStore::bootstrap`] before guarding routes.
    pub async fn from_config(config: Config, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let storage = open_storage(&config).await?;
        let gateway = build_gateway(&config).await?;

        let session = Arc::new(SessionStore::new(
            gateway,
            Slot::new(storage.clone(), TOKEN_KEY),
            navigator,
            config.unauthorized_policy,
        ));
        let feedback = Arc::new(FeedbackService::new(
            config.feedback_sink,
            session.clone(),
            Slot::new(storage.clone(), FEEDBACK_KEY),
        ));
        let changelog = Arc::new(
            ChangelogFeed::new(Slot::new(storage, CHANGELOG_KEY))
                .context("Failed to load packaged changelog")?,
        );
        let mock_customers = Arc::new(MockCustomerApi::new(
            config.mock_latency,
            config.mock_failure_rate,
        ));

        tracing::info!(
            auth_backend = ?config.auth_backend,
            customer_source = ?config.customer_source,
            feedback_sink = ?config.feedback_sink,
            "Dashboard assembled"
        );

        Ok(Self {
            config,
            session,
            feedback,
            changelog,
            mock_customers,
        })
    }

    /// A fresh customers table over the configured source.
    pub fn customers_table(&self) -> TableReconciler<CustomerRow> {
        let source: Arc<dyn RowSource<Row = CustomerRow>> = match self.config.customer_source {
            CustomerSourceKind::Mock => {
                Arc::new(MockCustomerSource::new(self.mock_customers.clone()))
            }
            CustomerSourceKind::Directory => Arc::new(DirectoryCustomerSource::new(
                DirectoryClient::new(self.config.directory_url.clone()),
            )),
            CustomerSourceKind::AdminUsers => {
                Arc::new(AdminUserSource::new(self.session.clone()))
            }
        };
        TableReconciler::new(source)
    }

    /// Write access to the configured customer source. The admin user
    /// listing is read-only.
    pub fn customer_store(&self) -> crate::error::Result<Arc<dyn CustomerStore>> {
        match self.config.customer_source {
            CustomerSourceKind::Mock => {
                Ok(Arc::new(MockCustomerSource::new(self.mock_customers.clone())))
            }
            CustomerSourceKind::Directory => Ok(Arc::new(DirectoryCustomerSource::new(
                DirectoryClient::new(self.config.directory_url.clone()),
            ))),
            CustomerSourceKind::AdminUsers => Err(DashboardError::Rejected(
                "The admin-users customer source is read-only".to_string(),
            )),
        }
    }

    /// Registered accounts, for the admin view.
    pub fn users_table(&self) -> TableReconciler<CustomerRow> {
        TableReconciler::new(Arc::new(AdminUserSource::new(self.session.clone())))
    }

    pub fn feedback_table(&self) -> TableReconciler<FeedbackEntry> {
        TableReconciler::new(self.feedback.clone())
    }

    pub fn enricher(&self) -> ActivityEnricher {
        ActivityEnricher::new(self.config.mock_latency)
    }
}
