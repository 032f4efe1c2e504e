//! Customer table rows and the sources that feed them.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use dashboard_api::{DirectoryAddress, DirectoryClient, DirectoryCustomer};
use serde::Serialize;

use super::{Enricher, RowSource, TableRow};
use crate::auth::{SessionStore, UserRecord};
use crate::config::Latency;
use crate::error::Result;
use crate::mock_api::{Customer, CustomerStatus, CustomerUpdate, MockCustomerApi, DEFAULT_PAGE_SIZE};
use crate::validation::NewCustomer;

const PLACEHOLDER: &str = "-";
const ADMIN_AVATAR_PATH: &str = "/dbz";

/// One customer line, whatever the source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub location: String,
    pub image: Option<String>,
    pub orders: String,
    pub last_order: String,
    pub spent: String,
    pub refunds: String,
    /// Only set for admin user listings
    pub onboarding_completed: Option<bool>,
    pub active: bool,
}

impl TableRow for CustomerRow {
    fn id(&self) -> &str {
        &self.id
    }
}

impl From<&Customer> for CustomerRow {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id.clone(),
            name: customer.name.clone(),
            email: customer.email.clone(),
            location: customer.location.clone(),
            image: customer.avatar.clone(),
            orders: customer.orders.to_string(),
            last_order: customer
                .last_order
                .clone()
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            spent: format!("${:.2}", customer.spent),
            refunds: customer.refunds.to_string(),
            onboarding_completed: None,
            active: customer.status == CustomerStatus::Active,
        }
    }
}

impl From<&UserRecord> for CustomerRow {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.username.clone(),
            name: user.display_name().to_string(),
            email: user.email.clone(),
            location: PLACEHOLDER.to_string(),
            image: user
                .avatar
                .as_deref()
                .map(|avatar| format!("{ADMIN_AVATAR_PATH}/{avatar}")),
            orders: PLACEHOLDER.to_string(),
            last_order: PLACEHOLDER.to_string(),
            spent: PLACEHOLDER.to_string(),
            refunds: PLACEHOLDER.to_string(),
            onboarding_completed: Some(user.onboarding_completed),
            active: !user.disabled,
        }
    }
}

fn country_flag(country: &str) -> &'static str {
    match country {
        "USA" => "🇺🇸",
        "UK" => "🇬🇧",
        "CA" => "🇨🇦",
        "DE" => "🇩🇪",
        "FR" => "🇫🇷",
        "IT" => "🇮🇹",
        "ES" => "🇪🇸",
        "JP" => "🇯🇵",
        "CN" => "🇨🇳",
        "AU" => "🇦🇺",
        _ => "🌍",
    }
}

/// `<flag> <city>, <state>`; the state falls back to the country.
pub fn format_location(address: Option<&DirectoryAddress>) -> String {
    let Some(address) = address else {
        return "🌍 Unknown".to_string();
    };
    let flag = address.country.as_deref().map(country_flag).unwrap_or("🌍");
    let city = address.city.as_deref().unwrap_or("Unknown City");
    let state = address
        .state
        .as_deref()
        .or(address.country.as_deref())
        .unwrap_or("Unknown");
    format!("{flag} {city}, {state}")
}

/// Normalize a directory record; `index` stands in for a missing id.
pub fn directory_row(index: usize, customer: &DirectoryCustomer) -> CustomerRow {
    let first = customer.first_name.as_deref().unwrap_or("Unknown");
    let last = customer.last_name.as_deref().unwrap_or("User");
    CustomerRow {
        id: customer
            .customer_id
            .clone()
            .unwrap_or_else(|| index.to_string()),
        name: format!("{first} {last}"),
        email: customer
            .email
            .clone()
            .unwrap_or_else(|| "no-email@example.com".to_string()),
        location: format_location(customer.address.as_ref()),
        image: None,
        orders: "0".to_string(),
        last_order: "#000000".to_string(),
        spent: "$0.00".to_string(),
        refunds: "0".to_string(),
        onboarding_completed: None,
        active: customer
            .status
            .as_deref()
            .map_or(true, |status| status.eq_ignore_ascii_case("active")),
    }
}

// ============================================================================
// Sources
// ============================================================================

pub struct MockCustomerSource {
    api: Arc<MockCustomerApi>,
}

impl MockCustomerSource {
    pub fn new(api: Arc<MockCustomerApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl RowSource for MockCustomerSource {
    type Row = CustomerRow;

    fn name(&self) -> &'static str {
        "mock-customers"
    }

    /// Walks every page.
    async fn fetch(&self) -> Result<Vec<CustomerRow>> {
        let mut rows = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.api.list(page, DEFAULT_PAGE_SIZE).await?;
            rows.extend(batch.data.iter().map(CustomerRow::from));
            if batch.data.is_empty() || rows.len() >= batch.total {
                break;
            }
            page += 1;
        }
        Ok(rows)
    }
}

pub struct DirectoryCustomerSource {
    client: DirectoryClient,
}

impl DirectoryCustomerSource {
    pub fn new(client: DirectoryClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RowSource for DirectoryCustomerSource {
    type Row = CustomerRow;

    fn name(&self) -> &'static str {
        "directory"
    }

    async fn fetch(&self) -> Result<Vec<CustomerRow>> {
        let customers = self.client.fetch_customers().await?;
        Ok(customers
            .iter()
            .enumerate()
            .map(|(index, customer)| directory_row(index, customer))
            .collect())
    }
}

// ============================================================================
// Writes
// ============================================================================

/// Customer changes, for the sources that accept them.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the new id when the backend reports one.
    async fn add(&self, customer: &NewCustomer) -> Result<Option<String>>;

    async fn update(&self, id: &str, update: &CustomerUpdate) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Case-insensitive match on name, email or location.
    async fn search(&self, query: &str) -> Result<Vec<CustomerRow>>;
}

fn row_matches(row: &CustomerRow, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    [&row.name, &row.email, &row.location]
        .iter()
        .any(|field| field.to_lowercase().contains(&query))
}

fn trimmed(customer: &NewCustomer) -> NewCustomer {
    NewCustomer {
        name: customer.name.trim().to_string(),
        email: customer.email.trim().to_string(),
        location: customer.location.trim().to_string(),
    }
}

#[async_trait]
impl CustomerStore for MockCustomerSource {
    fn name(&self) -> &'static str {
        "mock-customers"
    }

    async fn add(&self, customer: &NewCustomer) -> Result<Option<String>> {
        let created = self.api.create(customer).await?;
        Ok(Some(created.id))
    }

    async fn update(&self, id: &str, update: &CustomerUpdate) -> Result<()> {
        self.api.update(id, update.clone()).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.api.delete(id).await
    }

    async fn search(&self, query: &str) -> Result<Vec<CustomerRow>> {
        let hits = self.api.search(query.trim()).await?;
        Ok(hits.iter().map(CustomerRow::from).collect())
    }
}

#[async_trait]
impl CustomerStore for DirectoryCustomerSource {
    fn name(&self) -> &'static str {
        "directory"
    }

    async fn add(&self, customer: &NewCustomer) -> Result<Option<String>> {
        customer.validate()?;
        self.client.add_customer(&trimmed(customer)).await?;
        tracing::info!(email = %customer.email.trim(), "Directory customer added");
        Ok(None)
    }

    async fn update(&self, id: &str, update: &CustomerUpdate) -> Result<()> {
        update.validate()?;
        self.client.update_customer(id, update).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client.delete_customer(id).await?;
        tracing::info!(id, "Directory customer deleted");
        Ok(())
    }

    /// The directory has no search endpoint; filters the full listing.
    async fn search(&self, query: &str) -> Result<Vec<CustomerRow>> {
        let rows = RowSource::fetch(self).await?;
        Ok(rows.into_iter().filter(|row| row_matches(row, query)).collect())
    }
}

/// Registered accounts, listed through the admin endpoint.
pub struct AdminUserSource {
    session: Arc<SessionStore>,
}

impl AdminUserSource {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl RowSource for AdminUserSource {
    type Row = CustomerRow;

    fn name(&self) -> &'static str {
        "admin-users"
    }

    async fn fetch(&self) -> Result<Vec<CustomerRow>> {
        let users = self.session.list_users().await?;
        Ok(users.iter().map(CustomerRow::from).collect())
    }
}

// ============================================================================
// Enrichment
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActivityStatus {
    Active,
    Inactive,
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            ActivityStatus::Active => "Active",
            ActivityStatus::Inactive => "Inactive",
        })
    }
}

/// Extra per-customer data shown once enrichment resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowExtra {
    pub score: u8,
    pub status: ActivityStatus,
    pub last_activity: String,
}

/// Simulated activity lookup. Values are derived from the row id, so the
/// same customer always gets the same answer.
pub struct ActivityEnricher {
    latency: Latency,
}

impl ActivityEnricher {
    pub fn new(latency: Latency) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl Enricher<CustomerRow> for ActivityEnricher {
    type Output = RowExtra;

    async fn enrich(&self, row: &CustomerRow) -> Result<RowExtra> {
        let delay = self.latency.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut hasher = DefaultHasher::new();
        row.id.hash(&mut hasher);
        let mut rng = fastrand::Rng::with_seed(hasher.finish());

        let days_ago = rng.i64(0..30);
        let last_activity = (Utc::now() - ChronoDuration::days(days_ago))
            .date_naive()
            .to_string();
        Ok(RowExtra {
            score: rng.u8(50..=100),
            status: if row.active {
                ActivityStatus::Active
            } else {
                ActivityStatus::Inactive
            },
            last_activity,
        })
    }
}
