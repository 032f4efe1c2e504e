//! Simulated customer backend.
//!
//! Holds a small seeded customer list in memory and answers with a random
//! delay from the configured latency window. A configurable share of list
//! calls fail, so loading and error states can be exercised.

use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::Latency;
use crate::error::{DashboardError, Result};
use crate::validation::{is_valid_email, NewCustomer, ValidationErrors};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub location: String,
    pub orders: u32,
    pub last_order: Option<String>,
    pub spent: f64,
    pub refunds: u32,
    pub avatar: Option<String>,
    pub status: CustomerStatus,
    pub join_date: NaiveDate,
}

/// One page of customers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerPage {
    pub data: Vec<Customer>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

impl FromStr for CustomerStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(CustomerStatus::Active),
            "inactive" => Ok(CustomerStatus::Inactive),
            other => Err(format!("unknown customer status '{other}' (expected active or inactive)")),
        }
    }
}

/// Partial update; `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CustomerStatus>,
}

impl CustomerUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.location.is_none() && self.status.is_none()
    }

    /// Fields that are set must be usable; at least one must be set.
    pub fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.is_empty() {
            errors.add("update", "Nothing to update");
        }
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            errors.add("name", "Name is required");
        }
        if matches!(&self.email, Some(email) if !is_valid_email(email.trim())) {
            errors.add("email", "Email is invalid");
        }
        if matches!(&self.location, Some(location) if location.trim().is_empty()) {
            errors.add("location", "Location is required");
        }
        errors.into_result()
    }
}

fn seed(
    id: &str,
    name: &str,
    email: &str,
    location: &str,
    (orders, last_order, spent, refunds): (u32, &str, f64, u32),
    status: CustomerStatus,
    (y, m, d): (i32, u32, u32),
) -> Customer {
    Customer {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        location: location.to_string(),
        orders,
        last_order: Some(last_order.to_string()),
        spent,
        refunds,
        avatar: None,
        status,
        join_date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
    }
}

pub fn seed_customers() -> Vec<Customer> {
    use CustomerStatus::*;
    vec![
        seed("1", "Patricia Semklo", "patricia.semklo@app.com", "🇬🇧 London, UK",
            (24, "#123567", 2890.66, 0), Active, (2023, 1, 15)),
        seed("2", "Dominik Lamakani", "dominik.lamakani@gmail.com", "🇩🇪 Dortmund, DE",
            (77, "#779912", 14767.04, 4), Active, (2022, 8, 22)),
        seed("3", "Ivan Mesaros", "imivanmes@gmail.com", "🇫🇷 Paris, FR",
            (44, "#889924", 4996.00, 1), Active, (2023, 3, 10)),
        seed("4", "Maria Martinez", "martinezhome@gmail.com", "🇮🇹 Bologna, IT",
            (29, "#897726", 3220.66, 2), Inactive, (2023, 5, 18)),
        seed("5", "Vicky Jung", "itsvicky@contact.com", "🇬🇧 London, UK",
            (22, "#123567", 2890.66, 0), Active, (2023, 7, 2)),
    ]
}

pub struct MockCustomerApi {
    customers: RwLock<Vec<Customer>>,
    latency: Latency,
    failure_rate: f64,
}

impl MockCustomerApi {
    pub fn new(latency: Latency, failure_rate: f64) -> Self {
        Self::with_customers(seed_customers(), latency, failure_rate)
    }

    pub fn with_customers(customers: Vec<Customer>, latency: Latency, failure_rate: f64) -> Self {
        Self {
            customers: RwLock::new(customers),
            latency,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    async fn delay(&self) {
        let delay = self.latency.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// `page` is 1-based.
    pub async fn list(&self, page: usize, limit: usize) -> Result<CustomerPage> {
        self.delay().await;
        if self.failure_rate > 0.0 && fastrand::f64() < self.failure_rate {
            return Err(DashboardError::Network("Failed to fetch customers".to_string()));
        }

        let page = page.max(1);
        let limit = limit.max(1);
        let customers = self.customers.read().await;
        let data = customers
            .iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .cloned()
            .collect();
        Ok(CustomerPage {
            data,
            total: customers.len(),
            page,
            limit,
        })
    }

    pub async fn get(&self, id: &str) -> Result<Customer> {
        self.delay().await;
        self.customers
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| DashboardError::NotFound("Customer not found".to_string()))
    }

    pub async fn create(&self, customer: &NewCustomer) -> Result<Customer> {
        customer.validate()?;
        self.delay().await;

        let created = Customer {
            id: Uuid::new_v4().to_string(),
            name: customer.name.trim().to_string(),
            email: customer.email.trim().to_string(),
            location: customer.location.trim().to_string(),
            orders: 0,
            last_order: None,
            spent: 0.0,
            refunds: 0,
            avatar: None,
            status: CustomerStatus::Active,
            join_date: Utc::now().date_naive(),
        };
        self.customers.write().await.push(created.clone());
        tracing::debug!(id = %created.id, "Mock customer created");
        Ok(created)
    }

    pub async fn update(&self, id: &str, update: CustomerUpdate) -> Result<Customer> {
        update.validate()?;
        self.delay().await;
        let mut customers = self.customers.write().await;
        let customer = customers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| DashboardError::NotFound("Customer not found".to_string()))?;

        if let Some(name) = update.name {
            customer.name = name.trim().to_string();
        }
        if let Some(email) = update.email {
            customer.email = email.trim().to_string();
        }
        if let Some(location) = update.location {
            customer.location = location.trim().to_string();
        }
        if let Some(status) = update.status {
            customer.status = status;
        }
        Ok(customer.clone())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.delay().await;
        let mut customers = self.customers.write().await;
        let index = customers
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| DashboardError::NotFound("Customer not found".to_string()))?;
        customers.remove(index);
        Ok(())
    }

    /// Case-insensitive match on name, email or location.
    pub async fn search(&self, query: &str) -> Result<Vec<Customer>> {
        self.delay().await;
        let query = query.to_lowercase();
        Ok(self
            .customers
            .read()
            .await
            .iter()
            .filter(|c| {
                c.name.to_lowercase().contains(&query)
                    || c.email.to_lowercase().contains(&query)
                    || c.location.to_lowercase().contains(&query)
            })
            .cloned()
            .collect())
    }
}
