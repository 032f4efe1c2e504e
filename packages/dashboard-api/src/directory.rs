//! Client for the customer directory service.
//!
//! The directory answers every call with `{ success, customers?, error? }`.
//! A `success: false` envelope is reported as [`ApiError::Api`] so callers
//! see one error path for transport and application failures.

use serde::Serialize;

use crate::error::{ApiError, Result};
use crate::error_from;
use crate::types::{DirectoryCustomer, DirectoryEnvelope};

pub const DEFAULT_DIRECTORY_URL: &str = "http://localhost:8080/api";

#[derive(Debug, Clone)]
pub struct DirectoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl DirectoryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_customers(&self) -> Result<Vec<DirectoryCustomer>> {
        let url = format!("{}/customers", self.base_url);
        tracing::debug!(%url, "Fetching directory customers");

        let envelope = self.send(self.client.get(&url)).await?;
        Ok(envelope.customers.unwrap_or_default())
    }

    pub async fn add_customer<T: Serialize + ?Sized>(&self, customer: &T) -> Result<()> {
        let url = format!("{}/customers", self.base_url);
        tracing::debug!(%url, "Adding directory customer");
        self.send(self.client.post(&url).json(customer)).await?;
        Ok(())
    }

    pub async fn update_customer<T: Serialize + ?Sized>(
        &self,
        customer_id: &str,
        updates: &T,
    ) -> Result<()> {
        let url = format!("{}/customers/{}", self.base_url, customer_id);
        self.send(self.client.put(&url).json(updates)).await?;
        Ok(())
    }

    pub async fn delete_customer(&self, customer_id: &str) -> Result<()> {
        let url = format!("{}/customers/{}", self.base_url, customer_id);
        tracing::debug!(%url, "Deleting directory customer");
        self.send(self.client.delete(&url)).await?;
        Ok(())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<DirectoryEnvelope> {
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(error_from(resp).await);
        }

        let envelope: DirectoryEnvelope = resp.json().await?;
        if !envelope.success {
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: envelope
                    .error
                    .unwrap_or_else(|| "directory request failed".to_string()),
            });
        }
        Ok(envelope)
    }
}
