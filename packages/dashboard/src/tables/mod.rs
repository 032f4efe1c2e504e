//! Data tables: the fetch-merge-select cycle shared by the customer, user and
//! feedback lists.
//!
//! Every source normalizes its records into one strict row type at the
//! boundary; [`TableReconciler`] never sees raw backend shapes.

pub mod customers;
pub mod reconciler;
pub mod selection;

use async_trait::async_trait;

use crate::error::Result;

pub use customers::{
    ActivityEnricher, AdminUserSource, CustomerRow, CustomerStore, DirectoryCustomerSource,
    MockCustomerSource, RowExtra,
};
pub use reconciler::{EnrichmentUpdate, Enricher, LoadOutcome, TableReconciler, TableSnapshot};
pub use selection::Selection;

/// Row id, unique within one table instance.
pub type RowId = String;

pub trait TableRow: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
}

/// Where a table's rows come from.
#[async_trait]
pub trait RowSource: Send + Sync {
    type Row: TableRow;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn fetch(&self) -> Result<Vec<Self::Row>>;
}
