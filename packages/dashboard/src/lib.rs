// Admin dashboard core
//
// Session lifecycle, route guarding and data tables for the admin dashboard.
// Backends (REST, CSV, mock, directory) are strategies picked by configuration;
// everything above them sees one normalized Session and one Row shape per table.

pub mod app;
pub mod auth;
pub mod changelog;
pub mod config;
pub mod error;
pub mod feedback;
pub mod mock_api;
pub mod routes;
pub mod storage;
pub mod tables;
pub mod validation;

pub use app::Dashboard;
pub use config::Config;
pub use error::{DashboardError, ErrorKind, Result};
