pub mod csv;
pub mod gateway;
pub mod guard;
pub mod rest;
pub mod session;
pub mod types;

pub use csv::CsvGateway;
pub use gateway::AuthGateway;
pub use guard::{decide, decide_for, GuardDecision, RouteRequirements};
pub use rest::RestGateway;
pub use session::{SessionHandle, SessionState, SessionStore};
pub use types::{Authenticated, Credentials, Role, Session, UserRecord};
