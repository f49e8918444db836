//! Core domain types for the dashboard backend.

pub mod ids;
pub mod installation;
pub mod user;

pub use ids::{DeliveryId, InstallationId, Login};
pub use installation::{AccountType, GithubRepo, InstallationRecord, RepositorySelection};
pub use user::UserRecord;
