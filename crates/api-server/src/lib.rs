#![warn(clippy::unwrap_used)]

pub mod rest;
pub mod server;
pub mod tenant;

pub use rest::{router, AppState};
pub use server::ApiServer;
pub use tenant::{Tenant, TenantResolver};
