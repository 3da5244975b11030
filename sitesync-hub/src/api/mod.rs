//! HTTP API handlers for sitesync-hub

pub mod auth;
pub mod health;
pub mod sites;

pub use auth::session_middleware;
pub use health::health_routes;
pub use sites::{create_site, get_materials, list_sites};
