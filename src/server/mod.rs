//! HTTP surface — REST endpoints for triggering and polling refreshes,
//! plus the public events/teams API.

pub mod auth;
pub mod routes;

pub use routes::{AppState, api_routes};
