//! HTTP transport for the profile orchestrator.

pub mod error;
pub mod pidfile;
pub mod routes;
pub mod server;

pub use routes::{AppState, router};
pub use server::serve;
