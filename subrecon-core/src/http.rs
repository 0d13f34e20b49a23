//! Shared HTTP client construction.

pub use reqwest::Client;
use reqwest::ClientBuilder;

use crate::config::EngineConfig;

/// Builds the client shared by every API runner: one connection pool, with
/// the request and connect ceilings from the engine configuration and the
/// engine user agent on every request.
pub fn build_client(config: &EngineConfig) -> Client {
    ClientBuilder::new()
        .user_agent(config.user_agent.clone())
        .timeout(config.task_timeout())
        .connect_timeout(config.connect_timeout())
        .build()
        .unwrap_or_else(|_| Client::new())
}
