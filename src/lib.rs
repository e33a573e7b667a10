pub mod config;
pub mod http;

pub use config::ClientConfig;
pub use http::{HttpPostClient, IntegrationError, PostClient, PostResponse};
