//! Inference Relay Library
//!
//! A request-serializing proxy in front of a remote text-generation endpoint.

pub mod admin;
pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod upstream;

pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
