//! HTTP client for the external habit metric provider.

pub mod client;
pub mod config;

pub use client::HttpMetricSource;
pub use config::ProviderConfig;
