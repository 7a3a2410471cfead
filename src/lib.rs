//! grid-intensity - Carbon intensity of electricity grids
//!
//! Fetches carbon intensity from several providers and aggregates many
//! regions concurrently, on demand or behind a Prometheus `/metrics`
//! endpoint. Rate-limited providers keep their responses in a TTL cache
//! that can be shared between processes through a locked file.

pub mod aggregate;
pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod exporter;
pub mod provider;
pub mod ui;

pub use aggregate::{get_carbon_intensity_map, CarbonMap};
pub use cache::{CacheConfig, CacheStore};
pub use context::Context;
pub use error::{GridError, GridResult};
pub use exporter::Exporter;
pub use provider::{Provider, ProviderKind};
