//! CLI command implementations

pub mod cache;
pub mod config;
pub mod exporter;
pub mod get;
pub mod provider;

pub use cache::execute as cache;
pub use config::execute as config;
pub use exporter::execute as exporter;
pub use get::execute as get;
pub use provider::execute as provider;
