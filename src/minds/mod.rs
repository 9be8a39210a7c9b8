// src/minds/mod.rs

pub mod client;
pub mod completion;
pub mod config;
pub mod datasources;
pub mod error;
pub mod http_client_pool;
pub mod http_transport;
pub mod manager;
pub mod mind;
pub mod transport;

// Export the handle and managers here so callers can write minds_sdk::minds::Mind
// instead of minds_sdk::minds::mind::Mind
pub use client::Client;
pub use datasources::{DatabaseConfig, Datasource, DatasourceRef, Datasources};
pub use manager::Minds;
pub use mind::{CreateMindOptions, Mind, Patch, UpdateMindOptions};
