//! # Minds SDK
//!
//! A Rust client for the hosted Minds service: conversational agents ("Minds") that answer
//! questions over your own databases ("datasources").
//!
//! The crate provides:
//!
//! * **Datasource management**: [`Datasources`] creates, lists, fetches and drops
//!   datasources described by a [`DatabaseConfig`]
//! * **Mind management**: [`Minds`] creates (optionally replacing), lists, fetches and drops
//!   Minds, creating inline datasources on the way
//! * **Mind handles**: [`Mind`] applies partial updates, attaches and detaches datasources
//!   and runs completions
//! * **Completions**: buffered answers or a pull-based [`CompletionStream`] of chunks
//! * **Pluggable transport**: [`transport::Transport`] is the only thing that touches the
//!   network; [`Client::with_transport`] accepts any implementation
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use minds_sdk::{Client, CreateMindOptions, DatabaseConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     minds_sdk::init_logger();
//!
//!     let client = Client::new(&std::env::var("MINDSDB_API_KEY")?)?;
//!
//!     let postgres = DatabaseConfig::new("my_datasource", "postgres")
//!         .with_description("House sales data")
//!         .with_connection("user", "demo_user")
//!         .with_connection("password", "demo_password")
//!         .with_connection("host", "samples.mindsdb.com")
//!         .with_connection("port", "5432")
//!         .with_connection("database", "demo")
//!         .with_connection("schema", "demo_data");
//!
//!     let mind = client
//!         .minds
//!         .create(
//!             "mind_name",
//!             Some(CreateMindOptions::new().with_datasource(postgres)),
//!             true,
//!         )
//!         .await?;
//!
//!     println!("{}", mind.completion("How many houses were sold in 2023?").await?);
//!
//!     let mut stream = mind.completion_stream("And in 2022?").await?;
//!     while let Some(chunk) = stream.next().await {
//!         print!("{}", chunk?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! Every operation returns [`MindsError`]. Input problems are caught before any request is
//! sent ([`MindsError::Validation`]); server answers map onto `NotFound`, `AlreadyExists` or
//! `RemoteService`; a completion stream that breaks off yields `StreamInterrupted`. Nothing
//! is retried automatically.
//!
//! ## Partial state
//!
//! [`Minds::create`] and [`Mind::update`] create inline datasources before touching the
//! Mind. When the Mind call then fails, those datasources remain; remove them with
//! [`Datasources::drop`] if needed.

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Applications embedding the SDK can opt in to `RUST_LOG` driven diagnostics
/// (`RUST_LOG=minds_sdk=debug` logs every request) without choosing a logging backend
/// upfront.
///
/// ```rust
/// minds_sdk::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::try_init();
    });
}

// Import the top-level `minds` module.
pub mod minds;

// Re-exporting key items for easier external access.
pub use minds::client::Client;
pub use minds::completion;
pub use minds::completion::{CompletionOutput, CompletionStream};
pub use minds::config::ClientConfig;
pub use minds::datasources::{DatabaseConfig, Datasource, DatasourceRef, Datasources};
pub use minds::error::{MindsError, ResourceKind, Result};
pub use minds::manager::Minds;
pub use minds::mind::{CreateMindOptions, Mind, Patch, UpdateMindOptions};
pub use minds::transport;
pub use minds::http_transport::HttpTransport;
