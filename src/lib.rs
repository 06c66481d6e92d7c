pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliArgs;
pub use config::ServerConfig;

pub use adapters::http::{build_router, serve, start_server, AppState};
pub use adapters::llm::{OllamaClient, RetryPolicy};
pub use adapters::storage::LocalStorage;
pub use core::pipeline::TicketPipeline;
pub use utils::error::{Result, TicketError};
