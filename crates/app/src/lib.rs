pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod pipeline;

pub use commands::AppState;
pub use config::AppConfig;
pub use error::AppError;
pub use pipeline::{import_statement, rematch_stored, ImportSummary};
