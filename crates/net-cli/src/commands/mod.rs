//! CLI commands

pub mod apply;
pub mod get;

pub use apply::ApplyCommand;
pub use get::{GetCommand, OutputFormat};
