//! jetkit library
//!
//! Option validation, config merging, webpack composition, lifecycle hooks
//! and hybrid asset patching behind the `jetkit` command.

pub mod bundler;
pub mod cli;
pub mod config;
pub mod hooks;
pub mod hybrid;
pub mod options;
pub mod pipeline;
pub mod server;
pub mod utils;
pub mod webpack;

pub use cli::Cli;
pub use config::Config;
pub use options::{validate, ResolvedOptions, ValidationError};
pub use pipeline::Pipeline;
