//! RunStab command-line driver.
//!
//! This crate provides:
//! - Environment configuration
//! - The job executor with progress logging and cancellation
//! - Saving finished videos to the library
//! - The `stabilize` and `preview` subcommands

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod library;
pub mod logging;

pub use config::WorkerConfig;
pub use error::{LibraryError, WorkerError, WorkerResult};
pub use executor::{JobExecutor, JobOutcome};
pub use library::{DirectoryLibrary, MediaLibrary};
pub use logging::JobLogger;
