//! Go resource-disposal leak analyzer
//!
//! Loads a GOPATH-style source tree, type-checks it against built-in stubs of
//! the standard library and reports values of disposable types (anything
//! implementing `io.Closer`) that are never closed.

pub mod closecheck;
pub mod config;
pub mod dependency_graph;
pub mod error_codes;
pub mod loader;
pub mod logging;
pub mod types;

pub use closecheck::{analyze, check, summarize, DisposerFact, FactError, FactStore, Finding};
pub use config::{Config, ConfigError, OutputFormat};
pub use loader::{load, load_tree, LoadError, Program, SourceTree};
