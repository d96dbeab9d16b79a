//! Resource-disposal leak analysis
//!
//! Two passes over a loaded [`Program`](crate::loader::Program):
//!
//! 1. the [`summarizer`] decides which functions dispose the disposable
//!    values passed to them and records that in the [`FactStore`];
//! 2. the [`checker`] scans every function body and reports disposable
//!    values that are never closed, returned or handed to a disposer.
//!
//! [`driver`] runs both over whole programs.

pub mod checker;
pub mod classifier;
pub mod driver;
pub mod fact_store;
pub mod query;
pub mod sink;
pub mod summarizer;

pub use checker::AssignmentChecker;
pub use classifier::{Classifier, DisposableDescriptor, DisposalField};
pub use driver::{analyze, check, summarize, summarize_into};
pub use fact_store::{DisposerFact, FactError, FactStore};
pub use query::{AccessPath, PackageView};
pub use sink::{DiagnosticSink, Finding, FindingKind};
pub use summarizer::{Summarizer, SummaryReport};
