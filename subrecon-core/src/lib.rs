//! Core engine for subrecon.
//!
//! The engine fans a target domain out to a set of discovery sources
//! (external command-line tools and passive HTTP APIs), validates and
//! deduplicates what they return, and caches the per-target result on disk
//! with integrity checks. Front ends plug in through two narrow seams: the
//! [`progress::ProgressSink`] callback and the [`orchestrator::TargetReport`]
//! value handed back per target.

pub mod cache;
pub mod config;
pub mod http;
pub mod orchestrator;
pub mod progress;
pub mod runner;
pub mod sources;
pub mod validator;

/// Engine version baked into the user agent and the cache key.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub use orchestrator::TargetReport;
pub use progress::{NullSink, ProgressSink, SourceStatus};
pub use sources::{LoadOptions, SourceDescriptor};
pub use validator::Target;
