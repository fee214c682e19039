//! Core pipeline orchestration for dailydigest.
//!
//! This crate ties the cache and the fetcher together into the
//! progressive-enrichment workflow ([`DigestPipeline`]) and defines the
//! event sink consumers implement ([`DigestObserver`]).

pub mod events;
pub mod pipeline;

pub use events::{DigestObserver, SilentObserver};
pub use pipeline::DigestPipeline;
