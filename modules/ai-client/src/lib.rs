//! Client for the LLM collaborators the pipeline treats as opaque
//! JSON-returning services: ToS discovery, ToS evaluation, and metadata profiling.
//!
//! The crate deliberately exposes one provider (Claude) rather than the
//! multi-provider agent framework this was distilled from — the pipeline
//! never needs to swap providers mid-run, only to call one with a typed
//! schema and get typed JSON back.

pub mod claude;
pub mod schema;
pub mod util;

pub use claude::Claude;
pub use schema::StructuredOutput;
