//! Pipeline Supervisor, Freshness/Dedup Layer, and the durable-store
//! abstraction the Supervisor depends on.

pub mod context;
pub mod freshness;
pub mod store;
pub mod submission;
pub mod supervisor;

pub use context::PipelineContext;
pub use freshness::{should_skip_article_steps, should_skip_publisher_steps};
pub use store::{run_migrations, InMemoryStore, PgStore, Store};
pub use submission::{Submission, SubmissionError};
pub use supervisor::{PipelineError, Supervisor};
