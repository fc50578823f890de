// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod collect;
pub mod config;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod registry;
pub mod retention;
pub mod scheduler;
pub mod store;
pub mod trending;
pub mod upsert;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::PipelineConfig;
pub use crate::pipeline::Pipeline;
pub use crate::scheduler::{RunSummary, Schedule, Scheduler, TickOutcome};
pub use crate::store::Store;
