//! # cbp-jobs
//!
//! Background generation pipelines and the dispatcher that guards them.
//!
//! Every pipeline is keyed to a persisted job record: the dispatcher creates
//! (or finds) the record, applies the idempotency and in-flight guards, and
//! schedules the pipeline on a [`TaskSpawner`]. The pipeline owns the record
//! until it writes a terminal status; any error inside the pipeline body is
//! converted into a `FAILED` record rather than propagated.

pub mod context;
pub mod dispatcher;
pub mod pipelines;
pub mod prompts;
pub mod spawner;

#[cfg(test)]
pub(crate) mod testing;

pub use context::JobContext;
pub use dispatcher::{
    Dispatcher, MetaSummaryRequest, RecommendationDispatch, RoleMappingDispatch, SummaryDispatch,
};
pub use spawner::{QueueSpawner, TaskSpawner, TokioSpawner};
