//! Background generation pipelines.
//!
//! Each pipeline owns its job record from the moment it runs until it writes
//! a terminal status. `run` entry points never return errors; failures are
//! recorded on the job record instead.

pub mod meta_summary;
pub mod recommend;
pub mod role_mapping;
pub mod summarize;

use cbp_core::Error;

/// Text persisted on a job record when a pipeline fails. Contract messages
/// (`Job`, `Embedding`) travel bare, without the display prefix of the
/// error variant; everything else keeps its display form.
pub(crate) fn failure_message(e: &Error) -> String {
    match e {
        Error::Job(msg) | Error::Embedding(msg) => msg.clone(),
        other => other.to_string(),
    }
}
