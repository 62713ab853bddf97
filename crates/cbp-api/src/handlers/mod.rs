//! HTTP handlers, grouped by resource.

pub mod documents;
pub mod meta_summaries;
pub mod recommendations;
pub mod role_mappings;
