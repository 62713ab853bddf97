//! # cbp-core
//!
//! Core types, traits, and abstractions for the CBP (competency-based
//! planning) backend.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the other cbp crates depend on: job records and their
//! status machine, FRAC mapping types, the competency taxonomy dataset,
//! and the repository/backend/storage trait seams.

pub mod defaults;
pub mod error;
pub mod models;
pub mod taxonomy;
pub mod traits;

pub use error::{Error, Result};
pub use models::*;
pub use taxonomy::{CompetencyTaxonomy, TaxonomyTheme};
pub use traits::*;
