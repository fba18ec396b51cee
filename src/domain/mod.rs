//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - join keys and per-source tables (`CountryYear`, `SourceTable`)
//! - row-drop auditing (`DropReason`, `DropReport`)
//! - the harmonized table and the model's request/response rows

pub mod types;

pub use types::*;
