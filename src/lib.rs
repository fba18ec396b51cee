//! `country-stats` library crate.
//!
//! The binary (`cstats`) is a thin wrapper around this library so that:
//!
//! - the pipeline is testable without spawning processes
//! - a future HTTP front end can call the same operations as the CLI

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod frame;
pub mod harmonize;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod sources;
