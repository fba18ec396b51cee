//! Terminal reports for the `cstats` commands.

pub mod format;

pub use format::*;
