//! Numerical building blocks: least squares and label imputation.

pub mod impute;
pub mod ols;

pub use impute::IterativeImputer;
pub use ols::*;
