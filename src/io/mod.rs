//! Input/output helpers.
//!
//! - CSV and workbook sheet loading (`sheet`)
//! - harmonized-table CSV export (`export`)
//! - trained model JSON read/write (`model_file`)

pub mod export;
pub mod model_file;
pub mod sheet;

pub use export::*;
pub use model_file::*;
pub use sheet::*;
