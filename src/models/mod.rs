//! Multi-output regression model.
//!
//! The pipeline is three explicit stages applied in order:
//! one-hot country encoding, standard scaling of the numeric features, and an
//! independent elastic net per label.

pub mod elastic_net;
pub mod encode;
pub mod trained;

pub use elastic_net::*;
pub use encode::*;
pub use trained::*;
