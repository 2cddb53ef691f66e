//! Pipeline steps bundled with the mediator.

#[cfg(feature = "logging")]
mod logging;

#[cfg(feature = "logging")]
pub use logging::*;

#[cfg(feature = "validation")]
mod validation;

#[cfg(feature = "validation")]
pub use validation::*;
