//! Observability: structured logging via `tracing`.
//!
//! The library itself only emits events (`tracing::debug!`/`trace!`); a
//! subscriber is installed by the binary through [`init_tracing`].

#[cfg(feature = "cli")]
mod tracing_init;

#[cfg(feature = "cli")]
pub use tracing_init::*;
