//! lb-core: stable foundation for lcablocks.
//!
//! Contains:
//! - numeric (Real, finiteness check, loop-factor guard, dot product)
//! - ids (compact entity IDs and library identifiers)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use numeric::*;
