//! lb-index: coordinate indices for lcablocks.
//!
//! Provides:
//! - Entity descriptors as delivered by an entity store
//! - Index keys for the technology, intervention and impact spaces
//! - Dense, bidirectional key <-> position maps (`MatrixIndex`)
//! - `TechIndex` with a reference product, a demand and library ownership
//!
//! # Example
//!
//! ```
//! use lb_core::Id;
//! use lb_index::{FlowDescriptor, ProcessDescriptor, TechFlow, TechIndex};
//!
//! let steel = TechFlow::of(
//!     ProcessDescriptor::new(Id::from_index(0), "p-steel", "steel production"),
//!     FlowDescriptor::new(Id::from_index(0), "f-steel", "steel"),
//! );
//! let mut index = TechIndex::new(steel.clone());
//! index.set_demand(10.0);
//!
//! assert_eq!(index.size(), 1);
//! assert_eq!(index.position(&steel), Some(0));
//! assert_eq!(index.demand(), 10.0);
//! ```

pub mod descriptor;
pub mod error;
pub mod indexing;
pub mod keys;
pub mod tech;

// Re-exports for ergonomics
pub use descriptor::{FlowDescriptor, ImpactDescriptor, LocationDescriptor, ProcessDescriptor};
pub use error::{IndexError, IndexResult};
pub use indexing::{ImpactIndex, MatrixIndex};
pub use keys::{EnviFlow, TechFlow};
pub use tech::{EnviIndex, LibraryRun, TechIndex};
