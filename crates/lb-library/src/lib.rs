//! lb-library: read-only, file-backed libraries of precomputed matrix blocks.
//!
//! A library folder holds `library.json`, its indices (`index_A/B/C`, binary
//! and CSV) and any of the matrices `A`, `B`, `C`, `INV`, `M` plus a cost
//! vector. Indices store reference ids and are resolved against an
//! [`EntityStore`] before use.
//!
//! The folder layout follows the usual LCA library layout, but the binary
//! index encoding does not: indices are bincode files named
//! `index_X.bincode`, where other tools write protobuf `index_X.bin`. In a
//! folder written by such a tool the indices read as absent instead of
//! failing to parse; [`items::rebuild_bin_from_csv`] rebuilds them from
//! CSV twins in our column layout.

pub mod dir;
pub mod error;
pub mod export;
pub mod info;
pub mod items;
pub mod library;
pub mod resolve;
pub mod store;

pub use dir::LibraryDir;
pub use error::{LibraryError, LibraryResult};
pub use export::{LibraryExport, LibraryWriter};
pub use info::LibraryInfo;
pub use items::{IndexKind, LibEnviItem, LibImpactItem, LibTechItem};
pub use library::{LibMatrix, Library};
pub use resolve::dependency_order;
pub use store::{EntityStore, MemoryStore};
