//! lb-calc: solving technology systems, with and without libraries.
//!
//! A [`MatrixBundle`](lb_matrix::MatrixBundle) whose technology index only
//! holds foreground products is solved directly, by a dense inverse or by
//! solving inverse columns on demand. Bundles that reference library
//! products are linked with every library they reach; the result is then
//! either composed column by column from stored library inverses, or
//! assembled by block inversion.

pub mod blocks;
pub mod cache;
pub mod calculator;
pub mod dense;
pub mod error;
pub mod lazy;
pub mod library;
pub mod link;
pub mod provider;

pub use blocks::BlockInversion;
pub use cache::SlotCache;
pub use calculator::{CalculationConfig, ContributionResult, LcaCalculator, SimpleResult};
pub use dense::DenseProvider;
pub use error::{CalcError, CalcResult};
pub use lazy::LazyProvider;
pub use library::LibraryProvider;
pub use link::LinkedSystem;
pub use provider::SolutionProvider;
