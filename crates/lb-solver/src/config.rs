//! Solver configuration.

use lb_core::Real;

/// Solver selection and iteration settings.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Matrices with a density at or below this value count as sparse.
    pub sparse_threshold: Real,
    /// Systems smaller than this are always solved densely.
    pub min_sparse_size: usize,
    /// Relative residual tolerance of the iterative solver.
    pub tolerance: Real,
    /// Maximum iterations of the iterative solver.
    pub max_iterations: usize,
    /// Retry with dense LU when the iterative solver does not converge;
    /// otherwise the solve fails with `NotConverged`.
    pub lu_fallback: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            sparse_threshold: 0.25,
            min_sparse_size: 100,
            tolerance: 1e-12,
            max_iterations: 1000,
            lu_fallback: true,
        }
    }
}
