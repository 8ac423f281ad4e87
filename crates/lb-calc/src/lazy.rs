//! Provider that solves one column of the inverse at a time.

use std::fmt;
use std::sync::Arc;

use lb_core::{Real, ensure_finite};
use lb_index::{EnviIndex, ImpactIndex, TechIndex};
use lb_matrix::{Matrix, MatrixBundle};
use lb_solver::MatrixSolver;

use crate::cache::{Memo, SlotCache};
use crate::error::CalcResult;
use crate::provider::Solved;

/// Results for systems too large to invert; columns of the inverse are
/// solved on first use and kept.
pub struct LazyProvider {
    bundle: MatrixBundle,
    solver: Arc<dyn MatrixSolver>,
    solutions: SlotCache<Vec<Real>>,
    scaling: Vec<Real>,
    memo: Memo,
}

impl LazyProvider {
    pub fn solve(bundle: MatrixBundle, solver: Arc<dyn MatrixSolver>) -> CalcResult<Self> {
        let demand = bundle.demand();
        let scaling = solver
            .solve(&bundle.tech_matrix, demand.position, demand.amount)?
            .into_iter()
            .map(|v| ensure_finite(v, "scaling vector"))
            .collect::<Result<Vec<_>, _>>()?;
        let n = bundle.tech_index.size();
        tracing::debug!(size = n, solver = solver.name(), "solved scaling vector");
        Ok(Self {
            bundle,
            solver,
            solutions: SlotCache::new(n),
            scaling,
            memo: Memo::new(n),
        })
    }

    pub fn bundle(&self) -> &MatrixBundle {
        &self.bundle
    }

    /// Number of inverse columns solved so far.
    pub fn solved_columns(&self) -> usize {
        (0..self.solutions.len())
            .filter(|&j| self.solutions.is_present(j))
            .count()
    }
}

impl fmt::Debug for LazyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyProvider")
            .field("size", &self.bundle.tech_index.size())
            .field("solver", &self.solver.name())
            .field("solved_columns", &self.solved_columns())
            .finish()
    }
}

impl Solved for LazyProvider {
    fn memo(&self) -> &Memo {
        &self.memo
    }

    fn tech_index(&self) -> &TechIndex {
        &self.bundle.tech_index
    }

    fn envi_index(&self) -> Option<&EnviIndex> {
        self.bundle.envi_index.as_ref()
    }

    fn impact_index(&self) -> Option<&ImpactIndex> {
        self.bundle.impact_index.as_ref()
    }

    fn impact_matrix(&self) -> Option<&Matrix> {
        self.bundle.impact_matrix.as_ref()
    }

    fn costs(&self) -> Option<&[Real]> {
        self.bundle.costs.as_deref()
    }

    fn scaling_vector(&self) -> &[Real] {
        &self.scaling
    }

    fn solution_of_one(&self, product: usize) -> CalcResult<&[Real]> {
        let column = self.solutions.get_or_try_init(product, || {
            Ok(self.solver.solve(&self.bundle.tech_matrix, product, 1.0)?)
        })?;
        Ok(column.as_slice())
    }

    fn column_of_a(&self, product: usize) -> CalcResult<Vec<Real>> {
        self.check_product(product)?;
        Ok(self.bundle.tech_matrix.column(product))
    }

    fn diagonal_of_a(&self) -> CalcResult<Vec<Real>> {
        Ok(self.bundle.tech_matrix.diagonal())
    }

    fn column_of_b(&self, product: usize) -> CalcResult<Option<Vec<Real>>> {
        self.check_product(product)?;
        Ok(self.bundle.envi_matrix.as_ref().map(|b| b.column(product)))
    }

    fn flows_of(&self, activity: &[Real]) -> CalcResult<Option<Vec<Real>>> {
        Ok(self.bundle.envi_matrix.as_ref().map(|b| b.mul_vec(activity)))
    }
}
