//! Provider over a fully materialized inverse.

use lb_core::{CoreError, Real, ensure_finite};
use lb_index::{EnviIndex, ImpactIndex, TechIndex};
use lb_matrix::matrix::dense_column;
use lb_matrix::{Matrix, MatrixBundle};
use lb_solver::MatrixSolver;
use nalgebra::DMatrix;

use crate::cache::Memo;
use crate::error::CalcResult;
use crate::provider::Solved;

/// Results backed by the complete inverse of the technology matrix, and
/// optionally by the intensity matrix `M = B * INV`.
#[derive(Debug)]
pub struct DenseProvider {
    bundle: MatrixBundle,
    inverse: DMatrix<Real>,
    intensities: Option<DMatrix<Real>>,
    scaling: Vec<Real>,
    memo: Memo,
}

impl DenseProvider {
    /// Invert the technology matrix of `bundle`.
    pub fn solve(bundle: MatrixBundle, solver: &dyn MatrixSolver) -> CalcResult<Self> {
        let inverse = solver.invert(&bundle.tech_matrix)?;
        tracing::debug!(
            size = inverse.nrows(),
            solver = solver.name(),
            "inverted technology matrix"
        );
        Self::from_inverse(bundle, inverse)
    }

    /// Use an inverse computed elsewhere.
    pub fn from_inverse(bundle: MatrixBundle, inverse: DMatrix<Real>) -> CalcResult<Self> {
        let n = bundle.tech_index.size();
        let shape = (inverse.nrows(), inverse.ncols());
        if shape != (n, n) {
            return Err(CoreError::shape("inverse", (n, n), shape).into());
        }
        let demand = bundle.demand();
        let scaling = dense_column(&inverse, demand.position)
            .iter()
            .map(|v| ensure_finite(v * demand.amount, "scaling vector"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            memo: Memo::new(n),
            bundle,
            inverse,
            intensities: None,
            scaling,
        })
    }

    /// Attach a precomputed intensity matrix.
    pub fn with_intensities(mut self, intensities: DMatrix<Real>) -> CalcResult<Self> {
        let rows = self.bundle.envi_index.as_ref().map_or(0, |e| e.size());
        let expected = (rows, self.bundle.tech_index.size());
        let shape = (intensities.nrows(), intensities.ncols());
        if shape != expected {
            return Err(CoreError::shape("intensity matrix", expected, shape).into());
        }
        self.intensities = Some(intensities);
        Ok(self)
    }

    pub fn bundle(&self) -> &MatrixBundle {
        &self.bundle
    }

    pub fn inverse(&self) -> &DMatrix<Real> {
        &self.inverse
    }

    pub fn intensities(&self) -> Option<&DMatrix<Real>> {
        self.intensities.as_ref()
    }
}

impl Solved for DenseProvider {
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
        self.check_product(product)?;
        Ok(dense_column(&self.inverse, product))
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

    fn intensities_of_one(&self, product: usize) -> CalcResult<Option<Vec<Real>>> {
        match &self.intensities {
            Some(m) => {
                self.check_product(product)?;
                Ok(Some(dense_column(m, product).to_vec()))
            }
            None => self.flows_of(self.solution_of_one(product)?),
        }
    }
}
