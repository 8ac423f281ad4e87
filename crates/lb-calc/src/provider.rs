//! The query surface over a solved system.

use lb_core::{Real, dot, loop_factor};
use lb_index::{EnviIndex, ImpactIndex, TechIndex};
use lb_matrix::Matrix;

use crate::cache::Memo;
use crate::dense::DenseProvider;
use crate::error::{CalcError, CalcResult};
use crate::lazy::LazyProvider;
use crate::library::LibraryProvider;

/// Primitives each provider kind implements; everything derived from them
/// (totals, per-product intensities, contributions) is computed here once
/// and memoized in the provider's [`Memo`].
pub(crate) trait Solved {
    fn memo(&self) -> &Memo;
    fn tech_index(&self) -> &TechIndex;
    fn envi_index(&self) -> Option<&EnviIndex>;
    fn impact_index(&self) -> Option<&ImpactIndex>;
    fn impact_matrix(&self) -> Option<&Matrix>;
    fn costs(&self) -> Option<&[Real]>;

    fn scaling_vector(&self) -> &[Real];

    /// Column `product` of the inverse.
    fn solution_of_one(&self, product: usize) -> CalcResult<&[Real]>;

    fn column_of_a(&self, product: usize) -> CalcResult<Vec<Real>>;
    fn diagonal_of_a(&self) -> CalcResult<Vec<Real>>;

    /// Column `product` of the intervention matrix.
    fn column_of_b(&self, product: usize) -> CalcResult<Option<Vec<Real>>>;

    /// `B * activity`.
    fn flows_of(&self, activity: &[Real]) -> CalcResult<Option<Vec<Real>>>;

    /// `B * INV[:, product]`.
    fn intensities_of_one(&self, product: usize) -> CalcResult<Option<Vec<Real>>> {
        let solution = self.solution_of_one(product)?;
        self.flows_of(solution)
    }

    fn check_product(&self, product: usize) -> CalcResult<()> {
        let size = self.tech_index().size();
        if product < size {
            Ok(())
        } else {
            Err(CalcError::UnknownProduct { position: product, size })
        }
    }

    fn value_of_a(&self, row: usize, col: usize) -> CalcResult<Real> {
        self.check_product(row)?;
        Ok(self.column_of_a(col)?[row])
    }

    fn scaled_value_of_a(&self, row: usize, col: usize) -> CalcResult<Real> {
        Ok(self.value_of_a(row, col)? * self.scaling_vector()[col])
    }

    /// `s .* diag(A)`.
    fn total_requirements(&self) -> CalcResult<&[Real]> {
        let v = self.memo().total_requirements.get_or_try_init(|| {
            let diagonal = self.diagonal_of_a()?;
            Ok::<_, CalcError>(
                diagonal
                    .iter()
                    .zip(self.scaling_vector())
                    .map(|(a, s)| a * s)
                    .collect(),
            )
        })?;
        Ok(v.as_slice())
    }

    fn loop_factor_of(&self, product: usize) -> CalcResult<Real> {
        let a_ii = self.value_of_a(product, product)?;
        let s_ii = self.solution_of_one(product)?[product];
        Ok(loop_factor(a_ii, s_ii, 1.0))
    }

    fn has_flows(&self) -> bool {
        self.envi_index().is_some_and(|idx| !idx.is_empty())
    }

    fn total_flows(&self) -> CalcResult<Option<&[Real]>> {
        let v = self
            .memo()
            .total_flows
            .get_or_try_init(|| self.flows_of(self.scaling_vector()))?;
        Ok(v.as_deref())
    }

    fn total_flows_of_one(&self, product: usize) -> CalcResult<Option<&[Real]>> {
        let v = self
            .memo()
            .flows_of_one
            .get_or_try_init(product, || self.intensities_of_one(product))?;
        Ok(v.as_deref())
    }

    fn direct_flows_of(&self, product: usize) -> CalcResult<Option<Vec<Real>>> {
        self.check_product(product)?;
        let s = self.scaling_vector()[product];
        Ok(self
            .column_of_b(product)?
            .map(|col| col.into_iter().map(|v| v * s).collect()))
    }

    fn has_impacts(&self) -> bool {
        self.has_flows() && self.impact_matrix().is_some() && self.impact_index().is_some()
    }

    fn characterize(&self, flows: &[Real]) -> Option<Vec<Real>> {
        if !self.has_impacts() {
            return None;
        }
        self.impact_matrix().map(|c| c.mul_vec(flows))
    }

    fn total_impacts(&self) -> CalcResult<Option<&[Real]>> {
        let v = self.memo().total_impacts.get_or_try_init(|| {
            Ok::<_, CalcError>(self.total_flows()?.and_then(|g| self.characterize(g)))
        })?;
        Ok(v.as_deref())
    }

    fn total_impacts_of_one(&self, product: usize) -> CalcResult<Option<&[Real]>> {
        let v = self.memo().impacts_of_one.get_or_try_init(product, || {
            Ok(self
                .total_flows_of_one(product)?
                .and_then(|g| self.characterize(g)))
        })?;
        Ok(v.as_deref())
    }

    fn direct_impacts_of(&self, product: usize) -> CalcResult<Option<Vec<Real>>> {
        Ok(self
            .direct_flows_of(product)?
            .and_then(|g| self.characterize(&g)))
    }

    fn has_costs(&self) -> bool {
        self.costs().is_some()
    }

    fn total_costs(&self) -> CalcResult<Option<Real>> {
        let v = self
            .memo()
            .total_costs
            .get_or_init(|| self.costs().map(|c| dot(c, self.scaling_vector())));
        Ok(*v)
    }

    fn total_costs_of_one(&self, product: usize) -> CalcResult<Option<Real>> {
        let v = self.memo().costs_of_one.get_or_try_init(product, || {
            let Some(costs) = self.costs() else {
                return Ok(None);
            };
            Ok(Some(dot(costs, self.solution_of_one(product)?)))
        })?;
        Ok(*v)
    }

    fn direct_costs_of(&self, product: usize) -> CalcResult<Option<Real>> {
        self.check_product(product)?;
        Ok(self
            .costs()
            .map(|c| c[product] * self.scaling_vector()[product]))
    }
}

/// A solved system, one of the three provider kinds.
///
/// Providers are built for one demand and answer queries from then on;
/// results are memoized per instance. A provider is not meant to be shared
/// between threads while it fills its caches.
#[derive(Debug)]
pub enum SolutionProvider {
    Dense(DenseProvider),
    Lazy(LazyProvider),
    Library(LibraryProvider),
}

macro_rules! dispatch {
    ($self:ident, $p:ident => $e:expr) => {
        match $self {
            SolutionProvider::Dense($p) => $e,
            SolutionProvider::Lazy($p) => $e,
            SolutionProvider::Library($p) => $e,
        }
    };
}

impl SolutionProvider {
    pub fn name(&self) -> &'static str {
        match self {
            SolutionProvider::Dense(_) => "dense",
            SolutionProvider::Lazy(_) => "lazy",
            SolutionProvider::Library(_) => "library",
        }
    }

    pub fn tech_index(&self) -> &TechIndex {
        dispatch!(self, p => p.tech_index())
    }

    pub fn envi_index(&self) -> Option<&EnviIndex> {
        dispatch!(self, p => p.envi_index())
    }

    pub fn impact_index(&self) -> Option<&ImpactIndex> {
        dispatch!(self, p => p.impact_index())
    }

    pub fn demand(&self) -> Real {
        self.tech_index().demand()
    }

    pub fn scaling_vector(&self) -> &[Real] {
        dispatch!(self, p => p.scaling_vector())
    }

    pub fn total_requirements(&self) -> CalcResult<&[Real]> {
        dispatch!(self, p => p.total_requirements())
    }

    pub fn column_of_a(&self, product: usize) -> CalcResult<Vec<Real>> {
        dispatch!(self, p => { p.check_product(product)?; p.column_of_a(product) })
    }

    pub fn value_of_a(&self, row: usize, col: usize) -> CalcResult<Real> {
        dispatch!(self, p => { p.check_product(col)?; p.value_of_a(row, col) })
    }

    pub fn scaled_value_of_a(&self, row: usize, col: usize) -> CalcResult<Real> {
        dispatch!(self, p => { p.check_product(col)?; p.scaled_value_of_a(row, col) })
    }

    pub fn solution_of_one(&self, product: usize) -> CalcResult<&[Real]> {
        dispatch!(self, p => { p.check_product(product)?; p.solution_of_one(product) })
    }

    pub fn loop_factor_of(&self, product: usize) -> CalcResult<Real> {
        dispatch!(self, p => { p.check_product(product)?; p.loop_factor_of(product) })
    }

    pub fn has_flows(&self) -> bool {
        dispatch!(self, p => p.has_flows())
    }

    pub fn total_flows(&self) -> CalcResult<Option<&[Real]>> {
        dispatch!(self, p => p.total_flows())
    }

    /// Total flows per unit of `product`.
    pub fn total_flows_of_one(&self, product: usize) -> CalcResult<Option<&[Real]>> {
        dispatch!(self, p => { p.check_product(product)?; p.total_flows_of_one(product) })
    }

    pub fn total_flow_of_one(&self, flow: usize, product: usize) -> CalcResult<Option<Real>> {
        Ok(self
            .total_flows_of_one(product)?
            .and_then(|g| g.get(flow).copied()))
    }

    /// Flows of `product`'s own process at its scaled activity.
    pub fn direct_flows_of(&self, product: usize) -> CalcResult<Option<Vec<Real>>> {
        dispatch!(self, p => p.direct_flows_of(product))
    }

    pub fn has_impacts(&self) -> bool {
        dispatch!(self, p => p.has_impacts())
    }

    pub fn total_impacts(&self) -> CalcResult<Option<&[Real]>> {
        dispatch!(self, p => p.total_impacts())
    }

    pub fn total_impacts_of_one(&self, product: usize) -> CalcResult<Option<&[Real]>> {
        dispatch!(self, p => { p.check_product(product)?; p.total_impacts_of_one(product) })
    }

    pub fn total_impact_of_one(&self, impact: usize, product: usize) -> CalcResult<Option<Real>> {
        Ok(self
            .total_impacts_of_one(product)?
            .and_then(|h| h.get(impact).copied()))
    }

    pub fn direct_impacts_of(&self, product: usize) -> CalcResult<Option<Vec<Real>>> {
        dispatch!(self, p => p.direct_impacts_of(product))
    }

    pub fn has_costs(&self) -> bool {
        dispatch!(self, p => p.has_costs())
    }

    pub fn total_costs(&self) -> CalcResult<Option<Real>> {
        dispatch!(self, p => p.total_costs())
    }

    pub fn total_costs_of_one(&self, product: usize) -> CalcResult<Option<Real>> {
        dispatch!(self, p => { p.check_product(product)?; p.total_costs_of_one(product) })
    }

    pub fn direct_costs_of(&self, product: usize) -> CalcResult<Option<Real>> {
        dispatch!(self, p => p.direct_costs_of(product))
    }
}

impl From<DenseProvider> for SolutionProvider {
    fn from(p: DenseProvider) -> Self {
        SolutionProvider::Dense(p)
    }
}

impl From<LazyProvider> for SolutionProvider {
    fn from(p: LazyProvider) -> Self {
        SolutionProvider::Lazy(p)
    }
}

impl From<LibraryProvider> for SolutionProvider {
    fn from(p: LibraryProvider) -> Self {
        SolutionProvider::Library(p)
    }
}
