//! The matrix bundle: input of one calculation.

use lb_core::{CoreError, Real};
use lb_index::{EnviIndex, ImpactIndex, TechIndex};

use crate::error::MatrixResult;
use crate::matrix::Matrix;

/// Reference position and demanded amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Demand {
    pub position: usize,
    pub amount: Real,
}

/// Technology, intervention and characterization data of one system.
///
/// Dimensions are checked on construction; every `with_*` step validates the
/// new part against the indices already present.
#[derive(Debug, Clone)]
pub struct MatrixBundle {
    pub tech_index: TechIndex,
    pub tech_matrix: Matrix,

    pub envi_index: Option<EnviIndex>,
    pub envi_matrix: Option<Matrix>,

    pub impact_index: Option<ImpactIndex>,
    pub impact_matrix: Option<Matrix>,

    /// Cost (or revenue, negative) per unit of each tech index entry.
    pub costs: Option<Vec<Real>>,
}

impl MatrixBundle {
    pub fn new(tech_index: TechIndex, tech_matrix: Matrix) -> MatrixResult<Self> {
        let n = tech_index.size();
        if tech_matrix.shape() != (n, n) {
            return Err(CoreError::shape("technology matrix", (n, n), tech_matrix.shape()).into());
        }
        Ok(Self {
            tech_index,
            tech_matrix,
            envi_index: None,
            envi_matrix: None,
            impact_index: None,
            impact_matrix: None,
            costs: None,
        })
    }

    pub fn with_interventions(
        mut self,
        envi_index: EnviIndex,
        envi_matrix: Matrix,
    ) -> MatrixResult<Self> {
        let expected = (envi_index.size(), self.tech_index.size());
        if envi_matrix.shape() != expected {
            return Err(CoreError::shape("intervention matrix", expected, envi_matrix.shape()).into());
        }
        self.envi_index = Some(envi_index);
        self.envi_matrix = Some(envi_matrix);
        Ok(self)
    }

    /// Requires interventions to be present.
    pub fn with_impacts(
        mut self,
        impact_index: ImpactIndex,
        impact_matrix: Matrix,
    ) -> MatrixResult<Self> {
        let flows = self.envi_index.as_ref().map_or(0, |idx| idx.size());
        let expected = (impact_index.size(), flows);
        if impact_matrix.shape() != expected {
            return Err(
                CoreError::shape("characterization matrix", expected, impact_matrix.shape()).into(),
            );
        }
        self.impact_index = Some(impact_index);
        self.impact_matrix = Some(impact_matrix);
        Ok(self)
    }

    pub fn with_costs(mut self, costs: Vec<Real>) -> MatrixResult<Self> {
        let n = self.tech_index.size();
        if costs.len() != n {
            return Err(CoreError::shape("cost vector", (1, n), (1, costs.len())).into());
        }
        self.costs = Some(costs);
        Ok(self)
    }

    pub fn demand(&self) -> Demand {
        Demand {
            position: self.tech_index.ref_position(),
            amount: self.tech_index.demand(),
        }
    }

    pub fn has_flows(&self) -> bool {
        self.envi_matrix.is_some() && self.envi_index.as_ref().is_some_and(|i| !i.is_empty())
    }

    pub fn has_impacts(&self) -> bool {
        self.has_flows() && self.impact_matrix.is_some()
    }

    pub fn has_costs(&self) -> bool {
        self.costs.is_some()
    }

    /// Re-check all dimensions.
    pub fn validate(&self) -> MatrixResult<()> {
        let n = self.tech_index.size();
        if self.tech_matrix.shape() != (n, n) {
            return Err(CoreError::shape("technology matrix", (n, n), self.tech_matrix.shape()).into());
        }
        let flows = self.envi_index.as_ref().map_or(0, |idx| idx.size());
        if let Some(b) = &self.envi_matrix
            && b.shape() != (flows, n)
        {
            return Err(CoreError::shape("intervention matrix", (flows, n), b.shape()).into());
        }
        if let Some(c) = &self.impact_matrix {
            let impacts = self.impact_index.as_ref().map_or(0, |idx| idx.size());
            if c.shape() != (impacts, flows) {
                return Err(
                    CoreError::shape("characterization matrix", (impacts, flows), c.shape()).into(),
                );
            }
        }
        if let Some(costs) = &self.costs
            && costs.len() != n
        {
            return Err(CoreError::shape("cost vector", (1, n), (1, costs.len())).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MatrixError;
    use lb_core::Id;
    use lb_index::{EnviFlow, FlowDescriptor, ProcessDescriptor, TechFlow};

    fn tech_index(n: u32) -> TechIndex {
        TechIndex::from_keys((0..n).map(|i| {
            TechFlow::of(
                ProcessDescriptor::new(Id::from_index(i), format!("p{i}"), "p"),
                FlowDescriptor::new(Id::from_index(i), format!("f{i}"), "f"),
            )
        }))
        .unwrap()
    }

    fn envi_index(m: u32) -> EnviIndex {
        let mut idx = EnviIndex::create();
        for i in 0..m {
            idx.add(EnviFlow::output_of(
                FlowDescriptor::new(Id::from_index(100 + i), format!("e{i}"), "e"),
                None,
            ));
        }
        idx
    }

    #[test]
    fn rejects_non_square_tech_matrix() {
        let err = MatrixBundle::new(tech_index(2), Matrix::zeros(2, 3)).unwrap_err();
        assert!(matches!(err, MatrixError::Dimension(_)));
        assert!(err.to_string().contains("2x2"));
    }

    #[test]
    fn rejects_misaligned_interventions() {
        let bundle = MatrixBundle::new(tech_index(2), Matrix::zeros(2, 2)).unwrap();
        assert!(
            bundle
                .clone()
                .with_interventions(envi_index(3), Matrix::zeros(3, 1))
                .is_err()
        );
        let bundle = bundle
            .with_interventions(envi_index(3), Matrix::zeros(3, 2))
            .unwrap();
        assert!(bundle.has_flows());
        assert!(bundle.clone().with_costs(vec![1.0]).is_err());
        assert!(bundle.with_costs(vec![1.0, 2.0]).unwrap().has_costs());
    }

    #[test]
    fn demand_descriptor() {
        let mut idx = tech_index(1);
        idx.set_demand(10.0);
        let bundle = MatrixBundle::new(idx, Matrix::from_rows(&[&[1.0]])).unwrap();
        assert_eq!(
            bundle.demand(),
            Demand {
                position: 0,
                amount: 10.0
            }
        );
        bundle.validate().unwrap();
    }
}
