//! Shared fixtures: a temporary library directory with an entity store, and
//! a car built from steel of library `mid`, which itself draws electricity
//! from library `base`.

#![allow(dead_code)]

use std::sync::Arc;

use lb_calc::{CalculationConfig, LcaCalculator, SolutionProvider};
use lb_core::{LibraryId, Real};
use lb_index::{EnviFlow, EnviIndex, ImpactIndex, TechFlow, TechIndex};
use lb_library::{Library, LibraryDir, LibraryExport, LibraryInfo, MemoryStore};
use lb_matrix::{Matrix, MatrixBundle};
use nalgebra::DMatrix;
use tempfile::TempDir;

pub struct World {
    _tmp: TempDir,
    pub dir: Arc<LibraryDir>,
    pub store: MemoryStore,
}

impl World {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Arc::new(LibraryDir::new(tmp.path()));
        Self {
            _tmp: tmp,
            dir,
            store: MemoryStore::new(),
        }
    }

    pub fn product(&mut self, name: &str, library: Option<&str>) -> TechFlow {
        let library = library.map(LibraryId::from);
        let process = self
            .store
            .add_process(&format!("p-{name}"), name, library.as_ref());
        let flow = self.store.add_flow(&format!("f-{name}"), name);
        TechFlow::of(process, flow)
    }

    pub fn emission(&mut self, name: &str) -> EnviFlow {
        EnviFlow::output_of(self.store.add_flow(name, name), None)
    }

    pub fn export(&self, info: LibraryInfo, bundle: MatrixBundle) -> Arc<Library> {
        LibraryExport::new(info, bundle).write(&self.dir).unwrap()
    }

    /// A calculator over a snapshot of the store.
    pub fn calculator(&self) -> LcaCalculator {
        LcaCalculator::new(CalculationConfig::default())
            .with_libraries(self.dir.clone(), Arc::new(self.store.clone()))
    }
}

pub fn tech_bundle(keys: &[TechFlow], a: &[&[Real]]) -> MatrixBundle {
    let index = TechIndex::from_keys(keys.iter().cloned()).unwrap();
    MatrixBundle::new(index, Matrix::from_rows(a)).unwrap()
}

pub fn with_flows(bundle: MatrixBundle, flows: &[EnviFlow], b: &[&[Real]]) -> MatrixBundle {
    let mut index = EnviIndex::create();
    for f in flows {
        index.add(f.clone());
    }
    bundle
        .with_interventions(index, Matrix::from_rows(b))
        .unwrap()
}

/// `bundle` with its products listed in `order`; the reference product
/// stays the same.
pub fn reordered(bundle: &MatrixBundle, order: &[usize]) -> MatrixBundle {
    let n = order.len();
    let keys = order.iter().map(|&i| bundle.tech_index.key_at(i).clone());
    let mut index = TechIndex::from_keys(keys).unwrap();
    index.set_reference(bundle.tech_index.ref_flow()).unwrap();
    let a = bundle.tech_matrix.to_dense();
    let a = DMatrix::from_fn(n, n, |i, j| a[(order[i], order[j])]);
    let mut out = MatrixBundle::new(index, Matrix::Dense(a)).unwrap();
    if let (Some(envi), Some(b)) = (&bundle.envi_index, &bundle.envi_matrix) {
        let b = b.to_dense();
        let b = DMatrix::from_fn(b.nrows(), n, |i, j| b[(i, order[j])]);
        out = out.with_interventions(envi.clone(), Matrix::Dense(b)).unwrap();
    }
    if let (Some(index), Some(c)) = (&bundle.impact_index, &bundle.impact_matrix) {
        out = out.with_impacts(index.clone(), c.clone()).unwrap();
    }
    if let Some(costs) = &bundle.costs {
        out = out.with_costs(order.iter().map(|&i| costs[i]).collect()).unwrap();
    }
    out
}

pub fn assert_close(actual: Real, expected: Real) {
    let scale = expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= 1e-9 * scale,
        "expected {expected}, got {actual}"
    );
}

pub fn assert_all_close(actual: &[Real], expected: &[Real]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert_close(*a, *e);
    }
}

/// Value of `product` in a vector over `provider`'s tech index.
pub fn at(provider: &SolutionProvider, values: &[Real], product: &TechFlow) -> Real {
    values[provider.tech_index().position(product).unwrap()]
}

pub struct Nested {
    pub car: TechFlow,
    pub steel: TechFlow,
    pub power: TechFlow,
    pub coal: TechFlow,
    pub co2: EnviFlow,
    /// Car demand with steel and power taken from the libraries.
    pub foreground: MatrixBundle,
    /// The same system as one matrix.
    pub flat: MatrixBundle,
}

/// Libraries `base` (power, coal) and `mid` (steel, drawing power from
/// `base`), plus a foreground car that needs both steel and power.
pub fn nested(world: &mut World, with_inverse: bool) -> Nested {
    nested_in_order(world, with_inverse, &[0, 1], &[0, 1])
}

/// [`nested`] with the products of `base` and `mid` exported in the given
/// orders.
pub fn nested_in_order(
    world: &mut World,
    with_inverse: bool,
    base_order: &[usize],
    mid_order: &[usize],
) -> Nested {
    let car = world.product("car", None);
    let steel = world.product("steel", Some("mid"));
    let power = world.product("power", Some("base"));
    let coal = world.product("coal", Some("base"));
    let co2 = world.emission("co2");
    let gwp = world.store.add_impact("gwp", "GWP");

    let base = with_flows(
        tech_bundle(
            &[power.clone(), coal.clone()],
            &[&[1.0, -0.1], &[-0.5, 1.0]],
        ),
        &[co2.clone()],
        &[&[2.0, 1.0]],
    )
    .with_costs(vec![1.0, 0.5])
    .unwrap();
    let mid = with_flows(
        tech_bundle(&[steel.clone(), power.clone()], &[&[1.0, 0.0], &[-3.0, 1.0]]),
        &[co2.clone()],
        &[&[0.5, 0.0]],
    );
    let export = |info: LibraryInfo, bundle: MatrixBundle| {
        let export = LibraryExport::new(info, bundle);
        let export = if with_inverse {
            export
        } else {
            export.without_inverse()
        };
        export.write(&world.dir).unwrap();
    };
    export(LibraryInfo::new("base"), reordered(&base, base_order));
    export(LibraryInfo::new("mid"), reordered(&mid, mid_order));

    let impacts = ImpactIndex::from_keys([gwp]);
    let foreground = with_flows(
        tech_bundle(
            &[car.clone(), steel.clone(), power.clone()],
            &[&[1.0, 0.0, 0.0], &[-2.0, 1.0, 0.0], &[-1.0, 0.0, 1.0]],
        ),
        &[co2.clone()],
        &[&[1.0, 0.0, 0.0]],
    )
    .with_impacts(impacts.clone(), Matrix::from_rows(&[&[1.0]]))
    .unwrap()
    .with_costs(vec![10.0, 0.0, 0.0])
    .unwrap();

    let flat = with_flows(
        tech_bundle(
            &[car.clone(), steel.clone(), power.clone(), coal.clone()],
            &[
                &[1.0, 0.0, 0.0, 0.0],
                &[-2.0, 1.0, 0.0, 0.0],
                &[-1.0, -3.0, 1.0, -0.1],
                &[0.0, 0.0, -0.5, 1.0],
            ],
        ),
        &[co2.clone()],
        &[&[1.0, 0.5, 2.0, 1.0]],
    )
    .with_impacts(impacts, Matrix::from_rows(&[&[1.0]]))
    .unwrap()
    .with_costs(vec![10.0, 0.0, 1.0, 0.5])
    .unwrap();

    Nested {
        car,
        steel,
        power,
        coal,
        co2,
        foreground,
        flat,
    }
}
