//! Writing library folders.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lb_core::Real;
use lb_index::{EnviIndex, ImpactIndex, TechIndex};
use lb_matrix::{Matrix, MatrixBuilder, MatrixBundle, npy};
use lb_solver::{SolverConfig, solver_for};

use crate::dir::LibraryDir;
use crate::error::LibraryResult;
use crate::info::LibraryInfo;
use crate::items;
use crate::library::{COSTS_FILE, LibMatrix, Library};

/// Low-level writer for the files of one library folder.
#[derive(Debug, Clone)]
pub struct LibraryWriter {
    folder: PathBuf,
}

impl LibraryWriter {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn write_info(&self, info: &LibraryInfo) -> LibraryResult<()> {
        info.write(&self.folder)
    }

    pub fn write_tech_index(&self, index: &TechIndex) -> LibraryResult<()> {
        items::write_items(&self.folder, &items::tech_items(index))
    }

    pub fn write_envi_index(&self, index: &EnviIndex) -> LibraryResult<()> {
        items::write_items(&self.folder, &items::envi_items(index))
    }

    pub fn write_impact_index(&self, index: &ImpactIndex) -> LibraryResult<()> {
        items::write_items(&self.folder, &items::impact_items(index))
    }

    pub fn write_matrix(&self, kind: LibMatrix, matrix: &Matrix) -> LibraryResult<()> {
        npy::write_matrix(&self.folder.join(kind.file()), matrix)?;
        Ok(())
    }

    pub fn write_costs(&self, costs: &[Real]) -> LibraryResult<()> {
        npy::write_vector(&self.folder.join(COSTS_FILE), costs)?;
        Ok(())
    }
}

/// Export of a solved system as a library.
///
/// Products of other libraries listed in the tech index become dependencies.
/// Their columns are written as placeholders: a unit entry on the diagonal
/// of `A` and an empty column in `B`, so that the stored inverse carries the
/// demand on the foreign product in the foreign row.
#[derive(Debug, Clone)]
pub struct LibraryExport {
    info: LibraryInfo,
    bundle: MatrixBundle,
    solver: SolverConfig,
    with_inverse: bool,
}

impl LibraryExport {
    pub fn new(info: LibraryInfo, bundle: MatrixBundle) -> Self {
        Self {
            info,
            bundle,
            solver: SolverConfig::default(),
            with_inverse: true,
        }
    }

    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Skip `INV` and `M`; consumers then invert `A` themselves.
    pub fn without_inverse(mut self) -> Self {
        self.with_inverse = false;
        self
    }

    /// Write the library into `dir` and open it.
    pub fn write(self, dir: &LibraryDir) -> LibraryResult<Arc<Library>> {
        let id = self.info.id();
        self.write_to(&dir.folder_of(&id))?;
        dir.evict(&id);
        dir.require(&id)
    }

    /// Write the library files into `folder`.
    pub fn write_to(self, folder: &Path) -> LibraryResult<()> {
        let LibraryExport {
            mut info,
            bundle,
            solver,
            with_inverse,
        } = self;
        let own = info.id();
        for lib in bundle.tech_index.libraries() {
            if lib != own && !info.dependencies.contains(&lib) {
                info.dependencies.push(lib);
            }
        }

        let writer = LibraryWriter::new(folder);
        writer.write_info(&info)?;
        writer.write_tech_index(&bundle.tech_index)?;

        let foreign: Vec<usize> = (0..bundle.tech_index.size())
            .filter(|&j| bundle.tech_index.library(j).is_some_and(|lib| *lib != own))
            .collect();
        let a = with_placeholders(&bundle.tech_matrix, &foreign, true);
        writer.write_matrix(LibMatrix::A, &a)?;

        let b = match (&bundle.envi_index, &bundle.envi_matrix) {
            (Some(index), Some(b)) => {
                writer.write_envi_index(index)?;
                let b = with_placeholders(b, &foreign, false);
                writer.write_matrix(LibMatrix::B, &b)?;
                Some(b)
            }
            _ => None,
        };
        if let (Some(index), Some(c)) = (&bundle.impact_index, &bundle.impact_matrix) {
            writer.write_impact_index(index)?;
            writer.write_matrix(LibMatrix::C, c)?;
        }
        if let Some(costs) = &bundle.costs {
            writer.write_costs(costs)?;
        }

        if with_inverse {
            let inverse = Matrix::Dense(solver_for(&a, &solver).invert(&a)?);
            if let Some(b) = &b {
                writer.write_matrix(LibMatrix::M, &b.multiply(&inverse))?;
            }
            writer.write_matrix(LibMatrix::INV, &inverse)?;
        }
        tracing::info!(
            library = %own,
            products = bundle.tech_index.size(),
            dependencies = info.dependencies.len(),
            "exported library"
        );
        Ok(())
    }
}

/// Replace the given columns with placeholder columns: a unit diagonal entry
/// for a technology matrix, zeros otherwise.
fn with_placeholders(m: &Matrix, columns: &[usize], unit_diagonal: bool) -> Matrix {
    if columns.is_empty() {
        return m.clone();
    }
    let (rows, cols) = m.shape();
    let mut builder = MatrixBuilder::for_density(rows, cols, m.is_sparse());
    m.for_each_nonzero(|r, c, v| {
        if !columns.contains(&c) {
            builder.set(r, c, v);
        }
    });
    if unit_diagonal {
        for &j in columns {
            builder.set(j, j, 1.0);
        }
    }
    builder.build()
}
