//! A file-backed, read-only library.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use lb_core::{LibraryId, Real};
use lb_index::{EnviFlow, EnviIndex, ImpactIndex, TechFlow, TechIndex};
use lb_matrix::{Matrix, MatrixError, npy};
use lb_solver::SolverConfig;
use once_cell::sync::OnceCell;

use crate::dir::LibraryDir;
use crate::error::{LibraryError, LibraryResult};
use crate::info::LibraryInfo;
use crate::items::{self, IndexItem, IndexKind, LibEnviItem, LibImpactItem, LibTechItem};
use crate::resolve;
use crate::store::EntityStore;

/// Matrix payloads a library may ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibMatrix {
    /// Technology matrix.
    A,
    /// Intervention matrix.
    B,
    /// Characterization factors (impact index x intervention index).
    C,
    /// Inverse of `A`.
    INV,
    /// Intensities `B * INV`.
    M,
}

impl LibMatrix {
    pub const ALL: [LibMatrix; 5] = [
        LibMatrix::A,
        LibMatrix::B,
        LibMatrix::C,
        LibMatrix::INV,
        LibMatrix::M,
    ];

    pub fn file(self) -> &'static str {
        match self {
            LibMatrix::A => "A.npy",
            LibMatrix::B => "B.npy",
            LibMatrix::C => "C.npy",
            LibMatrix::INV => "INV.npy",
            LibMatrix::M => "M.npy",
        }
    }

    fn slot(self) -> usize {
        match self {
            LibMatrix::A => 0,
            LibMatrix::B => 1,
            LibMatrix::C => 2,
            LibMatrix::INV => 3,
            LibMatrix::M => 4,
        }
    }
}

pub const COSTS_FILE: &str = "costs.npy";

/// A library folder.
///
/// Matrices are read lazily and kept for the lifetime of the instance; the
/// caches are fill-once and safe to share between threads. Column and
/// diagonal reads go to disk only while the full matrix is not loaded.
#[derive(Debug)]
pub struct Library {
    folder: PathBuf,
    info: LibraryInfo,
    matrices: [OnceCell<Option<Arc<Matrix>>>; 5],
    shapes: [OnceCell<Option<(usize, usize)>>; 5],
    costs: OnceCell<Option<Arc<Vec<Real>>>>,
    tech_items: OnceCell<Option<Vec<LibTechItem>>>,
    envi_items: OnceCell<Option<Vec<LibEnviItem>>>,
    impact_items: OnceCell<Option<Vec<LibImpactItem>>>,
    disk_reads: AtomicUsize,
}

impl Library {
    /// Open the library stored in `folder`.
    pub fn open(folder: impl Into<PathBuf>) -> LibraryResult<Self> {
        let folder = folder.into();
        let info = LibraryInfo::read(&folder)?;
        Ok(Self::with_info(folder, info))
    }

    /// Create the folder and its metadata file.
    pub fn create(folder: impl Into<PathBuf>, info: LibraryInfo) -> LibraryResult<Self> {
        let folder = folder.into();
        info.write(&folder)?;
        Ok(Self::with_info(folder, info))
    }

    fn with_info(folder: PathBuf, info: LibraryInfo) -> Self {
        Self {
            folder,
            info,
            matrices: Default::default(),
            shapes: Default::default(),
            costs: OnceCell::new(),
            tech_items: OnceCell::new(),
            envi_items: OnceCell::new(),
            impact_items: OnceCell::new(),
            disk_reads: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> LibraryId {
        self.info.id()
    }

    pub fn info(&self) -> &LibraryInfo {
        &self.info
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn is_regionalized(&self) -> bool {
        self.info.is_regionalized
    }

    pub fn has_matrix(&self, kind: LibMatrix) -> bool {
        self.folder.join(kind.file()).exists()
    }

    /// Number of matrix payload reads from disk so far.
    pub fn disk_reads(&self) -> usize {
        self.disk_reads.load(Ordering::Relaxed)
    }

    /// The full matrix of the given kind, `None` if the library does not
    /// ship it.
    pub fn matrix(&self, kind: LibMatrix) -> LibraryResult<Option<Arc<Matrix>>> {
        let cell = &self.matrices[kind.slot()];
        let loaded = cell.get_or_try_init(|| self.load_matrix(kind))?;
        Ok(loaded.clone())
    }

    fn load_matrix(&self, kind: LibMatrix) -> LibraryResult<Option<Arc<Matrix>>> {
        if self.shape(kind)?.is_none() {
            tracing::debug!(library = %self.info.name, file = kind.file(), "matrix not present");
            return Ok(None);
        }
        let path = self.folder.join(kind.file());
        self.disk_reads.fetch_add(1, Ordering::Relaxed);
        let matrix = npy::read_matrix(&path)?;
        tracing::debug!(
            library = %self.info.name,
            file = kind.file(),
            rows = matrix.rows(),
            cols = matrix.cols(),
            "loaded library matrix"
        );
        let matrix = match kind {
            LibMatrix::A | LibMatrix::B | LibMatrix::C => {
                matrix.compress(SolverConfig::default().sparse_threshold)
            }
            LibMatrix::INV | LibMatrix::M => matrix,
        };
        Ok(Some(Arc::new(matrix)))
    }

    /// Shape of a matrix file, checked against the index sizes.
    fn shape(&self, kind: LibMatrix) -> LibraryResult<Option<(usize, usize)>> {
        let cell = &self.shapes[kind.slot()];
        let shape = cell.get_or_try_init(|| {
            let path = self.folder.join(kind.file());
            if !path.exists() {
                return Ok(None);
            }
            let shape = npy::read_shape(&path)?;
            self.check_shape(kind, shape)?;
            Ok::<_, LibraryError>(Some(shape))
        })?;
        Ok(*shape)
    }

    fn check_shape(&self, kind: LibMatrix, actual: (usize, usize)) -> LibraryResult<()> {
        let tech = self.tech_items()?.map(<[_]>::len);
        let envi = self.envi_items()?.map(<[_]>::len);
        let impacts = self.impact_items()?.map(<[_]>::len);
        let (rows, cols) = match kind {
            LibMatrix::A | LibMatrix::INV => (tech, tech),
            LibMatrix::B | LibMatrix::M => (envi, tech),
            LibMatrix::C => (impacts, envi),
        };
        let expected = (rows.unwrap_or(actual.0), cols.unwrap_or(actual.1));
        if expected != actual {
            return Err(LibraryError::shape(&self.id(), kind.file(), expected, actual));
        }
        Ok(())
    }

    /// Column `j` of a matrix; reads only that column while the matrix is not
    /// loaded.
    pub fn column(&self, kind: LibMatrix, j: usize) -> LibraryResult<Option<Vec<Real>>> {
        if let Some(loaded) = self.matrices[kind.slot()].get() {
            return match loaded {
                Some(m) if j < m.cols() => Ok(Some(m.column(j))),
                Some(m) => Err(MatrixError::ColumnOob {
                    path: self.folder.join(kind.file()),
                    column: j,
                    columns: m.cols(),
                }
                .into()),
                None => Ok(None),
            };
        }
        if self.shape(kind)?.is_none() {
            return Ok(None);
        }
        self.disk_reads.fetch_add(1, Ordering::Relaxed);
        let column = npy::read_column(&self.folder.join(kind.file()), j)?;
        Ok(Some(column))
    }

    pub fn diagonal(&self, kind: LibMatrix) -> LibraryResult<Option<Vec<Real>>> {
        if let Some(loaded) = self.matrices[kind.slot()].get() {
            return Ok(loaded.as_ref().map(|m| m.diagonal()));
        }
        if self.shape(kind)?.is_none() {
            return Ok(None);
        }
        self.disk_reads.fetch_add(1, Ordering::Relaxed);
        let diagonal = npy::read_diagonal(&self.folder.join(kind.file()))?;
        Ok(Some(diagonal))
    }

    /// Costs per unit of each technology index entry.
    pub fn costs(&self) -> LibraryResult<Option<Arc<Vec<Real>>>> {
        let costs = self.costs.get_or_try_init(|| {
            let path = self.folder.join(COSTS_FILE);
            if !path.exists() {
                return Ok(None);
            }
            self.disk_reads.fetch_add(1, Ordering::Relaxed);
            let costs = npy::read_vector(&path)?;
            if let Some(n) = self.tech_items()?.map(<[_]>::len)
                && n != costs.len()
            {
                return Err(LibraryError::shape(
                    &self.id(),
                    COSTS_FILE,
                    (n, 1),
                    (costs.len(), 1),
                ));
            }
            Ok::<_, LibraryError>(Some(Arc::new(costs)))
        })?;
        Ok(costs.clone())
    }

    fn tech_items(&self) -> LibraryResult<Option<&[LibTechItem]>> {
        load_items(&self.tech_items, &self.folder)
    }

    fn envi_items(&self) -> LibraryResult<Option<&[LibEnviItem]>> {
        load_items(&self.envi_items, &self.folder)
    }

    fn impact_items(&self) -> LibraryResult<Option<&[LibImpactItem]>> {
        load_items(&self.impact_items, &self.folder)
    }

    /// Libraries named as dependencies in the metadata.
    pub fn direct_dependencies(&self, dir: &LibraryDir) -> LibraryResult<Vec<Arc<Library>>> {
        self.info
            .dependencies
            .iter()
            .map(|id| dir.require(id))
            .collect()
    }

    /// All libraries reachable over declared dependencies, breadth first.
    ///
    /// A cycle anywhere below this library is a `DependencyCycle`.
    pub fn transitive_dependencies(&self, dir: &LibraryDir) -> LibraryResult<Vec<Arc<Library>>> {
        let me = self.id();
        let mut reached = Vec::new();
        // visits follow discovery order, which is breadth first
        resolve::dependency_order(std::slice::from_ref(&me), |id| {
            if *id == me {
                return Ok(self.info.dependencies.clone());
            }
            let library = dir.require(id)?;
            let dependencies = library.info.dependencies.clone();
            reached.push(library);
            Ok(dependencies)
        })?;
        Ok(reached)
    }

    /// Record a dependency and persist the metadata.
    pub fn add_dependency(&mut self, other: &LibraryId) -> LibraryResult<()> {
        if *other == self.id() || self.info.dependencies.contains(other) {
            return Ok(());
        }
        self.info.dependencies.push(other.clone());
        self.info.write(&self.folder)
    }

    /// Resolve the technology index against `store`.
    ///
    /// `Ok(None)` when the library has no technology index; any entry the
    /// store does not know fails the whole index.
    pub fn sync_tech_index(&self, store: &dyn EntityStore) -> LibraryResult<Option<TechIndex>> {
        let Some(entries) = self.tech_items()? else {
            return Ok(None);
        };
        let mut index: Option<TechIndex> = None;
        for (i, item) in entries.iter().enumerate() {
            self.check_position(IndexKind::Tech, i, item.index)?;
            let process = store
                .process(&item.process)
                .ok_or_else(|| self.unresolved(IndexKind::Tech, &item.process))?;
            let flow = store
                .flow(&item.flow)
                .ok_or_else(|| self.unresolved(IndexKind::Tech, &item.flow))?;
            let key = TechFlow::of(process, flow);
            match index.as_mut() {
                Some(idx) => {
                    idx.add(key);
                }
                None => index = Some(TechIndex::new(key)),
            }
        }
        if let Some(idx) = &index {
            self.check_len(IndexKind::Tech, entries.len(), idx.size())?;
        }
        Ok(index)
    }

    pub fn sync_envi_index(&self, store: &dyn EntityStore) -> LibraryResult<Option<EnviIndex>> {
        let Some(entries) = self.envi_items()? else {
            return Ok(None);
        };
        let mut index = if self.is_regionalized() {
            EnviIndex::create_regionalized()
        } else {
            EnviIndex::create()
        };
        for (i, item) in entries.iter().enumerate() {
            self.check_position(IndexKind::Envi, i, item.index)?;
            let flow = store
                .flow(&item.flow)
                .ok_or_else(|| self.unresolved(IndexKind::Envi, &item.flow))?;
            let location = match &item.location {
                Some(loc) => Some(
                    store
                        .location(loc)
                        .ok_or_else(|| self.unresolved(IndexKind::Envi, loc))?,
                ),
                None => None,
            };
            let key = if item.is_input {
                EnviFlow::input_of(flow, location)
            } else {
                EnviFlow::output_of(flow, location)
            };
            index.add(key);
        }
        self.check_len(IndexKind::Envi, entries.len(), index.size())?;
        Ok(Some(index))
    }

    pub fn sync_impact_index(&self, store: &dyn EntityStore) -> LibraryResult<Option<ImpactIndex>> {
        let Some(entries) = self.impact_items()? else {
            return Ok(None);
        };
        let mut index = ImpactIndex::with_capacity(entries.len());
        for (i, item) in entries.iter().enumerate() {
            self.check_position(IndexKind::Impact, i, item.index)?;
            let impact = store
                .impact(&item.impact)
                .ok_or_else(|| self.unresolved(IndexKind::Impact, &item.impact))?;
            index.add(impact);
        }
        self.check_len(IndexKind::Impact, entries.len(), index.size())?;
        Ok(Some(index))
    }

    fn unresolved(&self, kind: IndexKind, ref_id: &str) -> LibraryError {
        tracing::warn!(library = %self.info.name, index = kind.label(), ref_id, "unresolved index entry");
        LibraryError::UnresolvedIndex {
            library: self.id(),
            index: kind.label(),
            ref_id: ref_id.to_string(),
        }
    }

    fn check_position(&self, kind: IndexKind, expected: usize, actual: usize) -> LibraryResult<()> {
        if expected == actual {
            return Ok(());
        }
        Err(LibraryError::DimensionMismatch {
            library: self.id(),
            what: format!("{} position", kind.label()),
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }

    /// Duplicate keys collapse in the synced index.
    fn check_len(&self, kind: IndexKind, expected: usize, actual: usize) -> LibraryResult<()> {
        if expected == actual {
            return Ok(());
        }
        Err(LibraryError::DimensionMismatch {
            library: self.id(),
            what: format!("{} size", kind.label()),
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

fn load_items<'a, T: IndexItem>(
    cell: &'a OnceCell<Option<Vec<T>>>,
    folder: &Path,
) -> LibraryResult<Option<&'a [T]>> {
    let items = cell.get_or_try_init(|| items::read_items::<T>(folder))?;
    Ok(items.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::write_items;

    fn write_sample(dir: &Path) -> Library {
        let lib = Library::create(dir, LibraryInfo::new("sample")).unwrap();
        write_items(
            dir,
            &[
                LibTechItem {
                    index: 0,
                    process: "p1".into(),
                    flow: "f1".into(),
                },
                LibTechItem {
                    index: 1,
                    process: "p2".into(),
                    flow: "f2".into(),
                },
            ],
        )
        .unwrap();
        let a = Matrix::from_rows(&[&[1.0, -0.5], &[0.0, 2.0]]);
        npy::write_matrix(&dir.join(LibMatrix::A.file()), &a).unwrap();
        lib
    }

    #[test]
    fn matrix_is_read_once() {
        let dir = tempfile::tempdir().unwrap();
        let lib = write_sample(dir.path());
        let first = lib.matrix(LibMatrix::A).unwrap().unwrap();
        let second = lib.matrix(LibMatrix::A).unwrap().unwrap();
        assert_eq!(first.to_dense(), second.to_dense());
        assert_eq!(lib.disk_reads(), 1);
        assert!(lib.matrix(LibMatrix::INV).unwrap().is_none());
        assert!(lib.costs().unwrap().is_none());
    }

    #[test]
    fn column_and_diagonal_before_and_after_load() {
        let dir = tempfile::tempdir().unwrap();
        let lib = write_sample(dir.path());
        assert_eq!(lib.column(LibMatrix::A, 1).unwrap(), Some(vec![-0.5, 2.0]));
        assert_eq!(lib.diagonal(LibMatrix::A).unwrap(), Some(vec![1.0, 2.0]));
        assert_eq!(lib.disk_reads(), 2);

        lib.matrix(LibMatrix::A).unwrap();
        assert_eq!(lib.column(LibMatrix::A, 0).unwrap(), Some(vec![1.0, 0.0]));
        assert_eq!(lib.disk_reads(), 3);
        assert!(lib.column(LibMatrix::A, 2).is_err());
        assert!(lib.column(LibMatrix::B, 0).unwrap().is_none());
    }

    #[test]
    fn dimension_mismatch_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let lib = write_sample(dir.path());
        let inv = Matrix::zeros(3, 3);
        npy::write_matrix(&dir.path().join(LibMatrix::INV.file()), &inv).unwrap();
        let err = lib.matrix(LibMatrix::INV).unwrap_err();
        assert!(matches!(err, LibraryError::DimensionMismatch { .. }));
        assert!(err.to_string().contains("2x2"));
    }

    #[test]
    fn add_dependency_is_idempotent_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib = write_sample(dir.path());
        let base = LibraryId::from("base");
        lib.add_dependency(&base).unwrap();
        lib.add_dependency(&base).unwrap();
        lib.add_dependency(&lib.id()).unwrap();
        let reopened = Library::open(dir.path()).unwrap();
        assert_eq!(reopened.info().dependencies, vec![base]);
    }
}
