//! The library directory: one sub-folder per library.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use lb_core::LibraryId;

use crate::error::{LibraryError, LibraryResult};
use crate::info::{INFO_FILE, LibraryInfo};
use crate::library::Library;
use crate::resolve;

/// Root folder of all libraries.
///
/// Opened libraries are kept so that their matrix caches are shared by all
/// calculations that go through the same directory.
#[derive(Debug)]
pub struct LibraryDir {
    root: PathBuf,
    open: Mutex<HashMap<LibraryId, Arc<Library>>>,
}

impl LibraryDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            open: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn folder_of(&self, id: &LibraryId) -> PathBuf {
        self.root.join(id.as_str())
    }

    pub fn exists(&self, id: &LibraryId) -> bool {
        self.folder_of(id).join(INFO_FILE).exists()
    }

    /// Ids of all libraries in the directory, sorted.
    pub fn list(&self) -> LibraryResult<Vec<LibraryId>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| LibraryError::io(&self.root, e))? {
            let entry = entry.map_err(|e| LibraryError::io(&self.root, e))?;
            if entry.path().join(INFO_FILE).exists() {
                ids.push(LibraryId::new(entry.file_name().to_string_lossy()));
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// The library with the given id; `None` when it is not on disk.
    pub fn get(&self, id: &LibraryId) -> LibraryResult<Option<Arc<Library>>> {
        let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lib) = open.get(id) {
            return Ok(Some(lib.clone()));
        }
        if !self.exists(id) {
            return Ok(None);
        }
        let lib = Arc::new(Library::open(self.folder_of(id))?);
        tracing::debug!(library = %id, "opened library");
        open.insert(id.clone(), lib.clone());
        Ok(Some(lib))
    }

    /// Like [`get`](Self::get) but a missing library is an error.
    pub fn require(&self, id: &LibraryId) -> LibraryResult<Arc<Library>> {
        self.get(id)?
            .ok_or_else(|| LibraryError::MissingLibrary { id: id.clone() })
    }

    /// Create a new, empty library folder.
    pub fn create(&self, info: LibraryInfo) -> LibraryResult<Arc<Library>> {
        let id = info.id();
        let lib = Arc::new(Library::create(self.folder_of(&id), info)?);
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, lib.clone());
        Ok(lib)
    }

    /// Record `dependency` in the metadata of `library`.
    pub fn add_dependency(&self, library: &LibraryId, dependency: &LibraryId) -> LibraryResult<()> {
        let mut lib = Library::open(self.folder_of(library))?;
        lib.add_dependency(dependency)?;
        self.evict(library);
        Ok(())
    }

    /// Drop a cached instance so that the next `get` reads the folder again.
    pub fn evict(&self, id: &LibraryId) {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// Libraries `library` depends on, dependencies first, ending with
    /// `library` itself.
    pub fn dependency_order_of(&self, library: &Library) -> LibraryResult<Vec<Arc<Library>>> {
        let root = library.id();
        let order = resolve::dependency_order(std::slice::from_ref(&root), |id| {
            if *id == root {
                return Ok(library.info().dependencies.clone());
            }
            Ok(self.require(id)?.info().dependencies.clone())
        })?;
        order.iter().map(|id| self.require(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_and_missing_library() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = LibraryDir::new(tmp.path());
        dir.create(LibraryInfo::new("base")).unwrap();
        dir.create(LibraryInfo::new("mid").depends_on("base")).unwrap();
        let top = dir
            .create(LibraryInfo::new("top").depends_on("mid").depends_on("base"))
            .unwrap();

        let order: Vec<String> = dir
            .dependency_order_of(&top)
            .unwrap()
            .iter()
            .map(|l| l.info().name.clone())
            .collect();
        assert_eq!(order, vec!["base", "mid", "top"]);

        let deps = top.transitive_dependencies(&dir).unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(dir.list().unwrap().len(), 3);

        let broken = dir
            .create(LibraryInfo::new("broken").depends_on("gone"))
            .unwrap();
        let err = dir.dependency_order_of(&broken).unwrap_err();
        assert!(matches!(err, LibraryError::MissingLibrary { ref id } if id.as_str() == "gone"));
        assert!(dir.get(&LibraryId::from("gone")).unwrap().is_none());
    }

    #[test]
    fn transitive_cycle_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = LibraryDir::new(tmp.path());
        let a = dir.create(LibraryInfo::new("a").depends_on("b")).unwrap();
        dir.create(LibraryInfo::new("b").depends_on("a")).unwrap();
        assert!(matches!(
            a.transitive_dependencies(&dir),
            Err(LibraryError::DependencyCycle { .. })
        ));
        assert!(matches!(
            dir.dependency_order_of(&a),
            Err(LibraryError::DependencyCycle { .. })
        ));
    }

    #[test]
    fn cycle_below_the_root_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = LibraryDir::new(tmp.path());
        let a = dir.create(LibraryInfo::new("a").depends_on("b")).unwrap();
        dir.create(LibraryInfo::new("b").depends_on("c")).unwrap();
        dir.create(LibraryInfo::new("c").depends_on("b")).unwrap();
        let err = a.transitive_dependencies(&dir).unwrap_err();
        assert!(matches!(
            err,
            LibraryError::DependencyCycle { ref libraries }
                if *libraries == vec![LibraryId::from("b"), LibraryId::from("c")]
        ));
    }

    #[test]
    fn dependencies_are_reached_breadth_first() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = LibraryDir::new(tmp.path());
        dir.create(LibraryInfo::new("d")).unwrap();
        dir.create(LibraryInfo::new("b").depends_on("d")).unwrap();
        dir.create(LibraryInfo::new("c")).unwrap();
        let a = dir
            .create(LibraryInfo::new("a").depends_on("b").depends_on("c"))
            .unwrap();
        let names: Vec<String> = a
            .transitive_dependencies(&dir)
            .unwrap()
            .iter()
            .map(|l| l.info().name.clone())
            .collect();
        assert_eq!(names, vec!["b", "c", "d"]);
    }

    #[test]
    fn add_dependency_refreshes_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = LibraryDir::new(tmp.path());
        let id = LibraryId::from("x");
        dir.create(LibraryInfo::new("x")).unwrap();
        dir.add_dependency(&id, &LibraryId::from("y")).unwrap();
        let x = dir.require(&id).unwrap();
        assert_eq!(x.info().dependencies, vec![LibraryId::from("y")]);
    }
}
