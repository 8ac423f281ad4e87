//! Persisted index entries.
//!
//! Every index kind is stored twice: `index_X.bincode` (read by the
//! calculation) and `index_X.csv` (tabular exchange, for inspection or to
//! rebuild a binary index). Entries hold reference ids only.
//!
//! The binary files are bincode, not the protobuf `index_X.bin` files of
//! other LCA tools. The distinct extension keeps such a file from being
//! parsed as ours; convert it through the CSV twin instead.

use std::fs;
use std::path::{Path, PathBuf};

use lb_index::{EnviIndex, ImpactIndex, TechIndex};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{LibraryError, LibraryResult};

/// The three persisted index kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Tech,
    Envi,
    Impact,
}

impl IndexKind {
    pub fn stem(self) -> &'static str {
        match self {
            IndexKind::Tech => "index_A",
            IndexKind::Envi => "index_B",
            IndexKind::Impact => "index_C",
        }
    }

    pub fn bin_file(self) -> String {
        format!("{}.bincode", self.stem())
    }

    pub fn csv_file(self) -> String {
        format!("{}.csv", self.stem())
    }

    pub fn label(self) -> &'static str {
        match self {
            IndexKind::Tech => "technology index",
            IndexKind::Envi => "intervention index",
            IndexKind::Impact => "impact index",
        }
    }
}

/// One technology index entry: a process-product pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibTechItem {
    pub index: usize,
    pub process: String,
    pub flow: String,
}

/// One intervention index entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibEnviItem {
    pub index: usize,
    pub flow: String,
    pub location: Option<String>,
    pub is_input: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibImpactItem {
    pub index: usize,
    pub impact: String,
}

/// Common access to the position of a persisted entry.
pub trait IndexItem: Serialize + DeserializeOwned {
    const KIND: IndexKind;

    fn index(&self) -> usize;
}

impl IndexItem for LibTechItem {
    const KIND: IndexKind = IndexKind::Tech;

    fn index(&self) -> usize {
        self.index
    }
}

impl IndexItem for LibEnviItem {
    const KIND: IndexKind = IndexKind::Envi;

    fn index(&self) -> usize {
        self.index
    }
}

impl IndexItem for LibImpactItem {
    const KIND: IndexKind = IndexKind::Impact;

    fn index(&self) -> usize {
        self.index
    }
}

pub fn tech_items(index: &TechIndex) -> Vec<LibTechItem> {
    index
        .iter()
        .map(|(pos, key)| LibTechItem {
            index: pos,
            process: key.provider.ref_id.clone(),
            flow: key.flow.ref_id.clone(),
        })
        .collect()
}

pub fn envi_items(index: &EnviIndex) -> Vec<LibEnviItem> {
    index
        .iter()
        .map(|(pos, key)| LibEnviItem {
            index: pos,
            flow: key.flow.ref_id.clone(),
            location: key.location.as_ref().map(|l| l.ref_id.clone()),
            is_input: key.is_input,
        })
        .collect()
}

pub fn impact_items(index: &ImpactIndex) -> Vec<LibImpactItem> {
    index
        .iter()
        .map(|(pos, key)| LibImpactItem {
            index: pos,
            impact: key.ref_id.clone(),
        })
        .collect()
}

/// Write the binary and CSV files of an index into `folder`.
pub fn write_items<T: IndexItem>(folder: &Path, items: &[T]) -> LibraryResult<()> {
    let bin = folder.join(T::KIND.bin_file());
    let encoded = bincode::serialize(items).map_err(|source| LibraryError::Bincode {
        path: bin.clone(),
        source,
    })?;
    fs::write(&bin, encoded).map_err(|e| LibraryError::io(&bin, e))?;

    let csv_path = folder.join(T::KIND.csv_file());
    let csv_err = |source| LibraryError::Csv {
        path: csv_path.clone(),
        source,
    };
    let mut writer = csv::Writer::from_path(&csv_path).map_err(csv_err)?;
    for item in items {
        writer.serialize(item).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| LibraryError::io(&csv_path, e))?;
    Ok(())
}

/// Read the binary index of the given kind; `None` when the file is absent.
///
/// Entries are returned sorted by position.
pub fn read_items<T: IndexItem>(folder: &Path) -> LibraryResult<Option<Vec<T>>> {
    let path = folder.join(T::KIND.bin_file());
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read(&path).map_err(|e| LibraryError::io(&path, e))?;
    let mut items: Vec<T> = bincode::deserialize(&data)
        .map_err(|source| LibraryError::Bincode { path, source })?;
    items.sort_by_key(|item| item.index());
    Ok(Some(items))
}

/// Read the CSV twin of an index; `None` when the file is absent.
pub fn read_csv_items<T: IndexItem>(folder: &Path) -> LibraryResult<Option<Vec<T>>> {
    let path: PathBuf = folder.join(T::KIND.csv_file());
    if !path.exists() {
        return Ok(None);
    }
    let mut reader = csv::Reader::from_path(&path).map_err(|source| LibraryError::Csv {
        path: path.clone(),
        source,
    })?;
    let mut items = Vec::new();
    for row in reader.deserialize() {
        let item: T = row.map_err(|source| LibraryError::Csv {
            path: path.clone(),
            source,
        })?;
        items.push(item);
    }
    items.sort_by_key(|item| item.index());
    Ok(Some(items))
}

/// Rebuild the binary index from its CSV twin.
pub fn rebuild_bin_from_csv<T: IndexItem>(folder: &Path) -> LibraryResult<bool> {
    let Some(items) = read_csv_items::<T>(folder)? else {
        return Ok(false);
    };
    let bin = folder.join(T::KIND.bin_file());
    let encoded = bincode::serialize(&items).map_err(|source| LibraryError::Bincode {
        path: bin.clone(),
        source,
    })?;
    fs::write(&bin, encoded).map_err(|e| LibraryError::io(&bin, e))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_twin_matches_binary() {
        let dir = tempfile::tempdir().unwrap();
        let items = vec![
            LibEnviItem {
                index: 0,
                flow: "co2".into(),
                location: None,
                is_input: false,
            },
            LibEnviItem {
                index: 1,
                flow: "water".into(),
                location: Some("DE".into()),
                is_input: true,
            },
        ];
        write_items(dir.path(), &items).unwrap();

        let bin: Vec<LibEnviItem> = read_items(dir.path()).unwrap().unwrap();
        let csv: Vec<LibEnviItem> = read_csv_items(dir.path()).unwrap().unwrap();
        assert_eq!(bin, items);
        assert_eq!(csv, items);

        let text = fs::read_to_string(dir.path().join("index_B.csv")).unwrap();
        assert!(text.starts_with("index,flow,location,is_input"));
    }

    #[test]
    fn absent_index_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_items::<LibTechItem>(dir.path()).unwrap().is_none());
        assert!(!rebuild_bin_from_csv::<LibTechItem>(dir.path()).unwrap());
    }

    #[test]
    fn rebuild_binary_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let items = vec![LibImpactItem {
            index: 0,
            impact: "gwp".into(),
        }];
        write_items(dir.path(), &items).unwrap();
        fs::remove_file(dir.path().join("index_C.bincode")).unwrap();
        assert!(rebuild_bin_from_csv::<LibImpactItem>(dir.path()).unwrap());
        let back: Vec<LibImpactItem> = read_items(dir.path()).unwrap().unwrap();
        assert_eq!(back, items);
    }
}
