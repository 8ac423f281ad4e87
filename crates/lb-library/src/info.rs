//! Library metadata (`library.json`).

use std::fs;
use std::path::Path;

use lb_core::LibraryId;
use serde::{Deserialize, Serialize};

use crate::error::{LibraryError, LibraryResult};

pub const INFO_FILE: &str = "library.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_regionalized: bool,
    #[serde(default)]
    pub dependencies: Vec<LibraryId>,
}

impl LibraryInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0".to_string(),
            description: None,
            is_regionalized: false,
            dependencies: Vec::new(),
        }
    }

    pub fn id(&self) -> LibraryId {
        LibraryId::new(self.name.clone())
    }

    pub fn regionalized(mut self, is_regionalized: bool) -> Self {
        self.is_regionalized = is_regionalized;
        self
    }

    pub fn depends_on(mut self, dependency: impl Into<LibraryId>) -> Self {
        let dependency = dependency.into();
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }

    pub fn read(folder: &Path) -> LibraryResult<Self> {
        let path = folder.join(INFO_FILE);
        let content = fs::read_to_string(&path).map_err(|e| LibraryError::io(&path, e))?;
        serde_json::from_str(&content).map_err(|source| LibraryError::Json { path, source })
    }

    pub fn write(&self, folder: &Path) -> LibraryResult<()> {
        fs::create_dir_all(folder).map_err(|e| LibraryError::io(folder, e))?;
        let path = folder.join(INFO_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|source| LibraryError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|e| LibraryError::io(&path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_metadata() {
        let info = LibraryInfo::new("ei")
            .regionalized(true)
            .depends_on("base")
            .depends_on("base");
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"isRegionalized\":true"));
        assert!(json.contains("\"dependencies\":[\"base\"]"));

        let parsed: LibraryInfo = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert_eq!(parsed.id(), LibraryId::from("x"));
        assert!(parsed.dependencies.is_empty());
        assert!(!parsed.is_regionalized);
    }
}
