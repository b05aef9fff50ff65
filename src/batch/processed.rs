//! Set of artwork ids already written to the output tree.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use crate::models::ArtworkId;
use crate::storage::INDEX_FILE;

/// Membership filter rebuilt from durable output. Entries are only ever
/// added.
#[derive(Debug, Clone, Default)]
pub struct ProcessedSet {
    ids: HashSet<ArtworkId>,
}

impl ProcessedSet {
    /// Scan `<root>/*/*/index.yaml`; the directory holding the index is the id.
    /// A missing root is an empty set.
    pub fn scan(root: &Path) -> std::io::Result<Self> {
        let mut set = Self::default();
        if !root.exists() {
            return Ok(set);
        }

        for date_dir in std::fs::read_dir(root)? {
            let date_dir = date_dir?.path();
            if !date_dir.is_dir() {
                continue;
            }
            for artwork_dir in std::fs::read_dir(&date_dir)? {
                let artwork_dir = artwork_dir?.path();
                if !artwork_dir.join(INDEX_FILE).is_file() {
                    continue;
                }
                let id = artwork_dir
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(ArtworkId::new);
                if let Some(id) = id {
                    set.ids.insert(id);
                }
            }
        }

        debug!("Found {} processed artwork(s) under {}", set.len(), root.display());
        Ok(set)
    }

    pub fn contains(&self, id: &ArtworkId) -> bool {
        self.ids.contains(id)
    }

    pub fn insert(&mut self, id: ArtworkId) -> bool {
        self.ids.insert(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_ids_from_index_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        for path in ["24-01-02/100", "24-01-02/101", "23-12-31/200"] {
            std::fs::create_dir_all(root.join(path)).unwrap();
            std::fs::write(root.join(path).join(INDEX_FILE), "id: x\n").unwrap();
        }
        // No index yet: an interrupted write must not count as processed.
        std::fs::create_dir_all(root.join("24-01-02/102/images")).unwrap();
        // Non-numeric directory names are ignored.
        std::fs::create_dir_all(root.join("24-01-02/notes")).unwrap();
        std::fs::write(root.join("24-01-02/notes").join(INDEX_FILE), "").unwrap();
        std::fs::write(root.join("README.md"), "").unwrap();

        let set = ProcessedSet::scan(root).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains(&ArtworkId::new("100").unwrap()));
        assert!(set.contains(&ArtworkId::new("200").unwrap()));
        assert!(!set.contains(&ArtworkId::new("102").unwrap()));
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let set = ProcessedSet::scan(&dir.path().join("absent")).unwrap();
        assert!(set.is_empty());
    }
}
