//! Filesystem image sink.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::Result;
use crate::types::TurnResult;

use super::ImageStore;

/// Writes images into a flat directory, one unique file per call.
pub struct DirImageStore {
    dir: PathBuf,
}

impl DirImageStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Store rooted at the configured image directory.
    pub fn from_config(config: &crate::config::NormalizerConfig) -> Self {
        Self::new(config.image_dir.clone())
    }
}

impl ImageStore for DirImageStore {
    fn reserve_path(&self, turn: &TurnResult) -> Result<PathBuf> {
        Ok(self.dir.join(format!("{}-{}.png", turn.id, Uuid::new_v4())))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

/// Image sink that reserves throwaway paths and drops the bytes; for callers
/// that do not keep generated images.
pub struct DiscardImages;

impl ImageStore for DiscardImages {
    fn reserve_path(&self, turn: &TurnResult) -> Result<PathBuf> {
        Ok(std::env::temp_dir().join(format!("{}-{}.png", turn.id, Uuid::new_v4())))
    }

    fn write(&self, _path: &Path, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_paths_are_unique_and_writable() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = DirImageStore::new(dir.path().join("nested"));
        let turn = TurnResult::new();

        let first = store.reserve_path(&turn).unwrap();
        let second = store.reserve_path(&turn).unwrap();
        assert_ne!(first, second);

        store.write(&first, b"bytes").unwrap();
        assert_eq!(std::fs::read(&first).unwrap(), b"bytes");
    }
}
