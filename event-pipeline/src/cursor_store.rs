//! Persisted poller cursor
//!
//! The cursor is saved after every advance so a restarted process resumes at
//! the page it was about to fetch instead of the configured starting URL.

use std::fs;
use std::path::{Path, PathBuf};

use events_api::Cursor;

use crate::error::CursorStoreError;

/// Plain-text file holding the next page URL
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved cursor, if one exists and is non-empty
    pub fn load(&self) -> Result<Option<Cursor>, CursorStoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|source| CursorStoreError::Read {
            path: self.path.clone(),
            source,
        })?;

        let url = content.trim();
        if url.is_empty() {
            return Ok(None);
        }

        Ok(Some(Cursor::new(url)))
    }

    /// Atomically replace the saved cursor
    pub fn save(&self, cursor: &Cursor) -> Result<(), CursorStoreError> {
        let write_err = |source: std::io::Error| CursorStoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, cursor.as_str()).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;

        tracing::trace!("Saved cursor to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("cursor"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("state/cursor"));

        let cursor = Cursor::new("https://events.example.com/events/me/token/?i=42");
        store.save(&cursor).unwrap();

        assert_eq!(store.load().unwrap(), Some(cursor));
        assert!(!dir.path().join("state/cursor.tmp").exists());
    }

    #[test]
    fn test_blank_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor");
        fs::write(&path, "  \n").unwrap();

        assert!(CursorStore::new(path).load().unwrap().is_none());
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("cursor"));

        store.save(&Cursor::new("https://a.example/1")).unwrap();
        store.save(&Cursor::new("https://a.example/2")).unwrap();

        assert_eq!(store.load().unwrap(), Some(Cursor::new("https://a.example/2")));
    }
}
