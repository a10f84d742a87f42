//! Append-only record of every event the processor has seen

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use events_api::Event;

use crate::error::ArchiveError;

/// Destination for raw events after processing
pub trait EventArchive: Send {
    fn record(&mut self, event: &Event) -> Result<(), ArchiveError>;
}

/// Newline-delimited JSON archive, one event per line
pub struct JsonlArchive {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlArchive {
    /// Open `path` for appending, creating it and its directory if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source: std::io::Error| ArchiveError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventArchive for JsonlArchive {
    fn record(&mut self, event: &Event) -> Result<(), ArchiveError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        self.writer
            .write_all(&line)
            .and_then(|_| self.writer.flush())
            .map_err(|source| ArchiveError::Io {
                path: self.path.clone(),
                source,
            })
    }
}
