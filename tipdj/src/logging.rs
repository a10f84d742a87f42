//! Logging setup
//!
//! Logs always go to stderr. When a log file is configured they are also
//! written there, uncoloured, through a size-rotating writer that keeps
//! `name`, `name.1` ... `name.N`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::LoggingSettings;
use crate::error::LoggingError;

/// Environment variable that overrides every other level setting
pub const ENV_LOG_LEVEL: &str = "TIPDJ_LOG_LEVEL";

/// Initialize the global subscriber
///
/// `level` is the fallback used when neither `TIPDJ_LOG_LEVEL` nor `RUST_LOG`
/// is set; callers pass the CLI flag or the configured level.
pub fn init_logging(settings: &LoggingSettings, level: &str) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = create_env_filter(level);

    let file_layer = match &settings.file {
        Some(path) => {
            let writer = RotatingFileWriter::open(
                path,
                settings.max_size_mb.saturating_mul(1024 * 1024),
                settings.backup_count,
            )
            .map_err(|source| LoggingError::File {
                path: path.clone(),
                source,
            })?;
            Some(fmt::layer().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    Registry::default()
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_names(true)
                .with_writer(io::stderr)
                .compact(),
        )
        .with(file_layer)
        .with(filter)
        .try_init()
        .map_err(|e| LoggingError::TracingInit(e.to_string()))
}

/// First of `TIPDJ_LOG_LEVEL`, `RUST_LOG`, then `default_level`
fn create_env_filter(default_level: &str) -> EnvFilter {
    if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
        EnvFilter::new(level)
    } else if let Ok(rust_log) = std::env::var("RUST_LOG") {
        EnvFilter::new(rust_log)
    } else {
        EnvFilter::new(default_level)
    }
}

struct RotatingState {
    file: File,
    written: u64,
}

/// Append-only log file that rolls over at a size limit
///
/// A `max_bytes` of zero disables rotation. With `backups` of zero the file is
/// truncated instead of rolled.
pub struct RotatingFileWriter {
    path: PathBuf,
    max_bytes: u64,
    backups: u32,
    state: Mutex<RotatingState>,
}

impl RotatingFileWriter {
    pub fn open(path: impl AsRef<Path>, max_bytes: u64, backups: u32) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            path,
            max_bytes,
            backups,
            state: Mutex::new(RotatingState { file, written }),
        })
    }

    fn backup_path(&self, index: u32) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn write_record(&self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();

        let incoming = buf.len() as u64;
        if self.max_bytes > 0 && state.written > 0 && state.written + incoming > self.max_bytes {
            self.rotate(&mut state)?;
        }

        state.file.write_all(buf)?;
        state.written += incoming;
        Ok(buf.len())
    }

    fn rotate(&self, state: &mut RotatingState) -> io::Result<()> {
        state.file.flush()?;

        if self.backups > 0 {
            let oldest = self.backup_path(self.backups);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for index in (1..self.backups).rev() {
                let from = self.backup_path(index);
                if from.exists() {
                    fs::rename(&from, self.backup_path(index + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
        }

        state.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        state.written = 0;
        Ok(())
    }
}

/// Per-event handle returned by [`MakeWriter`]
pub struct RotatingWriterHandle<'a> {
    writer: &'a RotatingFileWriter,
}

impl Write for RotatingWriterHandle<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write_record(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.state.lock().file.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingFileWriter {
    type Writer = RotatingWriterHandle<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriterHandle { writer: self }
    }
}
