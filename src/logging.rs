//! File logging for the note database and frontends.
//!
//! Nothing here installs a global subscriber. [`LogContext::init`] builds a
//! [`Dispatch`] that the controller enters with [`LogContext::in_scope`];
//! background workers receive a clone through [`LogContext::dispatch`] and
//! enter it on their own thread.
//!
//! ```rust,ignore
//! let log = LogContext::init(&config.db_path)?;
//! log.in_scope(|| tracing::debug!("nvnotes logging initialized"));
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_FILE_NAME: &str = "nvnotes.log";
/// The log file is rotated once it would grow past this size.
pub const MAX_LOG_BYTES: u64 = 100_000;

/// Owns the dispatch used by every component plus the writer guard that
/// flushes the log file on drop.
pub struct LogContext {
    dispatch: Dispatch,
    log_path: Option<PathBuf>,
    _guard: Option<WorkerGuard>,
}

impl LogContext {
    /// Build a context that writes to `<dir>/nvnotes.log`, keeping one
    /// rotated backup next to it.
    pub fn init(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let log_path = dir.join(LOG_FILE_NAME);
        let writer = RotatingFile::open(&log_path, MAX_LOG_BYTES)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(writer);

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("debug"));
        let layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(false)
            .with_level(true);
        let subscriber = tracing_subscriber::registry().with(filter).with(layer);

        let ctx = Self {
            dispatch: Dispatch::new(subscriber),
            log_path: Some(log_path),
            _guard: Some(guard),
        };
        ctx.in_scope(|| tracing::debug!("nvnotes logging initialized"));
        Ok(ctx)
    }

    /// A context that drops every event. Used by tests and by commands that
    /// run before a database directory is known.
    pub fn disabled() -> Self {
        Self { dispatch: Dispatch::none(), log_path: None, _guard: None }
    }

    pub fn dispatch(&self) -> Dispatch {
        self.dispatch.clone()
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Run `f` with this context as the current thread's default subscriber.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

/// Size-capped log file. When the next write would push the file past
/// `max_bytes`, the current file becomes `<name>.1` and a fresh one starts.
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    file: File,
    written: u64,
}

impl RotatingFile {
    pub fn open(path: &Path, max_bytes: u64) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let written = file.metadata()?.len();
        Ok(Self { path: path.to_path_buf(), max_bytes, file, written })
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".1");
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        fs::rename(&self.path, self.backup_path())?;
        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
