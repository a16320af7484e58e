use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the note database and the layers built on it.
#[derive(Error, Debug)]
pub enum NotesError {
    #[error("Could not read note database at '{path}': {message}")]
    Read { path: PathBuf, message: String },

    #[error("Could not write note '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Sync failed for note '{key}': {message}")]
    Sync { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid note document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl NotesError {
    /// Short text suitable for a status line or warning dialog.
    pub fn user_message(&self) -> String {
        match self {
            Self::Read { .. } => format!("Please check nvnotes.log.\n{self}"),
            Self::Sync { .. } => "Sync error; the note stays queued.".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NotesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_points_to_log() {
        let err = NotesError::Read {
            path: PathBuf::from("/tmp/db"),
            message: "bad json".to_string(),
        };
        let msg = err.user_message();
        assert!(msg.starts_with("Please check nvnotes.log."));
        assert!(msg.contains("bad json"));
    }

    #[test]
    fn io_errors_convert() {
        fn fails() -> Result<()> {
            Err(std::io::Error::other("disk gone"))?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(matches!(err, NotesError::Io(_)));
        assert_eq!(err.to_string(), "disk gone");
    }
}
