use chrono::Local;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use crate::error::{NotesError, Result};

pub const KEY_TS_WIDTH: usize = 9;
pub const PINNED: &str = "pinned";

/// One note as stored on disk and exchanged with the sync service.
/// Timestamps are seconds since the Unix epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub modifydate: f64,
    #[serde(default)]
    pub createdate: f64,
    #[serde(default)]
    pub savedate: f64,
    #[serde(default)]
    pub syncdate: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub systemtags: Vec<String>,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub deleted: bool,
}

impl Note {
    pub fn new(content: impl Into<String>) -> Self {
        let now = now_ts();
        Self {
            content: content.into(),
            modifydate: now,
            createdate: now,
            ..Default::default()
        }
    }

    /// Mark the note as changed so the save and sync queues pick it up.
    pub fn touch(&mut self) {
        // Strictly increasing so two edits in the same tick both register.
        self.modifydate = now_ts().max(self.modifydate + 0.001);
    }

    pub fn needs_save(&self) -> bool {
        self.modifydate > self.savedate
    }

    pub fn needs_sync(&self) -> bool {
        self.modifydate > self.syncdate
    }
}

/// A note together with the key it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct ListedNote {
    pub key: String,
    pub note: Note,
}

// Service-format documents store `deleted` as 0/1.
fn bool_or_int<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(b) => Ok(b),
        serde_json::Value::Number(n) => Ok(n.as_f64().unwrap_or(0.0) != 0.0),
        serde_json::Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected bool or integer for deleted, got {other}"
        ))),
    }
}

pub fn now_ts() -> f64 {
    Local::now().timestamp_micros() as f64 / 1_000_000.0
}

pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

pub fn note_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

/// Write `<key>.json` through a temp file so a crash never leaves a
/// truncated document behind.
pub fn write_note(dir: &Path, key: &str, note: &Note) -> Result<()> {
    let io_err = |source| NotesError::Write { key: key.to_string(), source };
    let json = serde_json::to_string_pretty(note)?;
    let tmp = dir.join(format!(".{key}.json.tmp"));
    fs::write(&tmp, json).map_err(io_err)?;
    fs::rename(&tmp, note_path(dir, key)).map_err(io_err)?;
    Ok(())
}

pub fn parse_note(path: &Path) -> Result<ListedNote> {
    let raw = fs::read_to_string(path)?;
    let note: Note = serde_json::from_str(&raw)?;
    let key = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    Ok(ListedNote { key, note })
}

pub fn list_note_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let hidden = path
            .file_name()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.starts_with('.'));
        if entry.file_type()?.is_file()
            && !hidden
            && path.extension().and_then(|s| s.to_str()) == Some("json")
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[derive(Default)]
struct KeyState {
    last_ts: i64,
    counter: u32,
}

/// New local key: a base62 microsecond timestamp, suffixed with a counter
/// when several keys are minted in the same microsecond. Keys in `reserved`
/// or already present on disk are skipped.
pub fn generate_key(dir: &Path, reserved: &HashSet<String>) -> String {
    static KEY_STATE: OnceLock<Mutex<KeyState>> = OnceLock::new();
    let state = KEY_STATE.get_or_init(|| Mutex::new(KeyState::default()));

    let mut guard = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    loop {
        let now = Local::now().timestamp_micros();
        let ts = if now <= guard.last_ts { guard.last_ts } else { now };

        if ts == guard.last_ts {
            guard.counter = guard.counter.saturating_add(1);
        } else {
            guard.last_ts = ts;
            guard.counter = 0;
        }

        let ts_enc = encode_base62_width(ts.max(0) as u64, KEY_TS_WIDTH);
        let key = if guard.counter == 0 {
            ts_enc
        } else {
            format!("{ts_enc}{}", encode_base62(guard.counter as u64))
        };

        if !reserved.contains(&key) && !note_path(dir, &key).exists() {
            return key;
        }
    }
}

fn encode_base62(num: u64) -> String {
    const ALPHABET: &[u8] =
        b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    if num == 0 {
        return "0".to_string();
    }
    let mut n = num;
    let base = ALPHABET.len() as u64;
    let mut out = Vec::new();
    while n > 0 {
        out.push(ALPHABET[(n % base) as usize] as char);
        n /= base;
    }
    out.iter().rev().collect()
}

fn encode_base62_width(num: u64, width: usize) -> String {
    let base = encode_base62(num);
    if base.len() >= width {
        base
    } else {
        format!("{}{}", "0".repeat(width - base.len()), base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_service_format_deleted_flag() {
        let raw = r#"{"content":"x","modifydate":"1","deleted":1}"#;
        // modifydate as a string is not accepted
        assert!(serde_json::from_str::<Note>(raw).is_err());

        let raw = r#"{"content":"x","modifydate":1.5,"deleted":1,"tags":["a"]}"#;
        let note: Note = serde_json::from_str(raw).unwrap();
        assert!(note.deleted);
        assert_eq!(note.tags, vec!["a"]);
        assert!(note.systemtags.is_empty());

        let note: Note = serde_json::from_str(r#"{"deleted":false}"#).unwrap();
        assert!(!note.deleted);
        assert_eq!(note.content, "");
    }

    #[test]
    fn write_then_parse_keeps_key() {
        let tmp = tempdir().unwrap();
        let note = Note::new("hello\nworld");
        write_note(tmp.path(), "abc", &note).unwrap();
        let files = list_note_files(tmp.path()).unwrap();
        assert_eq!(files.len(), 1);
        let listed = parse_note(&files[0]).unwrap();
        assert_eq!(listed.key, "abc");
        assert_eq!(listed.note, note);
    }

    #[test]
    fn keys_are_unique_within_a_burst() {
        let tmp = tempdir().unwrap();
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let key = generate_key(tmp.path(), &seen);
            assert!(key.len() >= KEY_TS_WIDTH);
            assert!(seen.insert(key));
        }
    }

    #[test]
    fn touch_marks_dirty() {
        let mut note = Note::new("a");
        note.savedate = note.modifydate;
        note.syncdate = note.modifydate;
        assert!(!note.needs_save());
        note.touch();
        assert!(note.needs_save());
        assert!(note.needs_sync());
    }
}
