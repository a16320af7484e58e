//! Local note database with background save and sync queues.
//!
//! Notes live in memory, keyed by their local key, and are persisted as one
//! JSON document per note. A note is on the save queue while its
//! `modifydate` is newer than its `savedate`, and on the sync queue while it
//! is newer than its `syncdate`. Both queues are drained on worker threads.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tracing::Dispatch;

use crate::config::{Config, SortMode};
use crate::error::{NotesError, Result};
use crate::formatting::{note_title, note_title_search};
use crate::note::{
    ListedNote, Note, ensure_dir, generate_key, list_note_files, parse_note, write_note,
};
use crate::search::{Matcher, SearchOptions};
use crate::tags::{note_pinned, sanitise_tags, set_pinned};

/// Result of [`NotesDb::filter_notes`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterResult {
    pub notes: Vec<ListedNote>,
    /// Regex source for highlighting what the search matched.
    pub match_pattern: String,
    /// Number of notes that are not deleted, whether or not they matched.
    pub active_count: usize,
}

/// The contract the list adapter and controller rely on.
pub trait NotesDb {
    fn filter_notes(&self, search: Option<&str>) -> FilterResult;
    fn get_note(&self, key: &str) -> Option<Note>;
    /// Every note including deleted ones, ordered by key.
    fn all_notes(&self) -> Vec<ListedNote>;

    fn create_note(&mut self, content: &str) -> String;
    fn set_note_content(&mut self, key: &str, content: &str) -> bool;
    fn set_note_tags(&mut self, key: &str, tags: &str) -> bool;
    fn set_note_pinned(&mut self, key: &str, pinned: bool) -> bool;
    fn delete_note(&mut self, key: &str) -> bool;

    /// Queue every unsaved note for the background writer.
    fn save_threaded(&mut self);
    /// Push unsynced notes to the sync target on a background thread.
    /// With `wait_for_idle`, a run already in progress is waited for first;
    /// otherwise the call returns without starting a second run.
    fn sync_to_server_threaded(&mut self, wait_for_idle: bool);
    fn get_save_queue_len(&self) -> usize;
    fn get_sync_queue_len(&self) -> usize;
    fn waiting_for_sync(&self) -> bool;
}

/// Remote note service. Implementations push one note at a time.
pub trait SyncTarget: Send {
    fn push(&mut self, key: &str, note: &Note) -> Result<()>;
}

enum SaveMsg {
    Save { key: String, note: Note },
    Flush(Sender<()>),
}

type NoteMap = Arc<Mutex<BTreeMap<String, Note>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct LocalNotesDb {
    db_path: PathBuf,
    options: SearchOptions,
    sort_mode: SortMode,
    pinned_ontop: bool,
    sync_enabled: bool,

    notes: NoteMap,
    /// key -> modifydate of the version handed to the writer.
    saving: Arc<Mutex<HashMap<String, f64>>>,
    save_tx: Option<Sender<SaveMsg>>,
    save_worker: Option<JoinHandle<()>>,

    sync_target: Option<Arc<Mutex<Box<dyn SyncTarget>>>>,
    waiting_for_sync: Arc<AtomicBool>,
    sync_worker: Option<JoinHandle<()>>,
    dispatch: Dispatch,
}

impl LocalNotesDb {
    /// Load every note under `config.db_path`. A document that cannot be
    /// read or parsed fails the whole open.
    pub fn open(
        config: &Config,
        sync_target: Option<Box<dyn SyncTarget>>,
        dispatch: Dispatch,
    ) -> Result<Self> {
        let db_path = config.db_path.clone();
        let read_err = |message: String| NotesError::Read { path: db_path.clone(), message };

        ensure_dir(&db_path).map_err(|e| read_err(e.to_string()))?;
        let mut notes = BTreeMap::new();
        for path in list_note_files(&db_path).map_err(|e| read_err(e.to_string()))? {
            let listed = parse_note(&path)
                .map_err(|e| read_err(format!("{}: {e}", path.display())))?;
            notes.insert(listed.key, listed.note);
        }
        tracing::info!(count = notes.len(), db_path = %db_path.display(), "notes loaded");

        let sync_enabled = config.simplenote_sync && sync_target.is_some();
        if config.simplenote_sync && sync_target.is_none() {
            tracing::warn!("sync is enabled but no sync target is available; notes stay local");
        }

        let notes: NoteMap = Arc::new(Mutex::new(notes));
        let saving = Arc::new(Mutex::new(HashMap::new()));
        let txt_path = config.notes_as_txt.then(|| config.txt_path.clone());
        let (save_tx, save_rx) = mpsc::channel();
        let save_worker = spawn_save_worker(
            save_rx,
            SaveWorker {
                db_path: db_path.clone(),
                txt_path,
                notes: Arc::clone(&notes),
                saving: Arc::clone(&saving),
            },
            dispatch.clone(),
        );

        Ok(Self {
            db_path,
            options: SearchOptions::from_config(config),
            sort_mode: config.sort_mode,
            pinned_ontop: config.pinned_ontop,
            sync_enabled,
            notes,
            saving,
            save_tx: Some(save_tx),
            save_worker: Some(save_worker),
            sync_target: sync_target.map(|t| Arc::new(Mutex::new(t))),
            waiting_for_sync: Arc::new(AtomicBool::new(false)),
            sync_worker: None,
            dispatch,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn sync_enabled(&self) -> bool {
        self.sync_enabled
    }

    /// Block until every save queued so far has been written.
    pub fn flush(&self) {
        let Some(tx) = &self.save_tx else { return };
        let (done_tx, done_rx) = mpsc::channel();
        if tx.send(SaveMsg::Flush(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
    }

    /// Block until the current sync run, if any, has finished.
    pub fn wait_for_sync(&mut self) {
        if let Some(handle) = self.sync_worker.take() {
            let _ = handle.join();
        }
    }

    fn update(&mut self, key: &str, f: impl FnOnce(&mut Note) -> bool) -> bool {
        let mut notes = lock(&self.notes);
        match notes.get_mut(key) {
            Some(note) if !note.deleted => {
                if f(note) {
                    note.touch();
                }
                true
            }
            _ => false,
        }
    }

    fn sort(&self, notes: &mut [ListedNote]) {
        match self.sort_mode {
            SortMode::Alphabetical => notes.sort_by(|a, b| {
                note_title(&a.note)
                    .to_lowercase()
                    .cmp(&note_title(&b.note).to_lowercase())
                    .then_with(|| a.key.cmp(&b.key))
            }),
            SortMode::LastModified => notes.sort_by(|a, b| {
                b.note
                    .modifydate
                    .total_cmp(&a.note.modifydate)
                    .then_with(|| a.key.cmp(&b.key))
            }),
        }
        if self.pinned_ontop {
            // Stable, so the order within each group is kept.
            notes.sort_by_key(|n| !note_pinned(&n.note));
        }
    }
}

impl NotesDb for LocalNotesDb {
    fn filter_notes(&self, search: Option<&str>) -> FilterResult {
        let matcher = Matcher::build(search, self.options);
        let notes = lock(&self.notes);
        let mut active_count = 0;
        let mut matched = Vec::new();
        for (key, note) in notes.iter() {
            if note.deleted {
                continue;
            }
            active_count += 1;
            if matcher.matches(note) {
                matched.push(ListedNote { key: key.clone(), note: note.clone() });
            }
        }
        drop(notes);
        self.sort(&mut matched);
        FilterResult { notes: matched, match_pattern: matcher.pattern(), active_count }
    }

    fn get_note(&self, key: &str) -> Option<Note> {
        lock(&self.notes).get(key).cloned()
    }

    fn all_notes(&self) -> Vec<ListedNote> {
        lock(&self.notes)
            .iter()
            .map(|(key, note)| ListedNote { key: key.clone(), note: note.clone() })
            .collect()
    }

    fn create_note(&mut self, content: &str) -> String {
        let mut notes = lock(&self.notes);
        let reserved: HashSet<String> = notes.keys().cloned().collect();
        let key = generate_key(&self.db_path, &reserved);
        notes.insert(key.clone(), Note::new(content));
        tracing::debug!(key = %key, "note created");
        key
    }

    fn set_note_content(&mut self, key: &str, content: &str) -> bool {
        self.update(key, |note| {
            if note.content == content {
                return false;
            }
            note.content = content.to_string();
            true
        })
    }

    fn set_note_tags(&mut self, key: &str, tags: &str) -> bool {
        let tags = sanitise_tags(tags);
        self.update(key, |note| {
            if note.tags == tags {
                return false;
            }
            note.tags = tags;
            true
        })
    }

    fn set_note_pinned(&mut self, key: &str, pinned: bool) -> bool {
        self.update(key, |note| set_pinned(note, pinned))
    }

    fn delete_note(&mut self, key: &str) -> bool {
        self.update(key, |note| {
            note.deleted = true;
            true
        })
    }

    fn save_threaded(&mut self) {
        let Some(tx) = &self.save_tx else { return };
        let notes = lock(&self.notes);
        let mut saving = lock(&self.saving);
        let mut queued = 0;
        for (key, note) in notes.iter().filter(|(_, n)| n.needs_save()) {
            if saving.get(key) == Some(&note.modifydate) {
                continue;
            }
            saving.insert(key.clone(), note.modifydate);
            if tx.send(SaveMsg::Save { key: key.clone(), note: note.clone() }).is_err() {
                saving.remove(key);
                tracing::error!(key = %key, "save worker is gone; note not queued");
                continue;
            }
            queued += 1;
        }
        if queued > 0 {
            tracing::debug!(queued, "notes queued for saving");
        }
    }

    fn sync_to_server_threaded(&mut self, wait_for_idle: bool) {
        if !self.sync_enabled {
            return;
        }
        let Some(target) = self.sync_target.clone() else { return };
        if self.waiting_for_sync.load(Ordering::SeqCst) {
            if !wait_for_idle {
                return;
            }
            self.wait_for_sync();
        }

        let pending: Vec<ListedNote> = lock(&self.notes)
            .iter()
            .filter(|(_, n)| n.needs_sync())
            .map(|(key, note)| ListedNote { key: key.clone(), note: note.clone() })
            .collect();
        if pending.is_empty() {
            return;
        }

        let Some(save_tx) = self.save_tx.clone() else { return };
        let notes = Arc::clone(&self.notes);
        let saving = Arc::clone(&self.saving);
        let waiting = Arc::clone(&self.waiting_for_sync);
        let dispatch = self.dispatch.clone();
        waiting.store(true, Ordering::SeqCst);

        self.sync_worker = Some(thread::spawn(move || {
            tracing::dispatcher::with_default(&dispatch, || {
                let mut target = lock(&target);
                for listed in pending {
                    if let Err(err) = target.push(&listed.key, &listed.note) {
                        tracing::error!(key = %listed.key, %err, "sync failed");
                        continue;
                    }
                    let mut notes = lock(&notes);
                    let Some(note) = notes.get_mut(&listed.key) else { continue };
                    note.syncdate = listed.note.modifydate;
                    // Persist the new syncdate alongside the note.
                    let snapshot = note.clone();
                    drop(notes);
                    lock(&saving).insert(listed.key.clone(), snapshot.modifydate);
                    let _ = save_tx.send(SaveMsg::Save { key: listed.key, note: snapshot });
                }
                waiting.store(false, Ordering::SeqCst);
                tracing::debug!("sync run finished");
            })
        }));
    }

    fn get_save_queue_len(&self) -> usize {
        lock(&self.saving).len()
    }

    fn get_sync_queue_len(&self) -> usize {
        if !self.sync_enabled {
            return 0;
        }
        lock(&self.notes).values().filter(|n| n.needs_sync()).count()
    }

    fn waiting_for_sync(&self) -> bool {
        self.waiting_for_sync.load(Ordering::SeqCst)
    }
}

impl Drop for LocalNotesDb {
    fn drop(&mut self) {
        self.wait_for_sync();
        self.save_tx = None;
        if let Some(handle) = self.save_worker.take() {
            let _ = handle.join();
        }
    }
}

struct SaveWorker {
    db_path: PathBuf,
    txt_path: Option<PathBuf>,
    notes: NoteMap,
    saving: Arc<Mutex<HashMap<String, f64>>>,
}

impl SaveWorker {
    fn save(&self, key: &str, mut note: Note) -> Result<()> {
        let saved_at = note.modifydate;
        note.savedate = saved_at;
        write_note(&self.db_path, key, &note)?;
        if let Some(dir) = &self.txt_path {
            if !note.deleted {
                ensure_dir(dir)?;
                fs::write(dir.join(txt_file_name(key, &note)), &note.content)?;
            }
        }
        if let Some(current) = lock(&self.notes).get_mut(key) {
            current.savedate = current.savedate.max(saved_at);
        }
        Ok(())
    }
}

fn spawn_save_worker(
    rx: Receiver<SaveMsg>,
    worker: SaveWorker,
    dispatch: Dispatch,
) -> JoinHandle<()> {
    thread::spawn(move || {
        tracing::dispatcher::with_default(&dispatch, || {
            for msg in rx {
                match msg {
                    SaveMsg::Save { key, note } => {
                        let version = note.modifydate;
                        match worker.save(&key, note) {
                            Ok(()) => tracing::debug!(key = %key, "note saved"),
                            Err(err) => tracing::error!(key = %key, %err, "note save failed"),
                        }
                        let mut saving = lock(&worker.saving);
                        if saving.get(&key) == Some(&version) {
                            saving.remove(&key);
                        }
                    }
                    SaveMsg::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        })
    })
}

/// File name for the plain-text copy of a note: its title with path-hostile
/// characters replaced, falling back to the key.
pub fn txt_file_name(key: &str, note: &Note) -> String {
    let title: String = note_title_search(note)
        .chars()
        .map(|c| if c.is_alphanumeric() || " -_".contains(c) { c } else { '_' })
        .collect();
    let title = title.trim();
    if title.is_empty() {
        format!("{key}.txt")
    } else {
        format!("{title}.txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchMode;
    use tempfile::{TempDir, tempdir};

    fn config(tmp: &TempDir) -> Config {
        let mut cfg = Config::load_from(Path::new("/x"), tmp.path(), &[]).unwrap();
        cfg.db_path = tmp.path().join("db");
        cfg.txt_path = tmp.path().join("txt");
        cfg
    }

    fn open(cfg: &Config) -> LocalNotesDb {
        LocalNotesDb::open(cfg, None, Dispatch::none()).unwrap()
    }

    #[derive(Clone, Default)]
    struct RecordingTarget {
        pushed: Arc<Mutex<Vec<String>>>,
        offline: bool,
    }

    impl SyncTarget for RecordingTarget {
        fn push(&mut self, key: &str, _note: &Note) -> Result<()> {
            if self.offline {
                return Err(NotesError::Sync { key: key.into(), message: "offline".into() });
            }
            lock(&self.pushed).push(key.to_string());
            Ok(())
        }
    }

    #[test]
    fn save_queue_drains_and_persists() {
        let tmp = tempdir().unwrap();
        let cfg = config(&tmp);
        let mut db = open(&cfg);
        let key = db.create_note("first line\nbody");
        db.set_note_tags(&key, "a, b");
        db.save_threaded();
        db.flush();
        assert_eq!(db.get_save_queue_len(), 0);
        assert!(!db.get_note(&key).unwrap().needs_save());
        drop(db);

        let db = open(&cfg);
        let note = db.get_note(&key).unwrap();
        assert_eq!(note.content, "first line\nbody");
        assert_eq!(note.tags, vec!["a", "b"]);
    }

    #[test]
    fn corrupt_document_fails_open() {
        let tmp = tempdir().unwrap();
        let cfg = config(&tmp);
        fs::create_dir_all(&cfg.db_path).unwrap();
        fs::write(cfg.db_path.join("bad.json"), "{not json").unwrap();
        let err = LocalNotesDb::open(&cfg, None, Dispatch::none()).err().unwrap();
        assert!(matches!(err, NotesError::Read { .. }));
    }

    #[test]
    fn filter_skips_deleted_and_counts_active() {
        let tmp = tempdir().unwrap();
        let mut db = open(&config(&tmp));
        let a = db.create_note("apple pie");
        let _b = db.create_note("banana bread");
        let c = db.create_note("apple crumble");
        db.delete_note(&c);

        let result = db.filter_notes(Some("apple"));
        assert_eq!(result.active_count, 2);
        assert_eq!(result.notes.len(), 1);
        assert_eq!(result.notes[0].key, a);
        assert_eq!(result.match_pattern, "apple");
        assert_eq!(db.filter_notes(None).notes.len(), 2);
    }

    #[test]
    fn sorting_puts_pinned_first() {
        let tmp = tempdir().unwrap();
        let mut cfg = config(&tmp);
        cfg.sort_mode = SortMode::Alphabetical;
        let mut db = open(&cfg);
        let c = db.create_note("cherry");
        let a = db.create_note("apple");
        let b = db.create_note("banana");
        db.set_note_pinned(&c, true);

        let keys: Vec<String> = db.filter_notes(None).notes.into_iter().map(|n| n.key).collect();
        assert_eq!(keys, vec![c.clone(), a.clone(), b.clone()]);

        cfg.pinned_ontop = false;
        let mut db2 = open(&cfg);
        db2.create_note("zeta");
        db2.create_note("alpha");
        let titles: Vec<String> =
            db2.filter_notes(None).notes.iter().map(|n| note_title(&n.note)).collect();
        assert_eq!(titles, vec!["alpha", "zeta"]);
    }

    #[test]
    fn last_modified_first() {
        let tmp = tempdir().unwrap();
        let mut db = open(&config(&tmp));
        let old = db.create_note("old");
        let new = db.create_note("new");
        db.set_note_content(&old, "old, edited");
        let keys: Vec<String> = db.filter_notes(None).notes.into_iter().map(|n| n.key).collect();
        assert_eq!(keys, vec![old, new]);
    }

    #[test]
    fn regexp_mode_from_config() {
        let tmp = tempdir().unwrap();
        let mut cfg = config(&tmp);
        cfg.search_mode = SearchMode::Regexp;
        let mut db = open(&cfg);
        db.create_note("todo: call");
        db.create_note("done");
        assert_eq!(db.filter_notes(Some("^todo")).notes.len(), 1);
        assert_eq!(db.filter_notes(Some("[")).notes.len(), 2);
    }

    #[test]
    fn txt_copies_when_enabled() {
        let tmp = tempdir().unwrap();
        let mut cfg = config(&tmp);
        cfg.notes_as_txt = true;
        let mut db = open(&cfg);
        db.create_note("Plan: week/1\nitems");
        db.save_threaded();
        db.flush();
        let copy = cfg.txt_path.join("Plan_ week_1.txt");
        assert_eq!(fs::read_to_string(copy).unwrap(), "Plan: week/1\nitems");
    }

    #[test]
    fn sync_pushes_and_stamps_syncdate() {
        let tmp = tempdir().unwrap();
        let mut cfg = config(&tmp);
        cfg.simplenote_sync = true;
        let target = RecordingTarget::default();
        let pushed = Arc::clone(&target.pushed);
        let mut db = LocalNotesDb::open(&cfg, Some(Box::new(target)), Dispatch::none()).unwrap();
        let key = db.create_note("sync me");
        assert_eq!(db.get_sync_queue_len(), 1);

        db.sync_to_server_threaded(false);
        db.wait_for_sync();
        db.flush();
        assert!(!db.waiting_for_sync());
        assert_eq!(lock(&pushed).as_slice(), &[key.clone()]);
        assert_eq!(db.get_sync_queue_len(), 0);
        assert_eq!(db.get_save_queue_len(), 0);
    }

    #[test]
    fn failed_sync_keeps_note_queued() {
        let tmp = tempdir().unwrap();
        let mut cfg = config(&tmp);
        cfg.simplenote_sync = true;
        let target = RecordingTarget { offline: true, ..Default::default() };
        let mut db = LocalNotesDb::open(&cfg, Some(Box::new(target)), Dispatch::none()).unwrap();
        db.create_note("y");
        db.sync_to_server_threaded(true);
        db.wait_for_sync();
        assert!(!db.waiting_for_sync());
        assert_eq!(db.get_sync_queue_len(), 1);
    }

    #[test]
    fn sync_disabled_without_target() {
        let tmp = tempdir().unwrap();
        let mut cfg = config(&tmp);
        cfg.simplenote_sync = true;
        let mut db = open(&cfg);
        db.create_note("x");
        assert!(!db.sync_enabled());
        db.sync_to_server_threaded(false);
        assert_eq!(db.get_sync_queue_len(), 0);
        assert!(!db.waiting_for_sync());
    }

    #[test]
    fn unknown_keys_report_false() {
        let tmp = tempdir().unwrap();
        let mut db = open(&config(&tmp));
        assert!(!db.set_note_content("nope", "x"));
        assert!(!db.set_note_pinned("nope", true));
        assert!(!db.delete_note("nope"));
        assert!(db.get_note("nope").is_none());
    }

    #[test]
    fn deleted_notes_are_not_edited() {
        let tmp = tempdir().unwrap();
        let mut db = open(&config(&tmp));
        let key = db.create_note("gone");
        assert!(db.delete_note(&key));
        db.save_threaded();
        db.flush();
        let before = db.get_note(&key).unwrap();

        assert!(!db.set_note_content(&key, "gone\nmore"));
        assert!(!db.set_note_tags(&key, "x"));
        assert!(!db.set_note_pinned(&key, true));
        assert!(!db.delete_note(&key));

        let after = db.get_note(&key).unwrap();
        assert_eq!(after.content, "gone");
        assert!(after.tags.is_empty());
        assert!(after.systemtags.is_empty());
        assert_eq!(after.modifydate, before.modifydate);
        assert_eq!(db.get_save_queue_len(), 0);
    }
}
