//! The notes list: the filtered `(key, note)` sequence and the UI store
//! mirroring it.
//!
//! Data flows `NotesDb -> NotesListModel -> ListStore`. Every `fill` replaces
//! the sequence and rebuilds the store from scratch.

use chrono::{DateTime, Local};

use crate::formatting::{escape_markup, human_date, note_title, note_title_search};
use crate::note::{ListedNote, Note};
use crate::notes_db::NotesDb;
use crate::tags::{note_pinned, tags_display};
use crate::ui::{ListRow, ListStore};

/// The ordered notes currently surfaced by the search.
#[derive(Debug, Default)]
pub struct NotesListModel {
    list: Vec<ListedNote>,
    match_pattern: String,
}

impl NotesListModel {
    pub fn set_list(&mut self, list: Vec<ListedNote>, match_pattern: String) {
        self.list = list;
        self.match_pattern = match_pattern;
    }

    pub fn list(&self) -> &[ListedNote] {
        &self.list
    }

    pub fn match_pattern(&self) -> &str {
        &self.match_pattern
    }

    /// Position of `key` in the current list.
    pub fn get_idx(&self, key: &str) -> Option<usize> {
        self.list.iter().position(|e| e.key == key)
    }
}

/// Build the list row for one note.
pub fn list_row(listed: &ListedNote, now: DateTime<Local>) -> ListRow {
    let note = &listed.note;
    ListRow {
        title: escape_markup(&note_title(note)),
        modified: human_date(note.modifydate, now),
        tags: tags_display(&note.tags),
        pinned: note_pinned(note),
        key: listed.key.clone(),
    }
}

/// What `close` found still outstanding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub save_queue: usize,
    pub sync_queue: usize,
    pub waiting_for_sync: bool,
    /// Confirmation text when work is outstanding.
    pub message: Option<String>,
}

impl ShutdownReport {
    pub fn is_busy(&self) -> bool {
        self.message.is_some()
    }
}

/// Status line such as `Saving 2 notes. Waiting to sync 3 notes.`; empty
/// when nothing is pending.
pub fn save_sync_msg(save_queue: usize, sync_queue: usize, waiting: bool) -> String {
    let mut parts = Vec::new();
    if save_queue > 0 {
        parts.push(format!("Saving {save_queue} notes."));
    }
    if sync_queue > 0 {
        parts.push(format!("Waiting to sync {sync_queue} notes."));
    }
    if waiting {
        parts.push("Syncing with simplenote server.".to_string());
    }
    parts.join(" ")
}

/// Binds a note database to a list store.
pub struct NotesList<D, S> {
    db: D,
    store: S,
    model: NotesListModel,
    sync_enabled: bool,
}

impl<D: NotesDb, S: ListStore> NotesList<D, S> {
    pub fn new(db: D, store: S, sync_enabled: bool) -> Self {
        Self { db, store, model: NotesListModel::default(), sync_enabled }
    }

    /// Refilter with `search_string` and rebuild the store. Returns the
    /// number of notes listed.
    pub fn fill(&mut self, search_string: Option<&str>) -> usize {
        let result = self.db.filter_notes(search_string);
        self.model.set_list(result.notes, result.match_pattern);

        self.store.clear();
        let now = Local::now();
        for listed in self.model.list() {
            self.store.append(list_row(listed, now));
        }
        tracing::debug!(
            listed = self.model.list().len(),
            active = result.active_count,
            "notes list filled"
        );
        self.model.list().len()
    }

    pub fn get_idx(&self, key: &str) -> Option<usize> {
        self.model.get_idx(key)
    }

    /// The listed note for `key`, or `None` when the key is not in the
    /// current list.
    pub fn get_note(&self, key: &str) -> Option<&Note> {
        self.get_idx(key).map(|idx| &self.model.list()[idx].note)
    }

    /// Find a non-deleted note whose first line is exactly `title`,
    /// whether or not it is in the current list.
    pub fn search_note_title(&self, title: &str) -> Option<ListedNote> {
        self.db
            .all_notes()
            .into_iter()
            .find(|n| !n.note.deleted && note_title_search(&n.note) == title)
    }

    pub fn model(&self) -> &NotesListModel {
        &self.model
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn db(&self) -> &D {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut D {
        &mut self.db
    }

    fn queue_state(&self) -> (usize, usize, bool) {
        let saven = self.db.get_save_queue_len();
        if self.sync_enabled {
            (saven, self.db.get_sync_queue_len(), self.db.waiting_for_sync())
        } else {
            (saven, 0, false)
        }
    }

    pub fn save_sync_status_msg(&self) -> String {
        let (saven, syncn, wfsn) = self.queue_state();
        save_sync_msg(saven, syncn, wfsn)
    }

    /// Queue outstanding saves and syncs, then report what is still pending.
    /// Exiting is allowed either way.
    pub fn close(&mut self) -> ShutdownReport {
        self.db.save_threaded();
        if self.sync_enabled {
            self.db.sync_to_server_threaded(false);
        }
        let (save_queue, sync_queue, waiting_for_sync) = self.queue_state();
        let message = (save_queue > 0 || sync_queue > 0 || waiting_for_sync).then(|| {
            format!(
                "Are you sure you want to exit? I'm still busy: {}",
                save_sync_msg(save_queue, sync_queue, waiting_for_sync)
            )
        });
        if message.is_none() {
            tracing::debug!("closing with empty queues");
        }
        ShutdownReport { save_queue, sync_queue, waiting_for_sync, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes_db::FilterResult;
    use crate::ui::MemoryListStore;

    /// Database stub with fixed notes and queue counters.
    #[derive(Default)]
    struct FakeDb {
        notes: Vec<ListedNote>,
        save_queue: usize,
        sync_queue: usize,
        waiting: bool,
        saves_requested: usize,
        syncs_requested: usize,
    }

    impl FakeDb {
        fn with(contents: &[(&str, &str)]) -> Self {
            let notes = contents
                .iter()
                .map(|(key, content)| ListedNote {
                    key: key.to_string(),
                    note: Note { content: content.to_string(), ..Default::default() },
                })
                .collect();
            Self { notes, ..Default::default() }
        }
    }

    impl NotesDb for FakeDb {
        fn filter_notes(&self, search: Option<&str>) -> FilterResult {
            let notes: Vec<ListedNote> = self
                .notes
                .iter()
                .filter(|n| !n.note.deleted)
                .filter(|n| search.is_none_or(|s| n.note.content.contains(s)))
                .cloned()
                .collect();
            FilterResult {
                notes,
                match_pattern: search.unwrap_or_default().to_string(),
                active_count: self.notes.len(),
            }
        }
        fn get_note(&self, key: &str) -> Option<Note> {
            self.notes.iter().find(|n| n.key == key).map(|n| n.note.clone())
        }
        fn all_notes(&self) -> Vec<ListedNote> {
            self.notes.clone()
        }
        fn create_note(&mut self, _content: &str) -> String {
            unimplemented!()
        }
        fn set_note_content(&mut self, _key: &str, _content: &str) -> bool {
            false
        }
        fn set_note_tags(&mut self, _key: &str, _tags: &str) -> bool {
            false
        }
        fn set_note_pinned(&mut self, _key: &str, _pinned: bool) -> bool {
            false
        }
        fn delete_note(&mut self, _key: &str) -> bool {
            false
        }
        fn save_threaded(&mut self) {
            self.saves_requested += 1;
        }
        fn sync_to_server_threaded(&mut self, wait_for_idle: bool) {
            assert!(!wait_for_idle);
            self.syncs_requested += 1;
        }
        fn get_save_queue_len(&self) -> usize {
            self.save_queue
        }
        fn get_sync_queue_len(&self) -> usize {
            self.sync_queue
        }
        fn waiting_for_sync(&self) -> bool {
            self.waiting
        }
    }

    fn list(db: FakeDb) -> NotesList<FakeDb, MemoryListStore> {
        NotesList::new(db, MemoryListStore::new(), true)
    }

    #[test]
    fn fill_rebuilds_store_each_time() {
        let mut nl = list(FakeDb::with(&[("a", "apple"), ("b", "banana"), ("c", "cherry")]));
        assert_eq!(nl.fill(None), 3);
        let first: Vec<ListRow> = nl.store().rows().to_vec();
        assert_eq!(nl.fill(None), 3);
        assert_eq!(nl.store().rows(), first.as_slice());
        assert_eq!(nl.store().clear_count(), 2);

        assert_eq!(nl.fill(Some("an")), 1);
        assert_eq!(nl.store().rows().len(), 1);
        assert_eq!(nl.store().rows()[0].key, "b");
        assert_eq!(nl.model().match_pattern(), "an");
    }

    #[test]
    fn rows_follow_database_order() {
        let mut nl = list(FakeDb::with(&[("z", "last"), ("a", "first")]));
        nl.fill(None);
        let keys: Vec<&str> = nl.store().rows().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn lookups_after_narrowing_fill() {
        let mut nl = list(FakeDb::with(&[("a", "apple"), ("b", "banana")]));
        nl.fill(None);
        assert_eq!(nl.get_idx("b"), Some(1));
        assert_eq!(nl.get_note("a").map(|n| n.content.as_str()), Some("apple"));

        nl.fill(Some("banana"));
        assert_eq!(nl.get_idx("a"), None);
        assert!(nl.get_note("a").is_none());
        assert_eq!(nl.get_idx("b"), Some(0));
        assert_eq!(nl.get_idx("missing"), None);
    }

    #[test]
    fn row_derivation_escapes_and_sanitises() {
        let listed = ListedNote {
            key: "k1".into(),
            note: Note {
                content: "a <b> & c\nmore".into(),
                tags: vec!["to do".into(), "x".into()],
                systemtags: vec!["pinned".into()],
                ..Default::default()
            },
        };
        let row = list_row(&listed, Local::now());
        assert_eq!(row.title, "a &lt;b&gt; &amp; c");
        assert_eq!(row.tags, "todo, x");
        assert!(row.pinned);
        assert_eq!(row.modified, "");
        assert_eq!(row.key, "k1");
    }

    #[test]
    fn search_note_title_skips_deleted() {
        let mut db = FakeDb::with(&[("a", "Target\nbody"), ("b", "Target\nother")]);
        db.notes[0].note.deleted = true;
        let mut nl = list(db);
        nl.fill(Some("nothing matches"));
        let found = nl.search_note_title("Target").unwrap();
        assert_eq!(found.key, "b");
        assert!(nl.search_note_title("Absent").is_none());
    }

    #[test]
    fn status_message_parts() {
        assert_eq!(save_sync_msg(0, 0, false), "");
        assert_eq!(save_sync_msg(2, 0, false), "Saving 2 notes.");
        assert_eq!(
            save_sync_msg(2, 3, true),
            "Saving 2 notes. Waiting to sync 3 notes. Syncing with simplenote server."
        );
    }

    #[test]
    fn close_reports_outstanding_work() {
        let mut db = FakeDb::with(&[]);
        db.save_queue = 1;
        db.waiting = true;
        let mut nl = list(db);
        let report = nl.close();
        assert!(report.is_busy());
        assert_eq!(
            report.message.as_deref(),
            Some(
                "Are you sure you want to exit? I'm still busy: Saving 1 notes. Syncing with simplenote server."
            )
        );
        assert_eq!(nl.db().saves_requested, 1);
        assert_eq!(nl.db().syncs_requested, 1);
    }

    #[test]
    fn close_without_sync_ignores_sync_queue() {
        let mut db = FakeDb::with(&[]);
        db.sync_queue = 4;
        let mut nl = NotesList::new(db, MemoryListStore::new(), false);
        let report = nl.close();
        assert!(!report.is_busy());
        assert_eq!(report.sync_queue, 0);
        assert_eq!(nl.db().syncs_requested, 0);
    }
}
