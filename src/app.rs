//! Controller wiring configuration, logging, the note database, the notes
//! list and the detail view together.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Result;
use crate::events::{Dispatcher, EventKind, UiEvent};
use crate::logging::LogContext;
use crate::note::Note;
use crate::notes_db::{LocalNotesDb, NotesDb, SyncTarget};
use crate::notes_list::{NotesList, ShutdownReport};
use crate::render::{DetailState, DetailView, LinkOpener, LinkOutcome};
use crate::tags::note_pinned;
use crate::ui::{ListRow, ListStore, MemoryListStore, MemoryNoteFields, MemoryTextBuffer};

/// Frontend hooks for messages that need the user's attention.
pub trait Prompt {
    fn warn(&mut self, title: &str, message: &str);
    /// Ask before exiting with work outstanding. The answer is recorded
    /// but exit proceeds either way.
    fn confirm(&mut self, message: &str) -> bool;
}

/// Directory holding the running executable, searched for `nvnotes.cfg`.
pub fn app_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

pub struct Controller {
    config: Config,
    log: LogContext,
    list: NotesList<LocalNotesDb, MemoryListStore>,
    detail: DetailView<MemoryTextBuffer, MemoryNoteFields>,
    opener: Box<dyn LinkOpener>,
    search: String,
    last_link: Option<LinkOutcome>,
    quit_requested: bool,
}

impl Controller {
    /// Open the database described by `config`. A database that cannot be
    /// read is logged and returned as an error; the caller exits.
    pub fn start(
        config: Config,
        log: LogContext,
        sync_target: Option<Box<dyn SyncTarget>>,
        opener: Box<dyn LinkOpener>,
    ) -> Result<Self> {
        let db = log.in_scope(|| {
            LocalNotesDb::open(&config, sync_target, log.dispatch()).inspect_err(|err| {
                tracing::error!(%err, "could not open note database");
            })
        })?;
        let sync_enabled = db.sync_enabled();
        let mut ctl = Self {
            config,
            log,
            list: NotesList::new(db, MemoryListStore::new(), sync_enabled),
            detail: DetailView::new(MemoryTextBuffer::new(), MemoryNoteFields::default()),
            opener,
            search: String::new(),
            last_link: None,
            quit_requested: false,
        };
        ctl.refresh();
        Ok(ctl)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn log(&self) -> &LogContext {
        &self.log
    }

    pub fn db(&self) -> &LocalNotesDb {
        self.list.db()
    }

    pub fn list(&self) -> &NotesList<LocalNotesDb, MemoryListStore> {
        &self.list
    }

    pub fn detail(&self) -> &DetailView<MemoryTextBuffer, MemoryNoteFields> {
        &self.detail
    }

    pub fn rows(&self) -> &[ListRow] {
        self.list.store().rows()
    }

    /// Regex source for what the current search matched, empty when
    /// nothing is searched.
    pub fn match_pattern(&self) -> &str {
        self.list.model().match_pattern()
    }

    pub fn search_text(&self) -> &str {
        &self.search
    }

    /// Outcome of the most recent link activation.
    pub fn last_link(&self) -> Option<&LinkOutcome> {
        self.last_link.as_ref()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn selected_key(&self) -> Option<&str> {
        match self.detail.state() {
            DetailState::Loaded(key) => Some(key),
            DetailState::Empty => None,
        }
    }

    pub fn show_startup_warnings(&self, prompt: &mut dyn Prompt) {
        for warning in self.config.warnings() {
            self.log.in_scope(|| tracing::warn!(title = %warning.title, "{}", warning.message));
            prompt.warn(&warning.title, &warning.message);
        }
    }

    /// Refill the list with the current search and redisplay the selected
    /// note when it is still listed.
    fn refresh(&mut self) -> usize {
        let search = (!self.search.trim().is_empty()).then_some(self.search.as_str());
        let count = self.log.in_scope(|| self.list.fill(search));
        if let Some(key) = self.selected_key().map(str::to_string) {
            self.select(&key);
        }
        count
    }

    pub fn set_search(&mut self, text: &str) -> usize {
        self.search = text.to_string();
        self.refresh()
    }

    /// Show the note for `key` from the current list; an unlisted key
    /// empties the detail view.
    pub fn select(&mut self, key: &str) -> bool {
        let note = self.list.get_note(key).cloned();
        self.log.in_scope(|| self.detail.select(key, note.as_ref(), &self.search));
        note.is_some()
    }

    /// Show `key` whether or not the current search lists it, highlighting
    /// `highlight`. Deleted and unknown keys empty the view.
    pub fn open_note(&mut self, key: &str, highlight: &str) -> bool {
        let note = self.note(key);
        self.log.in_scope(|| self.detail.select(key, note.as_ref(), highlight));
        note.is_some()
    }

    /// Select by 1-based row number.
    pub fn select_row(&mut self, number: usize) -> bool {
        let key = number
            .checked_sub(1)
            .and_then(|idx| self.rows().get(idx))
            .map(|row| row.key.clone());
        match key {
            Some(key) => self.select(&key),
            None => false,
        }
    }

    /// Activate link `number` of the selected note. A resolved note
    /// reference becomes the selection even when the search hides it.
    pub fn follow_link(&mut self, number: usize) -> LinkOutcome {
        let outcome = self.log.in_scope(|| {
            self.detail.activate_link(number, self.opener.as_mut(), |title| {
                self.list.search_note_title(title)
            })
        });
        if let LinkOutcome::Note(found) = &outcome {
            self.log.in_scope(|| {
                self.detail.select(&found.key, Some(&found.note), &self.search)
            });
        }
        self.last_link = Some(outcome.clone());
        outcome
    }

    fn after_change(&mut self, changed: bool) -> bool {
        if changed {
            self.list.db_mut().save_threaded();
            let selected = self.selected_key().map(str::to_string);
            self.refresh();
            // Edits keep the edited note on screen even when the search
            // no longer lists it.
            if let Some(key) = selected {
                let search = self.search.clone();
                self.open_note(&key, &search);
            }
        }
        changed
    }

    pub fn create_note(&mut self, content: &str, tags: Option<&str>) -> String {
        let db = self.list.db_mut();
        let key = db.create_note(content);
        if let Some(tags) = tags {
            db.set_note_tags(&key, tags);
        }
        self.after_change(true);
        key
    }

    pub fn append_to_note(&mut self, key: &str, text: &str) -> bool {
        let Some(mut content) = self.note(key).map(|n| n.content) else {
            return false;
        };
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(text);
        let found = self.list.db_mut().set_note_content(key, &content);
        self.after_change(found)
    }

    pub fn set_tags(&mut self, key: &str, tags: &str) -> bool {
        let found = self.list.db_mut().set_note_tags(key, tags);
        self.after_change(found)
    }

    pub fn set_pinned(&mut self, key: &str, pinned: bool) -> bool {
        let found = self.list.db_mut().set_note_pinned(key, pinned);
        self.after_change(found)
    }

    /// Flip the pinned flag of the selected note.
    pub fn toggle_pinned(&mut self) -> Option<bool> {
        let key = self.selected_key()?.to_string();
        let pinned = !self.db().get_note(&key).as_ref().is_some_and(note_pinned);
        self.set_pinned(&key, pinned).then_some(pinned)
    }

    pub fn delete_note(&mut self, key: &str) -> bool {
        let found = self.list.db_mut().delete_note(key);
        self.after_change(found)
    }

    /// Note lookup that ignores the current search.
    pub fn note(&self, key: &str) -> Option<Note> {
        self.db().get_note(key).filter(|n| !n.deleted)
    }

    pub fn status(&self) -> String {
        let listed = self.rows().len();
        let active = self.db().filter_notes(None).notes.len();
        let queues = self.list.save_sync_status_msg();
        let mut out = format!("{listed} of {active} notes listed.");
        if !queues.is_empty() {
            out.push(' ');
            out.push_str(&queues);
        }
        out
    }

    /// Queue unsaved notes and wait for the writer to finish them.
    pub fn flush_saves(&mut self) {
        self.list.db_mut().save_threaded();
        self.list.db().flush();
    }

    /// Queue outstanding work and ask the frontend to confirm when anything
    /// is still pending.
    pub fn shutdown(&mut self, prompt: &mut dyn Prompt) -> ShutdownReport {
        let report = self.log.in_scope(|| self.list.close());
        if let Some(message) = &report.message {
            let answer = prompt.confirm(message);
            self.log.in_scope(|| tracing::info!(answer, "{message}"));
        }
        report
    }
}

/// The controller plus the event routes a frontend drives it through.
pub struct App {
    pub controller: Controller,
    dispatcher: Dispatcher<Controller>,
}

impl App {
    pub fn new(controller: Controller) -> Self {
        let mut dispatcher = Dispatcher::new();
        dispatcher.subscribe(EventKind::SearchChanged, |c: &mut Controller, ev| {
            if let UiEvent::SearchChanged(text) = ev {
                c.set_search(text);
            }
        });
        dispatcher.subscribe(EventKind::RowActivated, |c: &mut Controller, ev| {
            if let UiEvent::RowActivated(key) = ev {
                c.select(key);
            }
        });
        dispatcher.subscribe(EventKind::LinkActivated, |c: &mut Controller, ev| {
            if let UiEvent::LinkActivated(n) = ev {
                c.follow_link(*n);
            }
        });
        dispatcher.subscribe(EventKind::PinToggled, |c: &mut Controller, ev| {
            if let (UiEvent::PinToggled(pinned), Some(key)) =
                (ev, c.selected_key().map(str::to_string))
            {
                c.set_pinned(&key, *pinned);
            }
        });
        dispatcher.subscribe(EventKind::TagsEdited, |c: &mut Controller, ev| {
            if let (UiEvent::TagsEdited(tags), Some(key)) =
                (ev, c.selected_key().map(str::to_string))
            {
                c.set_tags(&key, tags);
            }
        });
        dispatcher.subscribe(EventKind::Quit, |c: &mut Controller, _| {
            c.quit_requested = true;
        });
        Self { controller, dispatcher }
    }

    pub fn emit(&mut self, event: UiEvent) -> usize {
        self.dispatcher.emit(&mut self.controller, &event)
    }
}
