//! Frontend events and the registry that routes them to handlers.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    SearchChanged(String),
    /// A list row was activated; carries the row's key.
    RowActivated(String),
    /// 1-based link number in the detail view.
    LinkActivated(usize),
    PinToggled(bool),
    TagsEdited(String),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SearchChanged,
    RowActivated,
    LinkActivated,
    PinToggled,
    TagsEdited,
    Quit,
}

impl UiEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            UiEvent::SearchChanged(_) => EventKind::SearchChanged,
            UiEvent::RowActivated(_) => EventKind::RowActivated,
            UiEvent::LinkActivated(_) => EventKind::LinkActivated,
            UiEvent::PinToggled(_) => EventKind::PinToggled,
            UiEvent::TagsEdited(_) => EventKind::TagsEdited,
            UiEvent::Quit => EventKind::Quit,
        }
    }
}

type Handler<S> = Box<dyn FnMut(&mut S, &UiEvent)>;

/// Handlers receive the state `S` they act on along with the event, so
/// nothing needs shared ownership of the controller.
pub struct Dispatcher<S> {
    handlers: HashMap<EventKind, Vec<Handler<S>>>,
}

impl<S> Default for Dispatcher<S> {
    fn default() -> Self {
        Self { handlers: HashMap::new() }
    }
}

impl<S> Dispatcher<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: EventKind, handler: impl FnMut(&mut S, &UiEvent) + 'static) {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    /// Run every handler subscribed to the event's kind, in subscription
    /// order. Returns how many ran.
    pub fn emit(&mut self, state: &mut S, event: &UiEvent) -> usize {
        let Some(handlers) = self.handlers.get_mut(&event.kind()) else {
            tracing::trace!(?event, "no handler");
            return 0;
        };
        for handler in handlers.iter_mut() {
            handler(state, event);
        }
        handlers.len()
    }

    pub fn has_handler(&self, kind: EventKind) -> bool {
        self.handlers.get(&kind).is_some_and(|h| !h.is_empty())
    }
}
