//! Page action bindings
//!
//! The interpreter never touches the page. It returns a [`PageAction`] and the
//! controller runs it through [`ActionBindings`], which degrade to best-effort
//! fallbacks instead of failing.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::bus::CommandBus;
use crate::config::ScrollConfig;

/// Attribute a section element may carry instead of an id
pub const SECTION_ATTRIBUTE: &str = "data-category";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollEdge {
    Top,
    Bottom,
}

/// Something the interpreter wants done to the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
    /// Vertical scroll in pixels, positive is down
    ScrollBy(i32),
    ScrollTo(ScrollEdge),
    FocusSection(String),
    Navigate(String),
    Search(String),
    /// Run a handler registered on the command bus
    Dispatch { command: String, argument: String },
}

impl fmt::Display for PageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageAction::ScrollBy(delta) => write!(f, "scroll by {delta}"),
            PageAction::ScrollTo(ScrollEdge::Top) => write!(f, "scroll to top"),
            PageAction::ScrollTo(ScrollEdge::Bottom) => write!(f, "scroll to bottom"),
            PageAction::FocusSection(id) => write!(f, "focus section {id}"),
            PageAction::Navigate(path) => write!(f, "navigate {path}"),
            PageAction::Search(term) => write!(f, "search {term:?}"),
            PageAction::Dispatch { command, argument } if argument.is_empty() => {
                write!(f, "dispatch {command}")
            }
            PageAction::Dispatch { command, argument } => {
                write!(f, "dispatch {command} {argument:?}")
            }
        }
    }
}

/// Opaque handle to an element returned by a [`Page`] lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(pub String);

/// DOM query and manipulation capability
pub trait Page: Send {
    fn scroll_by(&mut self, delta: i32);
    /// Absolute scroll position in pixels
    fn scroll_to(&mut self, top: i32);
    fn document_height(&self) -> i32;
    fn find_by_id(&self, id: &str) -> Option<ElementRef>;
    fn find_by_attribute(&self, name: &str, value: &str) -> Option<ElementRef>;
    /// The page's search input, if any
    fn find_search_field(&self) -> Option<ElementRef>;
    fn scroll_into_view(&mut self, element: &ElementRef);
    fn focus(&mut self, element: &ElementRef);
    fn set_value(&mut self, element: &ElementRef, value: &str);
    /// Submit the form that contains `element`. Returns false if there is none.
    fn submit_enclosing_form(&mut self, element: &ElementRef) -> bool;
}

/// Route change capability
pub trait Navigator: Send {
    fn navigate(&mut self, path: &str);
}

/// How an action was carried out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Done,
    /// The target was missing and a fallback ran instead
    Fallback,
    /// Nothing could be done (no search field, unknown bus command, handler refused)
    NotFound,
}

pub struct ActionBindings {
    page: Box<dyn Page>,
    navigator: Box<dyn Navigator>,
    bus: Arc<Mutex<CommandBus>>,
    scroll: ScrollConfig,
}

impl ActionBindings {
    pub fn new(
        page: Box<dyn Page>,
        navigator: Box<dyn Navigator>,
        bus: Arc<Mutex<CommandBus>>,
        scroll: ScrollConfig,
    ) -> Self {
        Self {
            page,
            navigator,
            bus,
            scroll,
        }
    }

    pub fn bus(&self) -> Arc<Mutex<CommandBus>> {
        Arc::clone(&self.bus)
    }

    pub fn perform(&mut self, action: &PageAction) -> ActionOutcome {
        tracing::info!(%action, "Performing page action");
        match action {
            PageAction::ScrollBy(delta) => self.scroll_by(*delta),
            PageAction::ScrollTo(edge) => self.scroll_to(*edge),
            PageAction::FocusSection(id) => self.focus_section(id),
            PageAction::Navigate(path) => self.navigate(path),
            PageAction::Search(term) => self.focus_search(term),
            PageAction::Dispatch { command, argument } => self.dispatch(command, argument),
        }
    }

    pub fn scroll_by(&mut self, delta: i32) -> ActionOutcome {
        self.page.scroll_by(delta);
        ActionOutcome::Done
    }

    pub fn scroll_to(&mut self, edge: ScrollEdge) -> ActionOutcome {
        let top = match edge {
            ScrollEdge::Top => 0,
            ScrollEdge::Bottom => self.page.document_height(),
        };
        self.page.scroll_to(top);
        ActionOutcome::Done
    }

    /// Element id, then `data-category`, else scroll a fixed distance
    pub fn focus_section(&mut self, id: &str) -> ActionOutcome {
        let element = self
            .page
            .find_by_id(id)
            .or_else(|| self.page.find_by_attribute(SECTION_ATTRIBUTE, id));

        match element {
            Some(element) => {
                self.page.scroll_into_view(&element);
                ActionOutcome::Done
            }
            None => {
                tracing::debug!(section = id, "Section not found, scrolling instead");
                self.page.scroll_by(self.scroll.section_fallback);
                ActionOutcome::Fallback
            }
        }
    }

    pub fn navigate(&mut self, path: &str) -> ActionOutcome {
        self.navigator.navigate(path);
        ActionOutcome::Done
    }

    pub fn focus_search(&mut self, term: &str) -> ActionOutcome {
        let Some(field) = self.page.find_search_field() else {
            tracing::debug!("No search field on page");
            return ActionOutcome::NotFound;
        };

        self.page.focus(&field);
        self.page.set_value(&field, term);
        if !self.page.submit_enclosing_form(&field) {
            tracing::debug!("Search field has no enclosing form");
        }
        ActionOutcome::Done
    }

    pub fn dispatch(&mut self, command: &str, argument: &str) -> ActionOutcome {
        let handled = self
            .bus
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .dispatch(command, argument);

        match handled {
            Some(true) => ActionOutcome::Done,
            Some(false) => ActionOutcome::NotFound,
            None => {
                tracing::debug!(command, "No handler registered");
                ActionOutcome::NotFound
            }
        }
    }
}
