//! View selection: which collection is on screen.
//!
//! A navigation path (`/`, `/category/3/feed/7/all`, `/daily`) plus a read
//! filter identifies one server collection. Every change of selection tears
//! down the live [`ViewSession`] and starts a fresh one; nothing is carried
//! over.
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::item::CollectionKind;
use super::session::{SessionId, ViewSession};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewPathError {
    #[error("Unknown view path: {0}")]
    Unknown(String),
    #[error("Invalid id '{0}' in view path")]
    InvalidId(String),
}

/// Unread-only vs. every item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadFilter {
    #[default]
    Unread,
    All,
}

impl ReadFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadFilter::Unread => "unread",
            ReadFilter::All => "all",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ReadFilter::Unread => ReadFilter::All,
            ReadFilter::All => ReadFilter::Unread,
        }
    }
}

impl FromStr for ReadFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unread" => Ok(ReadFilter::Unread),
            "all" => Ok(ReadFilter::All),
            other => Err(format!("unknown read filter '{}'", other)),
        }
    }
}

/// Which slice of the server's items a view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Category(i64),
    Feed { category: i64, feed: i64 },
    Daily,
}

impl Scope {
    pub fn kind(self) -> CollectionKind {
        match self {
            Scope::Daily => CollectionKind::Digest,
            _ => CollectionKind::Entries,
        }
    }
}

/// Scope plus read filter: enough to build the collection endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewSelection {
    pub scope: Scope,
    pub filter: ReadFilter,
}

impl ViewSelection {
    pub fn new(scope: Scope, filter: ReadFilter) -> Self {
        Self { scope, filter }
    }

    pub fn kind(&self) -> CollectionKind {
        self.scope.kind()
    }

    pub fn with_filter(self, filter: ReadFilter) -> Self {
        Self { filter, ..self }
    }

    pub fn with_scope(self, scope: Scope) -> Self {
        Self { scope, ..self }
    }

    /// Parse a navigation path. A trailing `all` segment selects
    /// [`ReadFilter::All`]; its absence selects unread-only.
    pub fn from_path(path: &str) -> Result<Self, ViewPathError> {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let filter = if segments.last() == Some(&"all") {
            segments.pop();
            ReadFilter::All
        } else {
            ReadFilter::Unread
        };

        let parse_id = |s: &str| {
            s.parse::<i64>()
                .map_err(|_| ViewPathError::InvalidId(s.to_string()))
        };

        let scope = match segments.as_slice() {
            [] => Scope::Global,
            ["daily"] => Scope::Daily,
            ["category", cat] => Scope::Category(parse_id(cat)?),
            ["category", cat, "feed", feed] => Scope::Feed {
                category: parse_id(cat)?,
                feed: parse_id(feed)?,
            },
            _ => return Err(ViewPathError::Unknown(path.to_string())),
        };

        Ok(Self { scope, filter })
    }

    /// Render back to a navigation path; inverse of [`ViewSelection::from_path`].
    pub fn path(&self) -> String {
        let mut path = match self.scope {
            Scope::Global => String::new(),
            Scope::Daily => "/daily".to_string(),
            Scope::Category(cat) => format!("/category/{}", cat),
            Scope::Feed { category, feed } => format!("/category/{}/feed/{}", category, feed),
        };
        if self.filter == ReadFilter::All {
            path.push_str("/all");
        }
        if path.is_empty() {
            path.push('/');
        }
        path
    }
}

impl fmt::Display for ViewSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Result of switching to a new selection.
#[derive(Debug)]
pub struct Transition {
    pub session: ViewSession,
    /// True when the scope changed (not just the filter). The sidebar
    /// comparison baseline must be reset in that case.
    pub scope_changed: bool,
}

/// Owns the current selection and mints session ids.
#[derive(Debug)]
pub struct ViewSelector {
    current: ViewSelection,
    next_session: u64,
}

impl ViewSelector {
    pub fn new(initial: ViewSelection) -> Self {
        Self {
            current: initial,
            next_session: 1,
        }
    }

    pub fn current(&self) -> ViewSelection {
        self.current
    }

    /// Session for the initial selection.
    pub fn open(&mut self) -> ViewSession {
        ViewSession::new(self.mint(), self.current)
    }

    /// Switch to `selection`, always producing a brand new session, even when
    /// the selection is unchanged (explicit reload).
    pub fn select(&mut self, selection: ViewSelection) -> Transition {
        let scope_changed = selection.scope != self.current.scope;
        tracing::debug!(
            from = %self.current,
            to = %selection,
            scope_changed,
            "View selection changed"
        );
        self.current = selection;
        Transition {
            session: ViewSession::new(self.mint(), selection),
            scope_changed,
        }
    }

    fn mint(&mut self) -> SessionId {
        let id = SessionId(self.next_session);
        self.next_session = self.next_session.wrapping_add(1);
        id
    }
}
