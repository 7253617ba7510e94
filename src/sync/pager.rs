//! Cursor pager: decides when a page may be requested and applies its result.
//!
//! The pager never performs I/O. [`request_next_page`] hands out a
//! [`PageRequest`] (or nothing) and flips the session's single-flight guard;
//! the caller performs the fetch and reports back through [`complete_page`].
use std::fmt::Display;

use super::item::{CollectionKind, Item, ItemId};
use super::materializer::materialize;
use super::session::{SessionId, ViewSession};
use super::view::ViewSelection;

/// Items per request for regular entry lists.
pub const DEFAULT_PAGE_SIZE: usize = 5;
/// Items per request for the daily digest.
pub const DEFAULT_DAILY_PAGE_SIZE: usize = 10;
/// A page with this many items or fewer ends the collection.
pub const DEFAULT_EXHAUST_THRESHOLD: usize = 2;

/// Fraction of the content height that triggers loading more entries.
const ENTRIES_LOAD_MORE_FRACTION: f32 = 0.7;
/// Fraction of the content height that triggers loading more digests.
const DIGEST_LOAD_MORE_FRACTION: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerSettings {
    pub page_size: usize,
    pub daily_page_size: usize,
    /// Pages of `0..=exhaust_threshold` items mark the end of the collection.
    /// Zero means only an empty page does.
    pub exhaust_threshold: usize,
}

impl Default for PagerSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            daily_page_size: DEFAULT_DAILY_PAGE_SIZE,
            exhaust_threshold: DEFAULT_EXHAUST_THRESHOLD,
        }
    }
}

impl PagerSettings {
    pub fn limit_for(&self, kind: CollectionKind) -> usize {
        match kind {
            CollectionKind::Entries => self.page_size,
            CollectionKind::Digest => self.daily_page_size,
        }
    }
}

/// A fetch the caller must perform on behalf of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub session: SessionId,
    pub selection: ViewSelection,
    pub cursor: Option<ItemId>,
    pub limit: usize,
}

/// What applying a page result did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The response belongs to a session that has been torn down.
    Stale,
    /// The page was merged. `added` lists the newly materialized ids.
    Materialized { added: Vec<ItemId>, exhausted: bool },
    /// The fetch failed; cursor and end flag are unchanged.
    Failed,
}

/// Issue the next page request for `session`, unless one is already in
/// flight or the collection is exhausted.
pub fn request_next_page(
    session: &mut ViewSession,
    settings: &PagerSettings,
) -> Option<PageRequest> {
    if session.fetch_in_flight || session.end_of_collection {
        return None;
    }
    session.fetch_in_flight = true;

    let request = PageRequest {
        session: session.id,
        selection: session.selection,
        cursor: session.cursor,
        limit: settings.limit_for(session.selection.kind()),
    };
    tracing::debug!(
        session = %session.id,
        view = %session.selection,
        cursor = ?request.cursor.map(|c| c.0),
        limit = request.limit,
        "Requesting page"
    );
    Some(request)
}

/// Apply the result of a fetch issued by [`request_next_page`].
pub fn complete_page<E: Display>(
    session: &mut ViewSession,
    request: &PageRequest,
    result: Result<Vec<Item>, E>,
    settings: &PagerSettings,
) -> PageOutcome {
    if request.session != session.id {
        tracing::debug!(
            response_session = %request.session,
            live_session = %session.id,
            "Dropping page for torn-down session"
        );
        return PageOutcome::Stale;
    }
    session.fetch_in_flight = false;

    match result {
        Ok(page) => {
            let len = page.len();
            let last = page.last().map(|item| item.id);
            let added = materialize(session, page);

            if let Some(last) = last {
                session.cursor = Some(last);
            }
            let exhausted = len <= settings.exhaust_threshold;
            if exhausted {
                session.end_of_collection = true;
            }

            tracing::debug!(
                session = %session.id,
                received = len,
                added = added.len(),
                cursor = ?session.cursor.map(|c| c.0),
                exhausted,
                "Page materialized"
            );
            PageOutcome::Materialized { added, exhausted }
        }
        Err(e) => {
            tracing::warn!(
                session = %session.id,
                view = %session.selection,
                error = %e,
                "Failed to fetch page, will retry on next scroll"
            );
            PageOutcome::Failed
        }
    }
}

/// Whether the scroll position is deep enough into the content to load the
/// next page.
pub fn should_load_more(
    kind: CollectionKind,
    scroll_offset: usize,
    viewport_height: usize,
    content_height: usize,
) -> bool {
    let fraction = match kind {
        CollectionKind::Entries => ENTRIES_LOAD_MORE_FRACTION,
        CollectionKind::Digest => DIGEST_LOAD_MORE_FRACTION,
    };
    (scroll_offset + viewport_height) as f32 >= content_height as f32 * fraction
}
