//! The sync engine: one object owning every piece of incremental sync state.
//!
//! The UI drives it with plain method calls from the event loop and performs
//! the I/O described by the returned [`PageRequest`]s, [`ReadTicket`]s and
//! [`RefreshTicket`]s, reporting results back through the `*_loaded` /
//! `*_committed` methods.
use std::fmt::Display;
use std::time::Duration;

use tokio::sync::mpsc;

use super::item::{CollectionKind, Item};
use super::pager::{self, PageOutcome, PageRequest, PagerSettings};
use super::poll::{PollLoop, PollTick, RefreshTicket, DEFAULT_POLL_INTERVAL};
use super::read_marker::{ItemRegion, ReadMarker, ReadTicket, ReadZone, DEFAULT_READ_THRESHOLD};
use super::session::ViewSession;
use super::view::{ReadFilter, ViewSelection, ViewSelector};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    pub pager: PagerSettings,
    /// Fraction of the viewport an entry's bottom edge must reach to count as read.
    pub read_threshold: f32,
    pub poll_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            pager: PagerSettings::default(),
            read_threshold: DEFAULT_READ_THRESHOLD,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Work to start after a view (re)selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub page: Option<PageRequest>,
    pub sidebar: Option<RefreshTicket>,
}

/// Work to start after the user scrolled near the bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadMore {
    pub page: Option<PageRequest>,
    pub read: Option<ReadTicket>,
}

/// Work to start after a read commit finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitFollowUp {
    pub sidebar: Option<RefreshTicket>,
    pub refresh_badge: bool,
}

#[derive(Debug)]
pub struct SyncEngine {
    settings: SyncSettings,
    selector: ViewSelector,
    session: ViewSession,
    marker: ReadMarker,
    poll: PollLoop,
}

impl SyncEngine {
    pub fn new(
        settings: SyncSettings,
        initial: ViewSelection,
        tick_tx: mpsc::Sender<PollTick>,
    ) -> Self {
        let mut selector = ViewSelector::new(initial);
        let session = selector.open();
        Self {
            settings,
            selector,
            session,
            marker: ReadMarker::new(),
            poll: PollLoop::new(settings.poll_interval, tick_tx),
        }
    }

    /// First page of the initial view plus the first sidebar refresh.
    pub fn start(&mut self) -> Navigation {
        Navigation {
            page: self.request_next_page(),
            sidebar: self.poll.start(),
        }
    }

    pub fn selection(&self) -> ViewSelection {
        self.selector.current()
    }

    pub fn session(&self) -> &ViewSession {
        &self.session
    }

    pub fn items(&self) -> &[Item] {
        self.session.items()
    }

    pub fn poll(&self) -> &PollLoop {
        &self.poll
    }

    pub fn poll_mut(&mut self) -> &mut PollLoop {
        &mut self.poll
    }

    pub fn read_failures(&self) -> usize {
        self.marker.failed_count()
    }

    pub fn read_zone(&self) -> ReadZone {
        ReadZone::for_kind(self.selection().kind(), self.settings.read_threshold)
    }

    /// Tear down the live session and start over on `selection`. Any response
    /// still in flight for the old session will be dropped on arrival.
    pub fn navigate(&mut self, selection: ViewSelection) -> Navigation {
        let transition = self.selector.select(selection);
        self.session = transition.session;

        let sidebar = if transition.scope_changed {
            self.poll.reset_baseline();
            self.poll.request_refresh()
        } else {
            None
        };

        Navigation {
            page: self.request_next_page(),
            sidebar,
        }
    }

    pub fn set_filter(&mut self, filter: ReadFilter) -> Navigation {
        self.navigate(self.selection().with_filter(filter))
    }

    /// Explicit reload of the current view.
    pub fn reload(&mut self) -> Navigation {
        self.navigate(self.selection())
    }

    pub fn request_next_page(&mut self) -> Option<PageRequest> {
        pager::request_next_page(&mut self.session, &self.settings.pager)
    }

    /// The scroll position reached the load-more boundary. When a page is
    /// actually requested, the last unread item is marked read as well.
    pub fn load_more(&mut self) -> LoadMore {
        let page = self.request_next_page();
        let read = match page {
            Some(_) => self.marker.mark_last_unread(&mut self.session),
            None => None,
        };
        LoadMore { page, read }
    }

    pub fn should_load_more(
        &self,
        scroll_offset: usize,
        viewport_height: usize,
        content_height: usize,
    ) -> bool {
        pager::should_load_more(
            self.selection().kind(),
            scroll_offset,
            viewport_height,
            content_height,
        )
    }

    pub fn page_loaded<E: Display>(
        &mut self,
        request: &PageRequest,
        result: Result<Vec<Item>, E>,
    ) -> PageOutcome {
        pager::complete_page(&mut self.session, request, result, &self.settings.pager)
    }

    pub fn scan_visibility(
        &mut self,
        regions: &[ItemRegion],
        viewport_height: usize,
    ) -> Vec<ReadTicket> {
        let zone = self.read_zone();
        self.marker
            .scan_visibility(&mut self.session, regions, viewport_height, zone)
    }

    pub fn read_committed<E: Display>(
        &mut self,
        ticket: ReadTicket,
        result: Result<(), E>,
    ) -> CommitFollowUp {
        if self.marker.commit_finished(ticket, result) {
            CommitFollowUp {
                sidebar: self.poll.request_refresh(),
                refresh_badge: true,
            }
        } else {
            CommitFollowUp {
                sidebar: None,
                refresh_badge: false,
            }
        }
    }

    pub fn kind(&self) -> CollectionKind {
        self.selection().kind()
    }
}
