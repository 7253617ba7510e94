//! Visibility-triggered read marking.
//!
//! Items are flagged read locally the moment they qualify, and a
//! [`ReadTicket`] is handed out for the server commit. The marker keeps a
//! process-wide ledger of claimed items so an item is committed at most once,
//! no matter how often it re-enters the read zone or which path (visibility
//! scan or the load-more boundary) claims it first.
use std::collections::HashSet;
use std::fmt::Display;

use super::item::{CollectionKind, Item, ItemId};
use super::session::ViewSession;

/// Fraction of the viewport height an item's bottom edge must reach.
pub const DEFAULT_READ_THRESHOLD: f32 = 0.7;

/// Vertical extent of one item relative to the top of the viewport, in rows.
/// Negative values are above the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRegion {
    pub id: ItemId,
    pub top: i64,
    pub bottom: i64,
}

/// When an item counts as read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadZone {
    /// Bottom edge at or above `fraction * viewport height`.
    BottomAbove(f32),
    /// The item lies completely inside the viewport.
    FullyVisible,
}

impl ReadZone {
    pub fn for_kind(kind: CollectionKind, threshold: f32) -> Self {
        match kind {
            CollectionKind::Entries => ReadZone::BottomAbove(threshold),
            CollectionKind::Digest => ReadZone::FullyVisible,
        }
    }

    /// Lowest row an item's bottom edge may sit on and still be inside the
    /// zone.
    pub fn read_line(&self, viewport_height: usize) -> usize {
        match *self {
            ReadZone::BottomAbove(fraction) => (viewport_height as f32 * fraction).floor() as usize,
            ReadZone::FullyVisible => viewport_height,
        }
    }

    pub fn contains(&self, region: &ItemRegion, viewport_height: usize) -> bool {
        let below_line = region.bottom <= self.read_line(viewport_height) as i64;
        match *self {
            ReadZone::BottomAbove(_) => below_line,
            ReadZone::FullyVisible => region.top >= 0 && below_line,
        }
    }
}

/// Permission to send exactly one read commit for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadTicket {
    pub id: ItemId,
    pub kind: CollectionKind,
}

/// Hands out read commits and remembers which items it already claimed.
///
/// Both sets grow for the life of the process and are never pruned: an item
/// seen again in a later session (or after a page reload) must not be
/// committed a second time.
#[derive(Debug, Default)]
pub struct ReadMarker {
    claimed: HashSet<(CollectionKind, ItemId)>,
    committed: HashSet<(CollectionKind, ItemId)>,
    failed: usize,
}

impl ReadMarker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag every unread item whose region has crossed `zone` and return one
    /// ticket per newly flagged item.
    ///
    /// Regions for ids that are not materialized in `session` are ignored.
    pub fn scan_visibility(
        &mut self,
        session: &mut ViewSession,
        regions: &[ItemRegion],
        viewport_height: usize,
        zone: ReadZone,
    ) -> Vec<ReadTicket> {
        let mut tickets = Vec::new();
        for region in regions {
            if !zone.contains(region, viewport_height) {
                continue;
            }
            let Some(item) = session.items.iter_mut().find(|i| i.id == region.id) else {
                continue;
            };
            if let Some(ticket) = self.claim(item) {
                tickets.push(ticket);
            }
        }
        if !tickets.is_empty() {
            tracing::debug!(
                session = %session.id,
                count = tickets.len(),
                "Items crossed the read zone"
            );
        }
        tickets
    }

    /// Flag the last unread item of the session, used when the user scrolls
    /// far enough to trigger loading the next page.
    pub fn mark_last_unread(&mut self, session: &mut ViewSession) -> Option<ReadTicket> {
        let item = session.items.iter_mut().rev().find(|i| !i.read)?;
        let ticket = self.claim(item);
        if let Some(ticket) = ticket {
            tracing::debug!(item_id = %ticket.id, "Marking last unread item at page boundary");
        }
        ticket
    }

    /// Record the outcome of a commit. Returns true on success.
    ///
    /// Failures are logged only: the local flag stays set and the item is not
    /// retried.
    pub fn commit_finished<E: Display>(&mut self, ticket: ReadTicket, result: Result<(), E>) -> bool {
        match result {
            Ok(()) => {
                self.committed.insert((ticket.kind, ticket.id));
                true
            }
            Err(e) => {
                self.failed += 1;
                tracing::warn!(
                    item_id = %ticket.id,
                    kind = ?ticket.kind,
                    error = %e,
                    "Failed to mark item as read"
                );
                false
            }
        }
    }

    #[cfg(test)]
    pub fn is_claimed(&self, kind: CollectionKind, id: ItemId) -> bool {
        self.claimed.contains(&(kind, id))
    }

    #[cfg(test)]
    pub fn is_committed(&self, kind: CollectionKind, id: ItemId) -> bool {
        self.committed.contains(&(kind, id))
    }

    /// Commits that failed and will not be retried.
    pub fn failed_count(&self) -> usize {
        self.failed
    }

    // Check and set happen without a suspension point in between.
    fn claim(&mut self, item: &mut Item) -> Option<ReadTicket> {
        if item.read {
            return None;
        }
        item.read = true;
        let kind = item.kind();
        if !self.claimed.insert((kind, item.id)) {
            // Claimed in an earlier session of this process.
            return None;
        }
        Some(ReadTicket { id: item.id, kind })
    }
}
