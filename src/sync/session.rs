use std::collections::HashSet;
use std::fmt;

use super::item::{Item, ItemId};
use super::view::ViewSelection;

/// Identity of one view session. Responses carry the id they were issued for
/// and are dropped when it no longer matches the live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub(crate) u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Locally materialized, paginated view of one server collection.
///
/// Mutated only by the pager, the materializer and the read marker. A new
/// selection replaces the whole session.
#[derive(Debug)]
pub struct ViewSession {
    pub(super) id: SessionId,
    pub(super) selection: ViewSelection,
    pub(super) cursor: Option<ItemId>,
    pub(super) end_of_collection: bool,
    pub(super) fetch_in_flight: bool,
    pub(super) materialized_ids: HashSet<ItemId>,
    pub(super) items: Vec<Item>,
}

impl ViewSession {
    pub(crate) fn new(id: SessionId, selection: ViewSelection) -> Self {
        Self {
            id,
            selection,
            cursor: None,
            end_of_collection: false,
            fetch_in_flight: false,
            materialized_ids: HashSet::new(),
            items: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn selection(&self) -> ViewSelection {
        self.selection
    }

    pub fn cursor(&self) -> Option<ItemId> {
        self.cursor
    }

    pub fn end_of_collection(&self) -> bool {
        self.end_of_collection
    }

    pub fn fetch_in_flight(&self) -> bool {
        self.fetch_in_flight
    }

    /// Materialized items in insertion order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.materialized_ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|i| !i.read).count()
    }
}
