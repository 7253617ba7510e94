use super::item::{Item, ItemId};
use super::session::ViewSession;

/// Merge a fetched page into the session, skipping ids already materialized.
///
/// New items are appended in page order. Returns the ids that were actually
/// added; materializing the same page twice adds nothing the second time.
pub fn materialize<I>(session: &mut ViewSession, page: I) -> Vec<ItemId>
where
    I: IntoIterator<Item = Item>,
{
    let mut added = Vec::new();
    for item in page {
        if !session.materialized_ids.insert(item.id) {
            tracing::trace!(item_id = %item.id, session = %session.id, "Skipping duplicate item");
            continue;
        }
        added.push(item.id);
        session.items.push(item);
    }
    added
}
