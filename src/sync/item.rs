use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned item identifier.
///
/// Ids are opaque to the client apart from equality and hashing: the server
/// returns items in a stable order and the last id of a page is the cursor
/// for the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which server collection an item came from.
///
/// Entries and digests live in different server tables, so their ids can
/// collide and they are committed through different read endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// Regular feed entries (`/api/feeditems...`).
    Entries,
    /// AI-summarized daily digest (`/api/daily/feed`).
    Digest,
}

/// A link from a digest back to one of the entries it summarizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestSource {
    pub title: String,
    pub link: Option<String>,
    pub feed_id: Option<i64>,
    pub feed_title: Option<String>,
}

/// Display payload of an item. The sync engine never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemPayload {
    Entry {
        title: String,
        link: Option<String>,
        summary: Option<String>,
        creator: Option<String>,
        feed_id: Option<i64>,
        feed_title: Option<String>,
    },
    Digest {
        summary: Option<String>,
        image: Option<String>,
        sources: Vec<DigestSource>,
    },
}

/// One materialized item of a collection view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    /// Local read flag. Starts as the server's value and only ever flips to `true`.
    pub read: bool,
    pub published_at: Option<DateTime<FixedOffset>>,
    pub payload: ItemPayload,
}

impl Item {
    pub fn kind(&self) -> CollectionKind {
        match self.payload {
            ItemPayload::Entry { .. } => CollectionKind::Entries,
            ItemPayload::Digest { .. } => CollectionKind::Digest,
        }
    }

    /// Headline shown for the item in lists.
    pub fn title(&self) -> &str {
        match &self.payload {
            ItemPayload::Entry { title, .. } => title,
            ItemPayload::Digest { sources, .. } => sources
                .first()
                .map(|s| s.title.as_str())
                .unwrap_or("Daily summary"),
        }
    }

    /// Link opened with the system browser.
    pub fn link(&self) -> Option<&str> {
        match &self.payload {
            ItemPayload::Entry { link, .. } => link.as_deref(),
            ItemPayload::Digest { sources, .. } => {
                sources.iter().find_map(|s| s.link.as_deref())
            }
        }
    }

    pub fn summary(&self) -> Option<&str> {
        match &self.payload {
            ItemPayload::Entry { summary, .. } | ItemPayload::Digest { summary, .. } => {
                summary.as_deref()
            }
        }
    }

    /// Name of the feed (or feeds, for digests) the item belongs to.
    pub fn source_label(&self) -> String {
        match &self.payload {
            ItemPayload::Entry { feed_title, .. } => feed_title.clone().unwrap_or_default(),
            ItemPayload::Digest { sources, .. } => {
                let mut names: Vec<&str> = sources
                    .iter()
                    .filter_map(|s| s.feed_title.as_deref())
                    .collect();
                names.dedup();
                names.join(", ")
            }
        }
    }

    pub fn creator(&self) -> Option<&str> {
        match &self.payload {
            ItemPayload::Entry { creator, .. } => creator.as_deref(),
            ItemPayload::Digest { .. } => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Unread feed entry with a predictable title.
    pub fn entry(id: i64) -> Item {
        Item {
            id: ItemId(id),
            read: false,
            published_at: None,
            payload: ItemPayload::Entry {
                title: format!("Entry {}", id),
                link: Some(format!("https://example.com/{}", id)),
                summary: Some("Summary".to_string()),
                creator: None,
                feed_id: Some(1),
                feed_title: Some("Example".to_string()),
            },
        }
    }

    pub fn digest(id: i64) -> Item {
        Item {
            id: ItemId(id),
            read: false,
            published_at: None,
            payload: ItemPayload::Digest {
                summary: Some("Digest".to_string()),
                image: None,
                sources: vec![DigestSource {
                    title: format!("Story {}", id),
                    link: Some(format!("https://example.com/story/{}", id)),
                    feed_id: Some(2),
                    feed_title: Some("Wire".to_string()),
                }],
            },
        }
    }

    pub fn page(ids: std::ops::RangeInclusive<i64>) -> Vec<Item> {
        ids.map(entry).collect()
    }
}
