//! JSON shapes of the aggregation server and their conversion into sync items.
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::sync::{DigestSource, Item, ItemId, ItemPayload};

/// One entry of `GET /api/feeditems...`.
#[derive(Debug, Deserialize)]
pub(crate) struct WireEntry {
    id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    pub_date: Option<String>,
    #[serde(default)]
    creator: Option<String>,
    #[serde(default)]
    read: bool,
    #[serde(default)]
    feed_id: Option<i64>,
    #[serde(default)]
    feed_title: Option<String>,
}

impl From<WireEntry> for Item {
    fn from(e: WireEntry) -> Self {
        Item {
            id: ItemId(e.id),
            read: e.read,
            published_at: e.pub_date.as_deref().and_then(parse_pub_date),
            payload: ItemPayload::Entry {
                title: e.title.unwrap_or_default(),
                link: e.link,
                summary: e.summary,
                creator: e.creator,
                feed_id: e.feed_id,
                feed_title: e.feed_title,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireDigestArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    feed_id: Option<i64>,
    #[serde(default)]
    feed_title: Option<String>,
}

/// One summary of `GET /api/daily/feed`.
#[derive(Debug, Deserialize)]
pub(crate) struct WireDigest {
    id: i64,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    articles: Vec<WireDigestArticle>,
    #[serde(default)]
    pub_date: Option<String>,
    #[serde(default)]
    read: bool,
}

impl From<WireDigest> for Item {
    fn from(d: WireDigest) -> Self {
        Item {
            id: ItemId(d.id),
            read: d.read,
            published_at: d.pub_date.as_deref().and_then(parse_pub_date),
            payload: ItemPayload::Digest {
                summary: d.summary,
                image: d.image,
                sources: d
                    .articles
                    .into_iter()
                    .map(|a| DigestSource {
                        title: a.title.unwrap_or_default(),
                        link: a.link,
                        feed_id: a.feed_id,
                        feed_title: a.feed_title,
                    })
                    .collect(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LastSyncResponse {
    #[serde(default)]
    pub last_sync: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnreadCountResponse {
    #[serde(default)]
    pub unread_count: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error.or(self.message)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ReadFilterSetting {
    pub unread: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct RenameFeed<'a> {
    pub title: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct MoveFeed {
    pub category_id: i64,
}

/// Parse a server timestamp. The server emits ISO 8601 with an offset when
/// it knows the user's timezone, and a naive UTC time otherwise.
pub(crate) fn parse_pub_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}
