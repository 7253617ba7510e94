//! Sidebar snapshot and its canonical comparison.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedInfo {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub daily_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedNode {
    pub feed: FeedInfo,
    #[serde(default)]
    pub unread_count: i64,
}

impl FeedNode {
    /// Title for display, falling back to the feed URL.
    pub fn display_title(&self) -> &str {
        match self.feed.title.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => &self.feed.url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub feeds: Vec<FeedNode>,
}

impl CategoryNode {
    pub fn unread_count(&self) -> i64 {
        self.feeds.iter().map(|f| f.unread_count).sum()
    }
}

/// Categories with their feeds and unread counts, as returned by the server.
///
/// Arrival order is kept for rendering. Comparison for change detection goes
/// through [`SidebarSnapshot::same_content`], which ignores it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebarSnapshot {
    #[serde(rename = "categories_and_blogs", default)]
    pub categories: Vec<CategoryNode>,
}

type CanonicalFeed<'a> = (Option<&'a str>, &'a str, bool, i64);
type CanonicalCategory<'a> = (&'a str, BTreeMap<i64, CanonicalFeed<'a>>);

impl SidebarSnapshot {
    /// Structural equality keyed by id at both levels.
    ///
    /// Categories compare by name and feed set, feeds by title, url, daily
    /// flag and unread count.
    pub fn same_content(&self, other: &SidebarSnapshot) -> bool {
        self.canonical() == other.canonical()
    }

    fn canonical(&self) -> BTreeMap<i64, CanonicalCategory<'_>> {
        self.categories
            .iter()
            .map(|c| {
                let feeds = c
                    .feeds
                    .iter()
                    .map(|f| {
                        (
                            f.feed.id,
                            (
                                f.feed.title.as_deref(),
                                f.feed.url.as_str(),
                                f.feed.daily_enabled,
                                f.unread_count,
                            ),
                        )
                    })
                    .collect();
                (c.id, (c.name.as_str(), feeds))
            })
            .collect()
    }

    pub fn total_unread(&self) -> i64 {
        self.categories.iter().map(|c| c.unread_count()).sum()
    }

    /// Locate a feed and the category that holds it.
    #[cfg(test)]
    pub fn find_feed(&self, feed_id: i64) -> Option<(&CategoryNode, &FeedNode)> {
        self.categories.iter().find_map(|c| {
            c.feeds
                .iter()
                .find(|f| f.feed.id == feed_id)
                .map(|f| (c, f))
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn snapshot() -> SidebarSnapshot {
        SidebarSnapshot {
            categories: vec![
                category(1, vec![feed(10, 3), feed(11, 0)]),
                category(2, vec![feed(20, 7)]),
            ],
        }
    }

    #[test]
    fn test_deserializes_server_shape() {
        let json = r#"{"categories_and_blogs":[{"id":1,"name":"Tech","feeds":[
            {"feed":{"id":4,"title":null,"url":"https://a.example/rss","daily_enabled":true},"unread_count":2}
        ]}]}"#;
        let snap: SidebarSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.categories.len(), 1);
        let (cat, node) = snap.find_feed(4).unwrap();
        assert_eq!(cat.name, "Tech");
        assert_eq!(node.display_title(), "https://a.example/rss");
        assert!(node.feed.daily_enabled);
        assert_eq!(snap.total_unread(), 2);
    }

    #[test]
    fn test_identical_snapshots_are_same() {
        assert!(snapshot().same_content(&snapshot()));
    }

    #[test]
    fn test_reordered_snapshots_are_same() {
        let mut reordered = snapshot();
        reordered.categories.reverse();
        reordered.categories[1].feeds.reverse();
        assert!(snapshot().same_content(&reordered));
    }

    #[test]
    fn test_single_count_difference_is_detected() {
        let mut changed = snapshot();
        changed.categories[1].feeds[0].unread_count = 8;
        assert!(!snapshot().same_content(&changed));
    }

    #[test]
    fn test_rename_and_move_are_detected() {
        let mut renamed = snapshot();
        renamed.categories[0].feeds[1].feed.title = Some("Renamed".to_string());
        assert!(!snapshot().same_content(&renamed));

        let mut moved = snapshot();
        let f = moved.categories[0].feeds.remove(1);
        moved.categories[1].feeds.push(f);
        assert!(!snapshot().same_content(&moved));
    }

    #[test]
    fn test_empty_snapshots() {
        assert!(SidebarSnapshot::default().same_content(&SidebarSnapshot::default()));
        assert!(!SidebarSnapshot::default().same_content(&snapshot()));
        assert_eq!(snapshot().total_unread(), 10);
    }

    fn arb_snapshot() -> impl Strategy<Value = SidebarSnapshot> {
        prop::collection::btree_map(
            0i64..20,
            prop::collection::btree_map(0i64..50, 0i64..100, 0..6),
            0..5,
        )
        .prop_map(|cats| SidebarSnapshot {
            categories: cats
                .into_iter()
                .map(|(cid, feeds)| {
                    category(
                        cid,
                        feeds
                            .into_iter()
                            .map(|(fid, unread)| feed(cid * 100 + fid, unread))
                            .collect(),
                    )
                })
                .collect(),
        })
    }

    proptest! {
        #[test]
        fn prop_order_never_matters(snap in arb_snapshot(), seed in any::<u64>()) {
            let mut shuffled = snap.clone();
            let n = shuffled.categories.len().max(1);
            shuffled.categories.rotate_left((seed as usize) % n);
            for c in shuffled.categories.iter_mut() {
                c.feeds.reverse();
            }
            prop_assert!(snap.same_content(&shuffled));
        }

        #[test]
        fn prop_any_count_change_is_detected(snap in arb_snapshot(), delta in 1i64..5) {
            prop_assume!(snap.categories.iter().any(|c| !c.feeds.is_empty()));
            let mut changed = snap.clone();
            if let Some(c) = changed.categories.iter_mut().find(|c| !c.feeds.is_empty()) {
                c.feeds[0].unread_count += delta;
            }
            prop_assert!(!snap.same_content(&changed));
        }
    }
}
