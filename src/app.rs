use std::borrow::Cow;
use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;

use crate::api::{ApiClient, ApiError};
use crate::preferences::PreferenceManager;
use crate::storage::Database;
use crate::sync::{
    Item, ItemId, ItemRegion, PageRequest, ReadFilter, ReadTicket, RefreshTicket,
    Scope, SidebarSnapshot, SyncEngine,
};
use crate::util::{html_to_text, strip_control_chars, truncate_to_width, wrap_to_width};

/// Feed titles wider than this are truncated in the sidebar.
pub const SIDEBAR_TITLE_WIDTH: usize = 28;

/// Share of the viewport a collapsed item may occupy before its summary is cut.
const COLLAPSED_ITEM_FRACTION: f32 = 0.8;

/// Title row plus meta row.
const HEADER_ROWS: usize = 2;
/// Blank row between items.
const GAP_ROWS: usize = 1;

const STATUS_TTL: Duration = Duration::from_secs(3);

// ============================================================================
// Focus
// ============================================================================

/// Which panel receives navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Items,
}

// ============================================================================
// Sidebar
// ============================================================================

/// One selectable line of the sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidebarRow {
    AllItems { unread: i64 },
    Daily,
    Category { id: i64, name: String, unread: i64 },
    Feed { category: i64, feed: i64, title: String, unread: i64 },
}

impl SidebarRow {
    pub fn scope(&self) -> Scope {
        match *self {
            SidebarRow::AllItems { .. } => Scope::Global,
            SidebarRow::Daily => Scope::Daily,
            SidebarRow::Category { id, .. } => Scope::Category(id),
            SidebarRow::Feed { category, feed, .. } => Scope::Feed { category, feed },
        }
    }

    pub fn unread(&self) -> i64 {
        match *self {
            SidebarRow::AllItems { unread }
            | SidebarRow::Category { unread, .. }
            | SidebarRow::Feed { unread, .. } => unread,
            SidebarRow::Daily => 0,
        }
    }
}

/// Flatten a snapshot into sidebar rows, keeping the server's ordering.
pub fn sidebar_rows(snapshot: Option<&SidebarSnapshot>) -> Vec<SidebarRow> {
    let mut rows = vec![
        SidebarRow::AllItems {
            unread: snapshot.map_or(0, SidebarSnapshot::total_unread),
        },
        SidebarRow::Daily,
    ];
    let Some(snapshot) = snapshot else {
        return rows;
    };

    for category in &snapshot.categories {
        rows.push(SidebarRow::Category {
            id: category.id,
            name: strip_control_chars(&category.name).into_owned(),
            unread: category.unread_count(),
        });
        for node in &category.feeds {
            let title = strip_control_chars(node.display_title());
            rows.push(SidebarRow::Feed {
                category: category.id,
                feed: node.feed.id,
                title: truncate_to_width(&title, SIDEBAR_TITLE_WIDTH).into_owned(),
                unread: node.unread_count,
            });
        }
    }
    rows
}

// ============================================================================
// Item Layout
// ============================================================================

/// Rows occupied by one item in the items pane, measured from the top of the
/// content (not the viewport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemBlock {
    pub id: ItemId,
    pub top: usize,
    /// Wrapped summary lines, already cut when collapsed.
    pub body: Vec<String>,
    /// The summary was cut; one extra row holds the expand hint.
    pub truncated: bool,
}

impl ItemBlock {
    pub fn height(&self) -> usize {
        HEADER_ROWS + self.body.len() + usize::from(self.truncated)
    }

    pub fn bottom(&self) -> usize {
        self.top + self.height()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemsLayout {
    pub blocks: Vec<ItemBlock>,
    pub content_height: usize,
}

impl ItemsLayout {
    /// Item geometry relative to a viewport scrolled to `scroll_offset`.
    pub fn regions(&self, scroll_offset: usize) -> Vec<ItemRegion> {
        let offset = scroll_offset as i64;
        self.blocks
            .iter()
            .map(|b| ItemRegion {
                id: b.id,
                top: b.top as i64 - offset,
                bottom: b.bottom() as i64 - offset,
            })
            .collect()
    }

    /// Index of the first item still (partly) visible at `scroll_offset`.
    pub fn item_at(&self, scroll_offset: usize) -> Option<usize> {
        if self.blocks.is_empty() {
            return None;
        }
        Some(
            self.blocks
                .iter()
                .position(|b| b.bottom() > scroll_offset)
                .unwrap_or(self.blocks.len() - 1),
        )
    }

    /// Furthest scroll position: the last item's top at the top of the pane,
    /// or further if that is what it takes to bring its bottom edge up to
    /// `read_line`.
    pub fn max_scroll(&self, read_line: usize) -> usize {
        self.blocks
            .last()
            .map_or(0, |b| b.top.max(b.bottom().saturating_sub(read_line)))
    }
}

/// Lay out `items` for a pane of `width` x `viewport_height`. The same
/// layout drives rendering and read-zone geometry.
pub fn layout_items(
    items: &[Item],
    expanded: &HashSet<ItemId>,
    width: usize,
    viewport_height: usize,
) -> ItemsLayout {
    let max_body = ((viewport_height as f32 * COLLAPSED_ITEM_FRACTION) as usize)
        .saturating_sub(HEADER_ROWS + 1)
        .max(1);

    let mut top = 0;
    let mut blocks = Vec::with_capacity(items.len());
    for item in items {
        let text = item.summary().map(html_to_text).unwrap_or_default();
        let mut body = wrap_to_width(&strip_control_chars(&text), width);

        let truncated = body.len() > max_body && !expanded.contains(&item.id);
        if truncated {
            body.truncate(max_body);
        }

        let block = ItemBlock {
            id: item.id,
            top,
            body,
            truncated,
        };
        top = block.bottom() + GAP_ROWS;
        blocks.push(block);
    }

    ItemsLayout {
        blocks,
        content_height: top,
    }
}

/// Message shown below the list once the collection has run out.
pub fn end_of_list_message(filter: ReadFilter) -> &'static str {
    match filter {
        ReadFilter::Unread => "There are no more unread items.",
        ReadFilter::All => "There's nothing here.",
    }
}

// ============================================================================
// Confirmation Dialog
// ============================================================================

/// Pending confirmation for destructive operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    DeleteFeed { feed_id: i64, title: String },
    MarkAllRead { scope: Scope },
}

// ============================================================================
// Context Menu State
// ============================================================================

pub const CONTEXT_MENU_ITEMS: &[&str] = &["Rename", "Move to Category", "Delete"];

/// Feed context menu. The poll loop stays paused while one is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextMenuState {
    pub feed_id: i64,
    pub feed_title: String,
    pub category_id: i64,
    pub selected_item: usize,
    pub sub_state: ContextMenuSubState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextMenuSubState {
    MainMenu,
    Renaming { input: String },
    /// Index into the snapshot's categories.
    CategoryPicker { selected: usize },
}

// ============================================================================
// Background Events
// ============================================================================

/// Results of background tasks, applied on the event loop.
#[derive(Debug)]
pub enum AppEvent {
    PageLoaded {
        request: PageRequest,
        result: Result<Vec<Item>, ApiError>,
    },
    ReadCommitted {
        ticket: ReadTicket,
        result: Result<(), ApiError>,
    },
    /// Sidebar refresh finished. `last_sync` is `None` when that call failed.
    SidebarLoaded {
        ticket: RefreshTicket,
        result: Result<SidebarSnapshot, ApiError>,
        last_sync: Option<String>,
    },
    UnreadCountLoaded(Result<i64, ApiError>),
    FeedRenamed {
        feed_id: i64,
        title: String,
        result: Result<(), ApiError>,
    },
    FeedDeleted {
        feed_id: i64,
        title: String,
        result: Result<(), ApiError>,
    },
    FeedMoved {
        feed_id: i64,
        category_name: String,
        result: Result<(), ApiError>,
    },
    MarkedAllRead {
        scope: Scope,
        result: Result<(), ApiError>,
    },
    FilterSaved {
        filter: ReadFilter,
        result: Result<(), ApiError>,
    },
}

// ============================================================================
// Application State
// ============================================================================

pub struct App {
    pub api: ApiClient,
    /// `None` when the preference database could not be opened.
    pub db: Option<Database>,
    pub prefs: PreferenceManager,
    pub engine: SyncEngine,

    pub focus: Focus,
    pub sidebar_rows: Vec<SidebarRow>,
    pub sidebar_selected: usize,
    pub scroll_offset: usize,
    /// Inner size of the items pane, updated on every render.
    pub items_width: usize,
    pub items_height: usize,
    pub expanded: HashSet<ItemId>,
    /// The pane was resized: scan for read items once it has been redrawn.
    pub rescan_after_draw: bool,

    pub status_message: Option<(Cow<'static, str>, Instant)>,
    pub needs_redraw: bool,

    pub last_sync: Option<String>,
    pub unread_badge: Option<i64>,
    /// The terminal title must be rewritten with the new badge.
    pub title_dirty: bool,

    pub show_help: bool,
    pub pending_confirm: Option<ConfirmAction>,
    pub context_menu: Option<ContextMenuState>,
}

impl App {
    pub fn new(
        api: ApiClient,
        db: Option<Database>,
        prefs: PreferenceManager,
        engine: SyncEngine,
    ) -> Self {
        Self {
            api,
            db,
            prefs,
            engine,
            focus: Focus::Items,
            sidebar_rows: sidebar_rows(None),
            sidebar_selected: 0,
            scroll_offset: 0,
            items_width: 0,
            items_height: 0,
            expanded: HashSet::new(),
            rescan_after_draw: false,
            status_message: None,
            needs_redraw: true,
            last_sync: None,
            unread_badge: None,
            title_dirty: true,
            show_help: false,
            pending_confirm: None,
            context_menu: None,
        }
    }

    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear the status message once it is older than three seconds.
    /// Returns true if a message was actually cleared.
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() >= STATUS_TTL {
                self.status_message = None;
                return true;
            }
        }
        false
    }

    // ========================================================================
    // Items Pane
    // ========================================================================

    pub fn layout(&self) -> ItemsLayout {
        layout_items(
            self.engine.items(),
            &self.expanded,
            self.items_width,
            self.items_height,
        )
    }

    /// Index of the item at the top of the pane.
    pub fn current_item(&self) -> Option<usize> {
        self.layout().item_at(self.scroll_offset)
    }

    fn max_scroll(&self) -> usize {
        let read_line = self.engine.read_zone().read_line(self.items_height);
        self.layout().max_scroll(read_line)
    }

    /// Move the viewport by `delta` rows. Returns true if it moved.
    pub fn scroll_by(&mut self, delta: isize) -> bool {
        let max = self.max_scroll();
        let target = self.scroll_offset.saturating_add_signed(delta).min(max);
        let moved = target != self.scroll_offset;
        self.scroll_offset = target;
        moved
    }

    pub fn scroll_to(&mut self, offset: usize) -> bool {
        let max = self.max_scroll();
        let target = offset.min(max);
        let moved = target != self.scroll_offset;
        self.scroll_offset = target;
        moved
    }

    /// Jump to the top of the next (`forward`) or previous item.
    pub fn step_item(&mut self, forward: bool) -> bool {
        let layout = self.layout();
        let target = if forward {
            layout
                .blocks
                .iter()
                .find(|b| b.top > self.scroll_offset)
                .map(|b| b.top)
        } else {
            layout
                .blocks
                .iter()
                .rev()
                .find(|b| b.top < self.scroll_offset)
                .map(|b| b.top)
        };
        match target {
            Some(offset) => self.scroll_to(offset),
            None => false,
        }
    }

    /// Item geometry for the read marker, or nothing before the first render.
    pub fn visible_regions(&self) -> Vec<ItemRegion> {
        if self.items_height == 0 {
            return Vec::new();
        }
        self.layout().regions(self.scroll_offset)
    }

    /// Toggle expansion of the item at the top of the pane. Returns true if
    /// its height changed.
    pub fn toggle_expanded(&mut self) -> bool {
        let layout = self.layout();
        let Some(block) = layout
            .item_at(self.scroll_offset)
            .and_then(|i| layout.blocks.get(i))
        else {
            return false;
        };
        if self.expanded.remove(&block.id) {
            return true;
        }
        if block.truncated {
            self.expanded.insert(block.id);
            return true;
        }
        false
    }

    /// Forget per-view UI state after the engine switched sessions.
    pub fn reset_items_view(&mut self) {
        self.scroll_offset = 0;
        self.expanded.clear();
    }

    pub fn current_item_link(&self) -> Option<&str> {
        let index = self.current_item()?;
        self.engine.items().get(index)?.link()
    }

    pub fn end_of_list_message(&self) -> Option<&'static str> {
        let session = self.engine.session();
        session
            .end_of_collection()
            .then(|| end_of_list_message(self.engine.selection().filter))
    }

    // ========================================================================
    // Sidebar
    // ========================================================================

    /// Rebuild sidebar rows from the current baseline snapshot, keeping the
    /// selection on the same scope when it still exists.
    pub fn rebuild_sidebar(&mut self) {
        let selected_scope = self.sidebar_rows.get(self.sidebar_selected).map(SidebarRow::scope);
        self.sidebar_rows = sidebar_rows(self.engine.poll().snapshot());
        self.sidebar_selected = selected_scope
            .and_then(|scope| self.sidebar_rows.iter().position(|r| r.scope() == scope))
            .unwrap_or(0)
            .min(self.sidebar_rows.len().saturating_sub(1));
    }

    pub fn selected_row(&self) -> Option<&SidebarRow> {
        self.sidebar_rows.get(self.sidebar_selected)
    }

    pub fn move_sidebar_selection(&mut self, delta: isize) {
        let max = self.sidebar_rows.len().saturating_sub(1);
        self.sidebar_selected = self.sidebar_selected.saturating_add_signed(delta).min(max);
    }

    /// Context menu for the selected sidebar row, if it is a feed.
    pub fn context_menu_for_selection(&self) -> Option<ContextMenuState> {
        match self.selected_row()? {
            SidebarRow::Feed {
                category,
                feed,
                title,
                ..
            } => Some(ContextMenuState {
                feed_id: *feed,
                feed_title: title.clone(),
                category_id: *category,
                selected_item: 0,
                sub_state: ContextMenuSubState::MainMenu,
            }),
            _ => None,
        }
    }

    /// Terminal title carrying the unread badge.
    pub fn window_title(&self) -> String {
        match self.unread_badge {
            Some(n) if n > 0 => format!("feedsync ({})", n),
            _ => "feedsync".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::item::fixtures::{entry, page};
    use crate::sync::snapshot::fixtures::{category, feed};
    use crate::sync::{ItemPayload, SyncSettings, ViewSelection};
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    fn long_entry(id: i64, words: usize) -> Item {
        let mut item = entry(id);
        if let ItemPayload::Entry { summary, .. } = &mut item.payload {
            *summary = Some(vec!["word"; words].join(" "));
        }
        item
    }

    fn test_app() -> App {
        let (tx, _rx) = mpsc::channel(4);
        let engine = SyncEngine::new(
            SyncSettings::default(),
            ViewSelection::new(Scope::Global, ReadFilter::Unread),
            tx,
        );
        let api = ApiClient::new("http://127.0.0.1:5000", Duration::from_secs(5)).unwrap();
        let prefs = PreferenceManager::from_config(&crate::config::Config::default());
        App::new(api, None, prefs, engine)
    }

    #[test]
    fn test_sidebar_rows_without_snapshot() {
        assert_eq!(
            sidebar_rows(None),
            vec![SidebarRow::AllItems { unread: 0 }, SidebarRow::Daily]
        );
    }

    #[test]
    fn test_sidebar_rows_flatten_categories_and_truncate_titles() {
        let mut long = feed(11, 2);
        long.feed.title = Some("An extremely long feed title that overflows".to_string());
        let snapshot = SidebarSnapshot {
            categories: vec![category(1, vec![long, feed(12, 3)])],
        };

        let rows = sidebar_rows(Some(&snapshot));
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0], SidebarRow::AllItems { unread: 5 });
        assert_eq!(rows[2].scope(), Scope::Category(1));
        assert_eq!(rows[2].unread(), 5);
        match &rows[3] {
            SidebarRow::Feed { title, feed, .. } => {
                assert_eq!(*feed, 11);
                assert_eq!(title.chars().count(), SIDEBAR_TITLE_WIDTH);
                assert!(title.ends_with("..."));
            }
            other => panic!("expected feed row, got {:?}", other),
        }
        assert_eq!(rows[4].scope(), Scope::Feed { category: 1, feed: 12 });
    }

    #[test]
    fn test_layout_stacks_items_with_gaps() {
        let items = page(1..=3);
        let layout = layout_items(&items, &HashSet::new(), 40, 20);
        let tops: Vec<usize> = layout.blocks.iter().map(|b| b.top).collect();
        let h = layout.blocks[0].height();
        assert_eq!(tops, vec![0, h + 1, 2 * (h + 1)]);
        assert_eq!(layout.content_height, 3 * (h + 1));
    }

    #[test]
    fn test_layout_truncates_long_items_until_expanded() {
        let items = vec![long_entry(1, 400)];
        let collapsed = layout_items(&items, &HashSet::new(), 20, 20);
        let block = &collapsed.blocks[0];
        assert!(block.truncated);
        assert!(block.height() <= 16, "height {}", block.height());

        let expanded = layout_items(&items, &HashSet::from([ItemId(1)]), 20, 20);
        assert!(!expanded.blocks[0].truncated);
        assert!(expanded.blocks[0].height() > block.height());
    }

    #[test]
    fn test_regions_follow_scroll() {
        let layout = layout_items(&page(1..=2), &HashSet::new(), 40, 20);
        let second_top = layout.blocks[1].top as i64;
        let regions = layout.regions(2);
        assert_eq!(regions[0].top, -2);
        assert_eq!(regions[1].top, second_top - 2);
        assert_eq!(regions[1].bottom - regions[1].top, layout.blocks[1].height() as i64);
    }

    #[test]
    fn test_item_at_and_max_scroll() {
        let layout = layout_items(&page(1..=3), &HashSet::new(), 40, 20);
        assert_eq!(layout.item_at(0), Some(0));
        assert_eq!(layout.item_at(layout.blocks[1].top), Some(1));
        assert_eq!(layout.max_scroll(20), layout.blocks[2].top);
        // A read line close to the top pushes the limit past the last top
        let last = &layout.blocks[2];
        assert_eq!(layout.max_scroll(1), last.bottom() - 1);
        assert_eq!(ItemsLayout::default().max_scroll(14), 0);
        assert_eq!(ItemsLayout::default().item_at(0), None);
    }

    #[test]
    fn test_end_of_list_messages() {
        assert_eq!(
            end_of_list_message(ReadFilter::Unread),
            "There are no more unread items."
        );
        assert_eq!(end_of_list_message(ReadFilter::All), "There's nothing here.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_and_step_are_clamped() {
        let mut app = test_app();
        app.items_width = 40;
        app.items_height = 10;
        let req = app.engine.start().page.unwrap();
        app.engine.page_loaded(&req, Ok::<_, String>(page(1..=3)));

        let max = app.max_scroll();
        assert!(app.scroll_by(1000));
        assert_eq!(app.scroll_offset, max);
        assert!(!app.step_item(true));
        assert!(app.step_item(false));
        assert_eq!(app.current_item(), Some(1));
        assert!(app.scroll_to(0));
        assert!(!app.scroll_by(-5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_truncated_last_item_can_reach_read_zone() {
        let mut app = test_app();
        app.items_width = 40;
        app.items_height = 20;
        let req = app.engine.start().page.unwrap();
        app.engine
            .page_loaded(&req, Ok::<_, String>(vec![entry(1), long_entry(2, 400)]));

        let last = app.layout().blocks[1].clone();
        assert!(last.truncated);
        let read_line = app.engine.read_zone().read_line(app.items_height);
        assert!(last.bottom() - last.top > read_line);

        app.scroll_by(10_000);
        assert!(app.scroll_offset > last.top);

        let tickets = app
            .engine
            .scan_visibility(&app.visible_regions(), app.items_height);
        assert!(tickets.iter().any(|t| t.id == ItemId(2)));
        assert!(app.engine.items()[1].read);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_expanded_only_for_truncated_items() {
        let mut app = test_app();
        app.items_width = 20;
        app.items_height = 10;
        let req = app.engine.start().page.unwrap();
        app.engine
            .page_loaded(&req, Ok::<_, String>(vec![long_entry(1, 200), entry(2)]));

        assert!(app.toggle_expanded());
        assert!(app.expanded.contains(&ItemId(1)));
        assert!(app.toggle_expanded());
        assert!(app.expanded.is_empty());

        let second = app.layout().blocks[1].top;
        app.scroll_to(second);
        assert!(!app.toggle_expanded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_regions_before_first_render() {
        let mut app = test_app();
        let req = app.engine.start().page.unwrap();
        app.engine.page_loaded(&req, Ok::<_, String>(page(1..=3)));
        assert!(app.visible_regions().is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_sidebar_keeps_selected_scope() {
        let mut app = test_app();
        app.sidebar_rows = sidebar_rows(Some(&SidebarSnapshot {
            categories: vec![category(1, vec![feed(11, 1)])],
        }));
        app.sidebar_selected = 3;
        app.rebuild_sidebar();
        // No baseline in the engine: only the fixed rows remain
        assert_eq!(app.sidebar_rows.len(), 2);
        assert_eq!(app.sidebar_selected, 0);
    }

    #[tokio::test]
    async fn test_context_menu_only_for_feeds() {
        let mut app = test_app();
        app.sidebar_rows = sidebar_rows(Some(&SidebarSnapshot {
            categories: vec![category(1, vec![feed(11, 1)])],
        }));
        app.sidebar_selected = 2;
        assert!(app.context_menu_for_selection().is_none());
        app.sidebar_selected = 3;
        let menu = app.context_menu_for_selection().unwrap();
        assert_eq!(menu.feed_id, 11);
        assert_eq!(menu.category_id, 1);
        assert_eq!(menu.sub_state, ContextMenuSubState::MainMenu);
    }

    #[tokio::test]
    async fn test_window_title_badge() {
        let mut app = test_app();
        assert_eq!(app.window_title(), "feedsync");
        app.unread_badge = Some(12);
        assert_eq!(app.window_title(), "feedsync (12)");
        app.unread_badge = Some(0);
        assert_eq!(app.window_title(), "feedsync");
    }
}
