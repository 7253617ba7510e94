//! Helpers shared by input and event handling: spawning server calls and
//! feeding their follow-up work back into the sync engine.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::mpsc;

use crate::api::{ApiClient, ApiError};
use crate::app::{App, AppEvent};
use crate::sync::{Navigation, PageRequest, ReadFilter, ReadTicket, RefreshTicket, Scope};
use crate::util::validate_url_for_open;

/// Wraps a future to catch panics and convert them to errors.
///
/// A panicking task would otherwise vanish inside the runtime, leaving the
/// engine waiting for a page or snapshot that never arrives.
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future).catch_unwind().await.map_err(|panic| {
        if let Some(s) = panic.downcast_ref::<&'static str>() {
            s.to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        }
    })
}

/// Run one server call in the background and post its result as an event.
///
/// A panic inside the call is reported as [`ApiError::TaskPanicked`] through
/// the same event, so the in-flight bookkeeping is always released.
fn spawn_api_call<T, F, M>(task: &'static str, tx: &mpsc::Sender<AppEvent>, call: F, into_event: M)
where
    T: Send + 'static,
    F: Future<Output = Result<T, ApiError>> + Send + 'static,
    M: FnOnce(Result<T, ApiError>) -> AppEvent + Send + 'static,
{
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = match catch_task_panic(call).await {
            Ok(result) => result,
            Err(panic_msg) => {
                tracing::error!(task, error = %panic_msg, "Background task panicked");
                Err(ApiError::TaskPanicked(panic_msg))
            }
        };
        if let Err(e) = tx.send(into_event(result)).await {
            tracing::warn!(task, error = %e, "Failed to send task result (receiver dropped)");
        }
    });
}

// ============================================================================
// Sync Engine Work
// ============================================================================

pub(super) fn spawn_page_fetch(app: &App, request: PageRequest, tx: &mpsc::Sender<AppEvent>) {
    let api = app.api.clone();
    let req = request.clone();
    spawn_api_call(
        "page_fetch",
        tx,
        async move { api.fetch_page(&req).await },
        move |result| AppEvent::PageLoaded { request, result },
    );
}

pub(super) fn spawn_read_commit(app: &App, ticket: ReadTicket, tx: &mpsc::Sender<AppEvent>) {
    let api = app.api.clone();
    spawn_api_call(
        "read_commit",
        tx,
        async move { api.mark_read(&ticket).await },
        move |result| AppEvent::ReadCommitted { ticket, result },
    );
}

/// Fetch the sidebar snapshot and the last-sync label together.
pub(super) fn spawn_sidebar_refresh(
    app: &App,
    ticket: RefreshTicket,
    tx: &mpsc::Sender<AppEvent>,
) {
    let api = app.api.clone();
    spawn_api_call(
        "sidebar_refresh",
        tx,
        async move {
            let (snapshot, last_sync) = tokio::join!(api.sidebar_snapshot(), api.last_sync());
            let last_sync = match last_sync {
                Ok(label) => Some(label),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to fetch last sync time");
                    None
                }
            };
            Ok::<_, ApiError>((snapshot, last_sync))
        },
        move |result| {
            let (result, last_sync) = match result {
                Ok((snapshot, last_sync)) => (snapshot, last_sync),
                Err(e) => (Err(e), None),
            };
            AppEvent::SidebarLoaded {
                ticket,
                result,
                last_sync,
            }
        },
    );
}

pub(super) fn spawn_unread_count(app: &App, tx: &mpsc::Sender<AppEvent>) {
    let api = app.api.clone();
    spawn_api_call(
        "unread_count",
        tx,
        async move { api.unread_count().await },
        AppEvent::UnreadCountLoaded,
    );
}

/// Start every request a navigation produced and reset the items pane.
pub(super) fn dispatch_navigation(app: &mut App, nav: Navigation, tx: &mpsc::Sender<AppEvent>) {
    app.reset_items_view();
    if let Some(request) = nav.page {
        spawn_page_fetch(app, request, tx);
    }
    if let Some(ticket) = nav.sidebar {
        spawn_sidebar_refresh(app, ticket, tx);
    }
}

pub(super) fn dispatch_refresh(app: &App, ticket: Option<RefreshTicket>, tx: &mpsc::Sender<AppEvent>) {
    if let Some(ticket) = ticket {
        spawn_sidebar_refresh(app, ticket, tx);
    }
}

/// Mark whatever has entered the read zone and commit it.
pub(super) fn scan_visibility(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    let regions = app.visible_regions();
    if regions.is_empty() {
        return;
    }
    let tickets = app.engine.scan_visibility(&regions, app.items_height);
    for ticket in tickets {
        spawn_read_commit(app, ticket, tx);
    }
}

/// Everything that follows a change of the scroll position.
pub(super) fn after_scroll(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    scan_visibility(app, tx);

    let content_height = app.layout().content_height;
    if app
        .engine
        .should_load_more(app.scroll_offset, app.items_height, content_height)
    {
        let more = app.engine.load_more();
        if let Some(request) = more.page {
            spawn_page_fetch(app, request, tx);
        }
        if let Some(ticket) = more.read {
            spawn_read_commit(app, ticket, tx);
        }
    }
}

/// Keep fetching while the loaded items do not even fill the pane. Unlike
/// scrolling, this marks nothing read.
pub(super) fn fill_viewport(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    if app.items_height == 0 || app.layout().content_height >= app.items_height {
        return;
    }
    if let Some(request) = app.engine.request_next_page() {
        spawn_page_fetch(app, request, tx);
    }
}

// ============================================================================
// User Mutations
// ============================================================================

pub(super) fn spawn_rename(app: &App, feed_id: i64, title: String, tx: &mpsc::Sender<AppEvent>) {
    let api = app.api.clone();
    let new_title = title.clone();
    spawn_api_call(
        "rename_feed",
        tx,
        async move { api.rename_feed(feed_id, &new_title).await },
        move |result| AppEvent::FeedRenamed {
            feed_id,
            title,
            result,
        },
    );
}

pub(super) fn spawn_delete(app: &App, feed_id: i64, title: String, tx: &mpsc::Sender<AppEvent>) {
    let api = app.api.clone();
    spawn_api_call(
        "delete_feed",
        tx,
        async move { api.delete_feed(feed_id).await },
        move |result| AppEvent::FeedDeleted {
            feed_id,
            title,
            result,
        },
    );
}

pub(super) fn spawn_move(
    app: &App,
    feed_id: i64,
    category_id: i64,
    category_name: String,
    tx: &mpsc::Sender<AppEvent>,
) {
    let api = app.api.clone();
    spawn_api_call(
        "move_feed",
        tx,
        async move { api.move_feed(feed_id, category_id).await },
        move |result| AppEvent::FeedMoved {
            feed_id,
            category_name,
            result,
        },
    );
}

pub(super) fn spawn_mark_all_read(app: &App, scope: Scope, tx: &mpsc::Sender<AppEvent>) {
    let api = app.api.clone();
    spawn_api_call(
        "mark_all_read",
        tx,
        async move { api.mark_all_read(scope).await },
        move |result| AppEvent::MarkedAllRead { scope, result },
    );
}

pub(super) fn spawn_save_filter(api: &ApiClient, filter: ReadFilter, tx: &mpsc::Sender<AppEvent>) {
    let api = api.clone();
    spawn_api_call(
        "save_read_filter",
        tx,
        async move { api.save_read_filter(filter).await },
        move |result| AppEvent::FilterSaved { filter, result },
    );
}

/// Open the link of the item at the top of the items pane.
pub(super) fn open_current_link(app: &mut App) {
    let Some(link) = app.current_item_link().map(str::to_owned) else {
        app.set_status("Item has no link");
        return;
    };
    match validate_url_for_open(&link) {
        Ok(url) => {
            if let Err(e) = open::that(url.as_str()) {
                tracing::warn!(error = %e, url = %url, "Failed to open browser");
                app.set_status(format!("Failed to open browser: {}", e));
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Refusing to open item link");
            app.set_status(format!("Cannot open link: {}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_catch_task_panic_passes_value() {
        assert_eq!(catch_task_panic(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn test_catch_task_panic_extracts_message() {
        let result = catch_task_panic(async {
            panic!("boom {}", 1);
        })
        .await;
        assert_eq!(result, Err::<(), _>("boom 1".to_string()));

        let result = catch_task_panic(async {
            std::panic::panic_any(5u8);
        })
        .await;
        assert_eq!(result, Err::<(), _>("unknown panic payload".to_string()));
    }
}
