//! Application event handling.
//!
//! Applies background task results to the sync engine and starts whatever
//! follow-up work the engine hands back.

use tokio::sync::mpsc;

use crate::app::{App, AppEvent};
use crate::sync::{PageOutcome, SnapshotOutcome};

use super::helpers::{
    dispatch_navigation, dispatch_refresh, fill_viewport, spawn_sidebar_refresh,
    spawn_unread_count,
};

/// Handle application events from background tasks.
pub(super) fn handle_app_event(app: &mut App, event: AppEvent, event_tx: &mpsc::Sender<AppEvent>) {
    match event {
        AppEvent::PageLoaded { request, result } => {
            let error = result.as_ref().err().map(|e| e.user_message());
            match app.engine.page_loaded(&request, result) {
                PageOutcome::Materialized { added, exhausted } => {
                    tracing::debug!(added = added.len(), exhausted, "Page applied");
                    fill_viewport(app, event_tx);
                }
                PageOutcome::Failed => {
                    if let Some(msg) = error {
                        app.set_status(format!("Failed to load items: {}", msg));
                    }
                }
                PageOutcome::Stale => {}
            }
        }

        AppEvent::ReadCommitted { ticket, result } => {
            let follow_up = app.engine.read_committed(ticket, result);
            dispatch_refresh(app, follow_up.sidebar, event_tx);
            if follow_up.refresh_badge {
                spawn_unread_count(app, event_tx);
            }
        }

        AppEvent::SidebarLoaded {
            ticket,
            result,
            last_sync,
        } => {
            let applied = app.engine.poll_mut().on_snapshot(ticket, result);
            if matches!(
                applied.outcome,
                SnapshotOutcome::Changed | SnapshotOutcome::Unchanged
            ) {
                if let Some(label) = last_sync {
                    app.last_sync = Some(label);
                }
            }
            if applied.outcome == SnapshotOutcome::Changed {
                app.rebuild_sidebar();
            }
            dispatch_refresh(app, applied.follow_up, event_tx);
        }

        AppEvent::UnreadCountLoaded(result) => match result {
            Ok(count) => {
                if app.unread_badge != Some(count) {
                    app.unread_badge = Some(count);
                    app.title_dirty = true;
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to fetch unread count"),
        },

        AppEvent::FeedRenamed {
            feed_id,
            title,
            result,
        } => match result {
            Ok(()) => {
                tracing::info!(feed_id, title = %title, "Feed renamed");
                app.set_status(format!("Renamed to \"{}\"", title));
                refresh_after_edit(app, event_tx);
            }
            Err(e) => {
                tracing::warn!(feed_id, error = %e, "Failed to rename feed");
                app.set_status(format!("Rename failed: {}", e.user_message()));
            }
        },

        AppEvent::FeedDeleted {
            feed_id,
            title,
            result,
        } => match result {
            Ok(()) => {
                tracing::info!(feed_id, title = %title, "Feed deleted");
                app.set_status(format!("Deleted \"{}\"", title));
                refresh_after_edit(app, event_tx);
            }
            Err(e) => {
                tracing::warn!(feed_id, error = %e, "Failed to delete feed");
                app.set_status(format!("Delete failed: {}", e.user_message()));
            }
        },

        AppEvent::FeedMoved {
            feed_id,
            category_name,
            result,
        } => match result {
            Ok(()) => {
                tracing::info!(feed_id, category = %category_name, "Feed moved");
                app.set_status(format!("Moved to {}", category_name));
                refresh_after_edit(app, event_tx);
            }
            Err(e) => {
                tracing::warn!(feed_id, error = %e, "Failed to move feed");
                app.set_status(format!("Move failed: {}", e.user_message()));
            }
        },

        AppEvent::MarkedAllRead { scope, result } => match result {
            Ok(()) => {
                tracing::info!(?scope, "Marked everything read");
                app.set_status("Marked all as read");
                // The view only changes if it is still the one that was marked
                if app.engine.selection().scope == scope {
                    let nav = app.engine.reload();
                    dispatch_navigation(app, nav, event_tx);
                }
                refresh_after_edit(app, event_tx);
                spawn_unread_count(app, event_tx);
            }
            Err(e) => {
                tracing::warn!(?scope, error = %e, "Failed to mark all as read");
                app.set_status(format!("Mark all read failed: {}", e.user_message()));
            }
        },

        AppEvent::FilterSaved { filter, result } => {
            if let Err(e) = result {
                tracing::warn!(filter = filter.as_str(), error = %e, "Failed to save read filter");
                app.set_status(format!(
                    "Could not save filter on server: {}",
                    e.user_message()
                ));
            }
        }
    }
}

/// Refresh the sidebar after a mutation, unless polling is paused (the
/// resume refresh will pick the change up).
fn refresh_after_edit(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    if let Some(ticket) = app.engine.poll_mut().request_refresh() {
        spawn_sidebar_refresh(app, ticket, event_tx);
    }
}
