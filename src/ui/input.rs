//! Input handling for the TUI.
//!
//! Keys go to the topmost overlay first (help, confirmation, context menu),
//! then to the focused panel.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyModifiers};
use tokio::sync::mpsc;

use crate::app::{
    App, AppEvent, ConfirmAction, ContextMenuSubState, Focus, CONTEXT_MENU_ITEMS,
};
use crate::sync::{PauseReason, ReadFilter, Scope};

use super::helpers::{
    after_scroll, dispatch_navigation, dispatch_refresh, open_current_link, scan_visibility,
    spawn_delete, spawn_mark_all_read, spawn_move, spawn_rename, spawn_save_filter,
};
use super::Action;

/// Longest feed title accepted in the rename dialog.
const MAX_TITLE_LENGTH: usize = 256;

/// Main input dispatch function.
pub(super) async fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Result<Action> {
    if app.show_help {
        if matches!(code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?')) {
            app.show_help = false;
        }
        return Ok(Action::Continue);
    }

    if app.pending_confirm.is_some() {
        handle_confirm_input(app, code, event_tx);
        return Ok(Action::Continue);
    }

    if app.context_menu.is_some() {
        handle_context_menu_input(app, code, event_tx);
        return Ok(Action::Continue);
    }

    match code {
        KeyCode::Char('q') => return Ok(Action::Quit),
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
            return Ok(Action::Quit)
        }
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Tab => {
            app.focus = match app.focus {
                Focus::Sidebar => Focus::Items,
                Focus::Items => Focus::Sidebar,
            };
        }
        KeyCode::Char('u') if !modifiers.contains(KeyModifiers::CONTROL) => {
            toggle_filter(app, event_tx).await
        }
        KeyCode::Char('r') => {
            let nav = app.engine.reload();
            dispatch_navigation(app, nav, event_tx);
            app.set_status("Reloading...");
        }
        KeyCode::Char('d') if !modifiers.contains(KeyModifiers::CONTROL) => {
            navigate_to(app, Scope::Daily, event_tx)
        }
        KeyCode::Char('A') => {
            let scope = app.engine.selection().scope;
            if scope == Scope::Daily {
                app.set_status("Mark all read is not available for the daily view");
            } else {
                app.pending_confirm = Some(ConfirmAction::MarkAllRead { scope });
            }
        }
        _ => match app.focus {
            Focus::Items => handle_items_input(app, code, modifiers, event_tx),
            Focus::Sidebar => handle_sidebar_input(app, code, event_tx),
        },
    }
    Ok(Action::Continue)
}

fn handle_items_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    let half_page = (app.items_height / 2).max(1) as isize;
    let page = app.items_height.max(1) as isize;

    let moved = match code {
        KeyCode::Char('j') => app.step_item(true),
        KeyCode::Char('k') => app.step_item(false),
        KeyCode::Down => app.scroll_by(1),
        KeyCode::Up => app.scroll_by(-1),
        KeyCode::Char('d') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_by(half_page)
        }
        KeyCode::Char('u') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_by(-half_page)
        }
        KeyCode::PageDown | KeyCode::Char(' ') => app.scroll_by(page),
        KeyCode::PageUp => app.scroll_by(-page),
        KeyCode::Char('g') | KeyCode::Home => app.scroll_to(0),
        KeyCode::Char('G') | KeyCode::End => app.scroll_to(usize::MAX),
        KeyCode::Char('x') | KeyCode::Enter => {
            if app.toggle_expanded() {
                // Heights changed under a fixed scroll position
                scan_visibility(app, event_tx);
            }
            false
        }
        KeyCode::Char('o') => {
            open_current_link(app);
            false
        }
        _ => false,
    };

    if moved {
        after_scroll(app, event_tx);
    }
}

fn handle_sidebar_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) {
    match code {
        KeyCode::Enter => open_selected_row(app, event_tx),
        KeyCode::Char('j') | KeyCode::Down => app.move_sidebar_selection(1),
        KeyCode::Char('k') | KeyCode::Up => app.move_sidebar_selection(-1),
        KeyCode::Char('g') | KeyCode::Home => app.sidebar_selected = 0,
        KeyCode::Char('G') | KeyCode::End => app.move_sidebar_selection(isize::MAX),
        KeyCode::Char('e') => match app.context_menu_for_selection() {
            Some(menu) => {
                app.engine.poll_mut().pause(PauseReason::Editing);
                app.context_menu = Some(menu);
            }
            None => app.set_status("Select a feed to edit it"),
        },
        _ => {}
    }
}

// ============================================================================
// Navigation
// ============================================================================

fn navigate_to(app: &mut App, scope: Scope, event_tx: &mpsc::Sender<AppEvent>) {
    let selection = app.engine.selection().with_scope(scope);
    let nav = app.engine.navigate(selection);
    dispatch_navigation(app, nav, event_tx);
    tracing::info!(view = %selection, "Navigated");
}

/// Open the view of the selected sidebar row and move focus to the items.
fn open_selected_row(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    if let Some(scope) = app.selected_row().map(|r| r.scope()) {
        navigate_to(app, scope, event_tx);
        app.focus = Focus::Items;
    }
}

/// Flip between unread-only and all items, remember the choice locally and
/// tell the server.
async fn toggle_filter(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let filter = app.engine.selection().filter.toggled();
    let nav = app.engine.set_filter(filter);
    dispatch_navigation(app, nav, event_tx);
    spawn_save_filter(&app.api, filter, event_tx);

    if let Some(db) = app.db.as_ref() {
        if let Err(e) = app.prefs.set_read_filter(db, filter).await {
            tracing::warn!(error = %e, "Failed to persist read filter");
        }
    }
    app.set_status(match filter {
        ReadFilter::Unread => "Showing unread items",
        ReadFilter::All => "Showing all items",
    });
}

// ============================================================================
// Feed Editing
// ============================================================================

/// Leave edit mode: polling resumes with an immediate refresh once no other
/// pause reason is left.
fn end_edit(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let ticket = app.engine.poll_mut().resume(PauseReason::Editing);
    dispatch_refresh(app, ticket, event_tx);
}

fn handle_context_menu_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(mut menu) = app.context_menu.take() else {
        return;
    };

    match menu.sub_state {
        ContextMenuSubState::MainMenu => match code {
            KeyCode::Char('k') | KeyCode::Up => {
                menu.selected_item = menu.selected_item.saturating_sub(1);
                app.context_menu = Some(menu);
            }
            KeyCode::Char('j') | KeyCode::Down => {
                menu.selected_item = (menu.selected_item + 1).min(CONTEXT_MENU_ITEMS.len() - 1);
                app.context_menu = Some(menu);
            }
            KeyCode::Enter => match menu.selected_item {
                0 => {
                    menu.sub_state = ContextMenuSubState::Renaming {
                        input: menu.feed_title.clone(),
                    };
                    app.context_menu = Some(menu);
                }
                1 => {
                    let current = app
                        .engine
                        .poll()
                        .snapshot()
                        .and_then(|s| s.categories.iter().position(|c| c.id == menu.category_id))
                        .unwrap_or(0);
                    menu.sub_state = ContextMenuSubState::CategoryPicker { selected: current };
                    app.context_menu = Some(menu);
                }
                _ => {
                    // Still editing until the confirmation is answered
                    app.pending_confirm = Some(ConfirmAction::DeleteFeed {
                        feed_id: menu.feed_id,
                        title: menu.feed_title,
                    });
                }
            },
            KeyCode::Esc => end_edit(app, event_tx),
            _ => app.context_menu = Some(menu),
        },

        ContextMenuSubState::Renaming { ref mut input } => match code {
            KeyCode::Char(c) => {
                if input.len() < MAX_TITLE_LENGTH {
                    input.push(c);
                }
                app.context_menu = Some(menu);
            }
            KeyCode::Backspace => {
                input.pop();
                app.context_menu = Some(menu);
            }
            KeyCode::Enter => {
                let title = input.trim().to_owned();
                if title.is_empty() {
                    app.set_status("Name cannot be empty");
                    app.context_menu = Some(menu);
                } else {
                    spawn_rename(app, menu.feed_id, title, event_tx);
                    end_edit(app, event_tx);
                }
            }
            KeyCode::Esc => {
                menu.sub_state = ContextMenuSubState::MainMenu;
                app.context_menu = Some(menu);
            }
            _ => app.context_menu = Some(menu),
        },

        ContextMenuSubState::CategoryPicker { ref mut selected } => {
            let categories: Vec<(i64, String)> = app
                .engine
                .poll()
                .snapshot()
                .map(|s| s.categories.iter().map(|c| (c.id, c.name.clone())).collect())
                .unwrap_or_default();

            match code {
                KeyCode::Char('k') | KeyCode::Up => {
                    *selected = selected.saturating_sub(1);
                    app.context_menu = Some(menu);
                }
                KeyCode::Char('j') | KeyCode::Down => {
                    *selected = (*selected + 1).min(categories.len().saturating_sub(1));
                    app.context_menu = Some(menu);
                }
                KeyCode::Enter => match categories.get(*selected) {
                    Some((id, _)) if *id == menu.category_id => {
                        app.set_status("Feed is already in that category");
                        end_edit(app, event_tx);
                    }
                    Some((id, name)) => {
                        spawn_move(app, menu.feed_id, *id, name.clone(), event_tx);
                        end_edit(app, event_tx);
                    }
                    None => end_edit(app, event_tx),
                },
                KeyCode::Esc => {
                    menu.sub_state = ContextMenuSubState::MainMenu;
                    app.context_menu = Some(menu);
                }
                _ => app.context_menu = Some(menu),
            }
        }
    }
}

fn handle_confirm_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) {
    match code {
        KeyCode::Char('y') | KeyCode::Char('Y') => match app.pending_confirm.take() {
            Some(ConfirmAction::DeleteFeed { feed_id, title }) => {
                app.set_status(format!("Deleting {}...", title));
                spawn_delete(app, feed_id, title, event_tx);
                end_edit(app, event_tx);
            }
            Some(ConfirmAction::MarkAllRead { scope }) => {
                app.set_status("Marking all as read...");
                spawn_mark_all_read(app, scope, event_tx);
            }
            None => {}
        },
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            if let Some(ConfirmAction::DeleteFeed { .. }) = app.pending_confirm.take() {
                end_edit(app, event_tx);
            }
            app.set_status("Cancelled");
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::config::Config;
    use crate::preferences::PreferenceManager;
    use crate::sync::{PollState, SidebarSnapshot, SyncEngine, SyncSettings, ViewSelection};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn test_app() -> (App, mpsc::Sender<AppEvent>, mpsc::Receiver<AppEvent>) {
        let (tick_tx, _tick_rx) = mpsc::channel(4);
        let engine = SyncEngine::new(
            SyncSettings::default(),
            ViewSelection::new(Scope::Global, ReadFilter::Unread),
            tick_tx,
        );
        // Nothing listens here; spawned requests fail fast and are ignored
        let api = ApiClient::new("http://127.0.0.1:9", Duration::from_millis(100)).unwrap();
        let prefs = PreferenceManager::from_config(&Config::default());
        let (tx, rx) = mpsc::channel(32);
        (App::new(api, None, prefs, engine), tx, rx)
    }

    fn started(app: &mut App) {
        let nav = app.engine.start();
        let ticket = nav.sidebar.unwrap();
        let snapshot = SidebarSnapshot {
            categories: vec![crate::sync::snapshot::fixtures::category(
                1,
                vec![crate::sync::snapshot::fixtures::feed(11, 2)],
            )],
        };
        app.engine.poll_mut().on_snapshot(ticket, Ok::<_, String>(snapshot));
        app.rebuild_sidebar();
    }

    async fn press(app: &mut App, code: KeyCode, tx: &mpsc::Sender<AppEvent>) -> Action {
        handle_input(app, code, KeyModifiers::NONE, tx).await.unwrap()
    }

    #[tokio::test]
    async fn test_quit_key() {
        let (mut app, tx, _rx) = test_app();
        assert!(matches!(press(&mut app, KeyCode::Char('q'), &tx).await, Action::Quit));
    }

    #[tokio::test]
    async fn test_context_menu_pauses_until_closed() {
        let (mut app, tx, _rx) = test_app();
        started(&mut app);
        app.focus = Focus::Sidebar;
        app.sidebar_selected = 3;

        press(&mut app, KeyCode::Char('e'), &tx).await;
        assert!(app.context_menu.is_some());
        assert_eq!(app.engine.poll().state(), PollState::Paused);

        press(&mut app, KeyCode::Esc, &tx).await;
        assert!(app.context_menu.is_none());
        assert_eq!(app.engine.poll().state(), PollState::Polling);
        // Resuming asked for a fresh snapshot
        assert!(app.engine.poll().refresh_in_flight());
    }

    #[tokio::test]
    async fn test_delete_stays_paused_until_confirmed() {
        let (mut app, tx, _rx) = test_app();
        started(&mut app);
        app.focus = Focus::Sidebar;
        app.sidebar_selected = 3;

        press(&mut app, KeyCode::Char('e'), &tx).await;
        press(&mut app, KeyCode::Down, &tx).await;
        press(&mut app, KeyCode::Down, &tx).await;
        press(&mut app, KeyCode::Enter, &tx).await;
        assert_eq!(
            app.pending_confirm,
            Some(ConfirmAction::DeleteFeed {
                feed_id: 11,
                title: "Feed 11".to_string()
            })
        );
        assert_eq!(app.engine.poll().state(), PollState::Paused);

        press(&mut app, KeyCode::Char('n'), &tx).await;
        assert!(app.pending_confirm.is_none());
        assert_eq!(app.engine.poll().state(), PollState::Polling);
    }

    #[tokio::test]
    async fn test_rename_rejects_empty_title() {
        let (mut app, tx, _rx) = test_app();
        started(&mut app);
        app.focus = Focus::Sidebar;
        app.sidebar_selected = 3;

        press(&mut app, KeyCode::Char('e'), &tx).await;
        press(&mut app, KeyCode::Enter, &tx).await;
        for _ in 0.."Feed 11".len() {
            press(&mut app, KeyCode::Backspace, &tx).await;
        }
        press(&mut app, KeyCode::Enter, &tx).await;
        assert!(matches!(
            app.context_menu.as_ref().map(|m| &m.sub_state),
            Some(ContextMenuSubState::Renaming { input }) if input.is_empty()
        ));
        assert_eq!(app.engine.poll().state(), PollState::Paused);
    }

    #[tokio::test]
    async fn test_filter_toggle_switches_view() {
        let (mut app, tx, _rx) = test_app();
        started(&mut app);
        press(&mut app, KeyCode::Char('u'), &tx).await;
        assert_eq!(app.engine.selection().filter, ReadFilter::All);
        assert_eq!(app.engine.selection().path(), "/all");
        assert!(app.engine.session().fetch_in_flight());
    }

    #[tokio::test]
    async fn test_mark_all_read_needs_confirmation_and_not_daily() {
        let (mut app, tx, _rx) = test_app();
        started(&mut app);
        press(&mut app, KeyCode::Char('A'), &tx).await;
        assert_eq!(
            app.pending_confirm,
            Some(ConfirmAction::MarkAllRead {
                scope: Scope::Global
            })
        );
        press(&mut app, KeyCode::Esc, &tx).await;
        assert!(app.pending_confirm.is_none());

        press(&mut app, KeyCode::Char('d'), &tx).await;
        assert_eq!(app.engine.selection().scope, Scope::Daily);
        press(&mut app, KeyCode::Char('A'), &tx).await;
        assert!(app.pending_confirm.is_none());
    }

    #[tokio::test]
    async fn test_sidebar_enter_navigates_and_focuses_items() {
        let (mut app, tx, _rx) = test_app();
        started(&mut app);
        app.focus = Focus::Sidebar;
        app.sidebar_selected = 2;
        open_selected_row(&mut app, &tx);
        assert_eq!(app.engine.selection().scope, Scope::Category(1));
        assert_eq!(app.focus, Focus::Items);
    }
}
