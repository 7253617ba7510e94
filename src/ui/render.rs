//! Render functions for the TUI.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{App, ConfirmAction, ContextMenuSubState, CONTEXT_MENU_ITEMS};

use super::{help, items, sidebar, status};

/// Minimum terminal dimensions for the sidebar to count as visible.
pub(super) const MIN_WIDTH: u16 = 60;
pub(super) const MIN_HEIGHT: u16 = 10;

/// Whether a terminal of this size shows the normal layout.
pub(super) fn fits(width: u16, height: u16) -> bool {
    width >= MIN_WIDTH && height >= MIN_HEIGHT
}

/// Main render dispatch function.
pub(super) fn render(f: &mut Frame, app: &mut App) {
    let area = f.area();
    if area.width < 1 || area.height < 1 {
        return;
    }

    if !fits(area.width, area.height) {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(36), Constraint::Min(0)])
        .split(rows[0]);

    sidebar::render(f, app, columns[0]);
    items::render(f, app, columns[1]);
    status::render(f, app, rows[1]);

    if app.show_help {
        help::render(f);
    }
    if let Some(confirm) = &app.pending_confirm {
        render_confirm_overlay(f, confirm);
    }
    if app.context_menu.is_some() {
        render_context_menu_overlay(f, app);
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn overlay_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title)
}

fn render_confirm_overlay(f: &mut Frame, confirm: &ConfirmAction) {
    let text = match confirm {
        ConfirmAction::DeleteFeed { title, .. } => format!(
            "Delete \"{}\"?\n\nIts items are removed from the server.\n\n(y) Confirm  (n/Esc) Cancel",
            title
        ),
        ConfirmAction::MarkAllRead { .. } => {
            "Mark every item in this view as read?\n\n\n(y) Confirm  (n/Esc) Cancel".to_string()
        }
    };

    let overlay = centered(f.area(), 50, 7);
    if overlay.width < 10 || overlay.height < 5 {
        return;
    }
    f.render_widget(Clear, overlay);
    f.render_widget(
        Paragraph::new(text)
            .block(overlay_block(" Confirm "))
            .alignment(Alignment::Center),
        overlay,
    );
}

/// Main menu, rename input or category picker, depending on the sub-state.
fn render_context_menu_overlay(f: &mut Frame, app: &App) {
    let Some(menu) = &app.context_menu else {
        return;
    };

    let marker = |selected: bool| if selected { "> " } else { "  " };

    let (title, text) = match &menu.sub_state {
        ContextMenuSubState::MainMenu => {
            let entries: Vec<String> = CONTEXT_MENU_ITEMS
                .iter()
                .enumerate()
                .map(|(i, item)| format!("{}{}", marker(i == menu.selected_item), item))
                .collect();
            (
                format!(" {} ", menu.feed_title),
                format!("{}\n\n(Enter) Select  (Esc) Cancel", entries.join("\n")),
            )
        }
        ContextMenuSubState::Renaming { input } => (
            " Rename Feed ".to_string(),
            format!("New name:\n\n> {}_\n\n(Enter) Save  (Esc) Back", input),
        ),
        ContextMenuSubState::CategoryPicker { selected } => {
            let entries: Vec<String> = app
                .engine
                .poll()
                .snapshot()
                .map(|s| {
                    s.categories
                        .iter()
                        .enumerate()
                        .map(|(i, c)| format!("{}{}", marker(i == *selected), c.name))
                        .collect()
                })
                .unwrap_or_default();
            (
                " Move to Category ".to_string(),
                format!("{}\n\n(Enter) Move  (Esc) Back", entries.join("\n")),
            )
        }
    };

    let height = (text.lines().count() as u16).saturating_add(2);
    let overlay = centered(f.area(), 45, height);
    if overlay.width < 20 || overlay.height < 5 {
        return;
    }
    f.render_widget(Clear, overlay);
    f.render_widget(Paragraph::new(text).block(overlay_block(&title)), overlay);
}
