//! Help overlay: keybinding table grouped by panel.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, Row, Table},
    Frame,
};

const BINDINGS: &[(&str, &[(&str, &str)])] = &[
    (
        "General",
        &[
            ("Tab", "Switch between feeds and items"),
            ("u", "Toggle unread / all items"),
            ("d", "Daily digest"),
            ("r", "Reload the current view"),
            ("A", "Mark everything in view as read"),
            ("?", "Toggle this help"),
            ("q", "Quit"),
        ],
    ),
    (
        "Items",
        &[
            ("j / k", "Next / previous item"),
            ("Down / Up", "Scroll one line"),
            ("Space, PgDn / PgUp", "Scroll one page"),
            ("Ctrl+d / Ctrl+u", "Scroll half a page"),
            ("g / G", "Top / bottom"),
            ("x, Enter", "Expand or collapse a long item"),
            ("o", "Open link in browser"),
        ],
    ),
    (
        "Feeds",
        &[
            ("j / k", "Move selection"),
            ("Enter", "Open feed or category"),
            ("e", "Rename, move or delete feed"),
        ],
    ),
];

/// Render the help overlay on top of the current view.
pub fn render(f: &mut Frame) {
    let overlay = centered_rect(70, 80, f.area());
    if overlay.width < 20 || overlay.height < 6 {
        return;
    }
    f.render_widget(Clear, overlay);

    let mut rows: Vec<Row> = Vec::new();
    for (group, bindings) in BINDINGS {
        if !rows.is_empty() {
            rows.push(Row::new(vec![String::new(), String::new()]));
        }
        rows.push(
            Row::new(vec![format!("-- {} --", group), String::new()])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        );
        for (key, action) in *bindings {
            rows.push(Row::new(vec![format!("  {}", key), action.to_string()]));
        }
    }

    let table = Table::new(rows, [Constraint::Length(22), Constraint::Min(20)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Help (? to close) "),
    );
    f.render_widget(table, overlay);
}

/// Centered rectangle covering the given percentage of `area`.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let width = area.width * percent_x / 100;
    let height = area.height * percent_y / 100;
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
