use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use crate::app::{App, Focus, SidebarRow};

/// Render the category / feed sidebar.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let is_focused = app.focus == Focus::Sidebar;
    let current = app.engine.selection().scope;

    let items: Vec<ListItem> = app
        .sidebar_rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let (indent, label) = match row {
                SidebarRow::AllItems { .. } => ("", "All items"),
                SidebarRow::Daily => ("", "Daily digest"),
                SidebarRow::Category { name, .. } => ("", name.as_str()),
                SidebarRow::Feed { title, .. } => ("  ", title.as_str()),
            };
            let unread = row.unread();
            let count = if unread > 0 {
                format!(" ({})", unread)
            } else {
                String::new()
            };

            let mut style = Style::default();
            if matches!(row, SidebarRow::Category { .. }) {
                style = style.fg(Color::Yellow);
            }
            if unread > 0 {
                style = style.add_modifier(Modifier::BOLD);
            }
            if row.scope() == current {
                style = style.fg(Color::Cyan);
            }
            if is_focused && i == app.sidebar_selected {
                style = Style::default().bg(Color::DarkGray).fg(Color::White);
            }

            ListItem::new(Line::from(vec![
                Span::raw(indent),
                Span::styled(format!("{}{}", label, count), style),
            ]))
        })
        .collect();

    let border_style = if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title("Feeds"),
    );
    // State only keeps the selected row scrolled into view
    let mut state = ListState::default().with_selected(Some(app.sidebar_selected));
    f.render_stateful_widget(list, area, &mut state);
}
