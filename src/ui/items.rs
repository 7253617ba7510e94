use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, Focus, SidebarRow};
use crate::sync::{CollectionKind, Item, Scope};
use crate::util::{strip_control_chars, truncate_to_width};

/// Render the items pane and record its inner size for scrolling and the
/// read marker.
pub fn render(f: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(if app.focus == Focus::Items {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        })
        .title(format!(" {} ", pane_title(app)));
    let inner = block.inner(area);
    f.render_widget(block, area);

    app.items_width = inner.width as usize;
    app.items_height = inner.height as usize;
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let layout = app.layout();
    let width = app.items_width;
    let current = layout.item_at(app.scroll_offset);
    let items = app.engine.items();

    let mut lines: Vec<Line> = Vec::with_capacity(layout.content_height + 2);
    for (index, (item, block)) in items.iter().zip(&layout.blocks).enumerate() {
        let mut title_style = if item.read {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        if current == Some(index) && app.focus == Focus::Items {
            title_style = title_style.fg(Color::Cyan);
        }

        let title = strip_control_chars(item.title());
        lines.push(Line::from(Span::styled(
            truncate_to_width(&title, width).into_owned(),
            title_style,
        )));
        lines.push(Line::from(Span::styled(
            truncate_to_width(&meta_line(item), width).into_owned(),
            Style::default().fg(Color::DarkGray),
        )));
        lines.extend(block.body.iter().map(|l| Line::from(l.as_str())));
        if block.truncated {
            lines.push(Line::from(Span::styled(
                "[x] show more",
                Style::default().fg(Color::Yellow),
            )));
        }
        lines.push(Line::from(""));
    }

    if let Some(msg) = app.end_of_list_message() {
        lines.push(Line::from(Span::styled(
            msg,
            Style::default().add_modifier(Modifier::ITALIC),
        )));
    } else if app.engine.session().fetch_in_flight() {
        lines.push(Line::from(Span::styled(
            "Loading...",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let visible: Vec<Line> = lines
        .into_iter()
        .skip(app.scroll_offset)
        .take(app.items_height)
        .collect();
    f.render_widget(Paragraph::new(visible), inner);
}

fn pane_title(app: &App) -> String {
    let selection = app.engine.selection();
    let scope = match selection.scope {
        Scope::Global => "All items".to_string(),
        Scope::Daily => "Daily digest".to_string(),
        scope => app
            .sidebar_rows
            .iter()
            .find(|r| r.scope() == scope)
            .map(|r| match r {
                SidebarRow::Category { name, .. } => name.clone(),
                SidebarRow::Feed { title, .. } => title.clone(),
                _ => String::new(),
            })
            .unwrap_or_else(|| selection.path()),
    };
    format!("{} [{}]", scope, selection.filter.as_str())
}

/// Source, author and publication time on one line.
fn meta_line(item: &Item) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(3);
    let source = item.source_label();
    if !source.is_empty() {
        parts.push(strip_control_chars(&source).into_owned());
    }
    if let Some(creator) = item.creator().filter(|c| !c.trim().is_empty()) {
        parts.push(format!("by {}", strip_control_chars(creator)));
    }
    if let Some(published) = item.published_at {
        let fmt = match item.kind() {
            CollectionKind::Entries => "%Y-%m-%d %H:%M",
            CollectionKind::Digest => "%Y-%m-%d",
        };
        parts.push(published.format(fmt).to_string());
    }
    parts.join(" · ")
}
