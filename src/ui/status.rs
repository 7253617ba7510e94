use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use std::borrow::Cow;

use crate::app::{App, Focus};
use crate::sync::PollState;
use crate::util::{display_width, truncate_to_width};

/// Render the status bar: a transient message if one is set, otherwise key
/// hints, with the last sync time on the right.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let left: Cow<'_, str> = if let Some((msg, _)) = &app.status_message {
        Cow::Borrowed(msg.as_ref())
    } else {
        match app.focus {
            Focus::Items => Cow::Borrowed(
                "[j/k]item [space]page [x]expand [o]pen [u]nread/all [A]ll read [d]aily [Tab]feeds [?]help",
            ),
            Focus::Sidebar => {
                Cow::Borrowed("[j/k]move [Enter]open [e]dit feed [u]nread/all [Tab]items [?]help [q]uit")
            }
        }
    };

    let mut right = match &app.last_sync {
        Some(label) => format!("Last sync: {}", label),
        None => String::new(),
    };
    if app.engine.poll().state() == PollState::Paused {
        right.push_str(" (paused)");
    }
    let unsent = app.engine.read_failures();
    if unsent > 0 {
        right.push_str(&format!(" · {} unsent", unsent));
    }

    let width = area.width as usize;
    let right_width = display_width(&right);
    let left = truncate_to_width(&left, width.saturating_sub(right_width + 1));
    let pad = width
        .saturating_sub(display_width(&left))
        .saturating_sub(right_width);
    let text = format!("{}{}{}", left, " ".repeat(pad), right);

    let style = Style::default().bg(Color::DarkGray).fg(Color::White);
    f.render_widget(Paragraph::new(text).style(style), area);
}
