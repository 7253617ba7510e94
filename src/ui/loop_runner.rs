//! Main event loop for the TUI.
//!
//! Multiplexes terminal input, background task results, the sidebar poll
//! timer, the unread badge interval and a UI tick.

use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{
        DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
        MouseEventKind,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle,
    },
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use crate::app::{App, AppEvent};
use crate::sync::{PauseReason, PollTick};

use super::events::handle_app_event;
use super::helpers::{
    after_scroll, dispatch_navigation, dispatch_refresh, fill_viewport, scan_visibility,
    spawn_unread_count,
};
use super::input::handle_input;
use super::render::{fits, render};

/// Rows moved per mouse wheel notch.
const WHEEL_ROWS: isize = 3;

/// Result of handling a key press event.
pub enum Action {
    /// Continue the event loop and process more events.
    Continue,
    /// Exit the application and restore the terminal.
    Quit,
}

/// Runs the TUI application event loop.
///
/// Starts the sync engine (first page and first sidebar refresh), then uses
/// `tokio::select!` over:
/// - **Signals**: SIGTERM / SIGINT end the loop
/// - **Terminal events**: keys, mouse wheel, focus changes (poll pause and
///   resume) and resizes (sidebar visibility)
/// - **Background tasks**: results posted as [`AppEvent`]s
/// - **Poll ticks**: from the engine's sidebar timer
/// - **Badge interval**: unread count for the terminal title
/// - **UI tick**: 250ms, for status message expiry
///
/// Installs a panic hook that restores the terminal before unwinding.
pub async fn run(
    app: &mut App,
    badge_interval: Duration,
    event_tx: mpsc::Sender<AppEvent>,
    mut event_rx: mpsc::Receiver<AppEvent>,
    mut tick_rx: mpsc::Receiver<PollTick>,
) -> Result<()> {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(
            io::stdout(),
            DisableFocusChange,
            DisableMouseCapture,
            LeaveAlternateScreen
        );
        original_hook(panic_info);
    }));

    let mut terminal = setup_terminal()?;
    let mut event_stream = crossterm::event::EventStream::new();

    let mut tick_interval = tokio::time::interval(Duration::from_millis(250));
    // First tick fires immediately: the badge is fetched at startup
    let mut badge_interval = tokio::time::interval(badge_interval);
    badge_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;
    #[cfg(unix)]
    let mut sigint = signal(SignalKind::interrupt())?;

    let (width, height) = crossterm::terminal::size()?;
    app.engine.poll_mut().on_visibility(fits(width, height));

    let nav = app.engine.start();
    dispatch_navigation(app, nav, &event_tx);
    tracing::info!(view = %app.engine.selection(), "Sync engine started");

    loop {
        if app.title_dirty {
            execute!(terminal.backend_mut(), SetTitle(app.window_title()))?;
            app.title_dirty = false;
        }

        if app.needs_redraw {
            terminal.draw(|f| render(f, app))?;
            app.needs_redraw = false;

            if app.rescan_after_draw {
                app.rescan_after_draw = false;
                scan_visibility(app, &event_tx);
                fill_viewport(app, &event_tx);
                app.needs_redraw = true;
            }
        }

        if app.clear_expired_status() {
            app.needs_redraw = true;
        }

        // Drain finished tasks before waiting on input
        while let Ok(event) = event_rx.try_recv() {
            app.needs_redraw = true;
            handle_app_event(app, event, &event_tx);
        }

        #[cfg(unix)]
        let sigterm_fut = sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_fut = std::future::pending::<Option<()>>();

        #[cfg(unix)]
        let sigint_fut = sigint.recv();
        #[cfg(not(unix))]
        let sigint_fut = std::future::pending::<Option<()>>();

        tokio::select! {
            biased;

            _ = sigterm_fut => {
                tracing::info!("Received SIGTERM, shutting down gracefully");
                break;
            }

            _ = sigint_fut => {
                tracing::info!("Received SIGINT, shutting down gracefully");
                break;
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(event)) => {
                        if let Action::Quit = handle_terminal_event(app, event, &event_tx).await {
                            break;
                        }
                    }
                    Some(Err(e)) => tracing::warn!(error = %e, "Terminal event error"),
                    None => break,
                }
            }

            Some(event) = event_rx.recv() => {
                app.needs_redraw = true;
                handle_app_event(app, event, &event_tx);
            }

            Some(tick) = tick_rx.recv() => {
                let ticket = app.engine.poll_mut().on_tick(tick);
                dispatch_refresh(app, ticket, &event_tx);
            }

            _ = badge_interval.tick() => {
                spawn_unread_count(app, &event_tx);
            }

            _ = tick_interval.tick() => {}
        }
    }

    restore_terminal(terminal)?;
    Ok(())
}

async fn handle_terminal_event(
    app: &mut App,
    event: Event,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    match event {
        Event::Key(key) => {
            app.needs_redraw = true;
            match handle_input(app, key.code, key.modifiers, event_tx).await {
                Ok(action) => return action,
                Err(e) => app.set_status(format!("Error: {}", e)),
            }
        }
        Event::FocusLost => {
            tracing::debug!("Terminal lost focus, pausing poll");
            app.engine.poll_mut().pause(PauseReason::WindowBlur);
            app.needs_redraw = true;
        }
        Event::FocusGained => {
            tracing::debug!("Terminal gained focus, resuming poll");
            let ticket = app.engine.poll_mut().resume(PauseReason::WindowBlur);
            dispatch_refresh(app, ticket, event_tx);
            app.needs_redraw = true;
        }
        Event::Resize(width, height) => {
            let ticket = app.engine.poll_mut().on_visibility(fits(width, height));
            dispatch_refresh(app, ticket, event_tx);
            // The read scan needs the new pane size from the next draw
            app.needs_redraw = true;
            app.rescan_after_draw = true;
        }
        Event::Mouse(mouse) if app.context_menu.is_none() && app.pending_confirm.is_none() => {
            let delta = match mouse.kind {
                MouseEventKind::ScrollDown => WHEEL_ROWS,
                MouseEventKind::ScrollUp => -WHEEL_ROWS,
                _ => 0,
            };
            if delta != 0 && app.scroll_by(delta) {
                after_scroll(app, event_tx);
                app.needs_redraw = true;
            }
        }
        _ => {}
    }
    Action::Continue
}

/// Set up the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableFocusChange,
        EnableMouseCapture
    )?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal to normal state.
fn restore_terminal(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableFocusChange,
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
}
