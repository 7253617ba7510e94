//! Change-suppressing sidebar poll loop.
//!
//! The loop owns a periodic timer task that posts [`PollTick`]s to the event
//! loop, the set of reasons it is currently paused for, and the last rendered
//! [`SidebarSnapshot`]. It performs no I/O itself: it hands out
//! [`RefreshTicket`]s and is told the result through [`PollLoop::on_snapshot`].
//!
//! State machine:
//!
//! ```text
//! Idle --start--> Polling --pause(r)--> Paused
//!                    ^                    |
//!                    +--resume(last r)----+   (immediate refresh + fresh timer)
//! ```
use std::collections::HashSet;
use std::fmt::Display;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::snapshot::SidebarSnapshot;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    Paused,
}

/// Why polling is suspended. Polling resumes only once every reason is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PauseReason {
    /// The terminal lost focus.
    WindowBlur,
    /// A feed edit (context menu, rename, category picker) is open.
    Editing,
}

/// Tick posted by the timer task. `timer` identifies the task that sent it so
/// ticks from an aborted timer still sitting in the channel are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTick {
    pub timer: u64,
}

/// Permission to fetch one sidebar snapshot.
///
/// `generation` ties the response to a baseline, `epoch` to one unbroken
/// stretch of polling. Every pause starts a new epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    pub generation: u64,
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Differs from the baseline; the sidebar must be re-rendered.
    Changed,
    /// Same content as the baseline; nothing to do.
    Unchanged,
    /// Arrived for an old baseline, while paused, or was issued before the
    /// last pause.
    Discarded,
    /// The fetch failed; the previous snapshot stays.
    Failed,
}

/// Result of applying a snapshot response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotApplied {
    pub outcome: SnapshotOutcome,
    /// A refresh that was requested while this one was in flight.
    pub follow_up: Option<RefreshTicket>,
}

struct ArmedTimer {
    id: u64,
    handle: JoinHandle<()>,
}

pub struct PollLoop {
    state: PollState,
    pause_reasons: HashSet<PauseReason>,
    interval: Duration,
    tick_tx: mpsc::Sender<PollTick>,
    timer: Option<ArmedTimer>,
    next_timer_id: u64,
    visible: bool,
    baseline: Option<SidebarSnapshot>,
    generation: u64,
    epoch: u64,
    in_flight: bool,
    refresh_queued: bool,
}

impl std::fmt::Debug for PollLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollLoop")
            .field("state", &self.state)
            .field("pause_reasons", &self.pause_reasons)
            .field("timer", &self.timer.as_ref().map(|t| t.id))
            .field("visible", &self.visible)
            .field("generation", &self.generation)
            .field("epoch", &self.epoch)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl PollLoop {
    pub fn new(interval: Duration, tick_tx: mpsc::Sender<PollTick>) -> Self {
        Self {
            state: PollState::Idle,
            pause_reasons: HashSet::new(),
            interval: interval.max(Duration::from_secs(1)),
            tick_tx,
            timer: None,
            next_timer_id: 1,
            visible: true,
            baseline: None,
            generation: 0,
            epoch: 0,
            in_flight: false,
            refresh_queued: false,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn timer_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn refresh_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Last snapshot that was rendered, if any.
    pub fn snapshot(&self) -> Option<&SidebarSnapshot> {
        self.baseline.as_ref()
    }

    /// Leave `Idle`. Returns the ticket for the initial refresh.
    ///
    /// If a pause reason was recorded before starting, the loop goes straight
    /// to `Paused` and the first refresh happens on resume.
    pub fn start(&mut self) -> Option<RefreshTicket> {
        if self.state != PollState::Idle {
            return None;
        }
        if !self.pause_reasons.is_empty() {
            self.state = PollState::Paused;
            tracing::debug!(reasons = ?self.pause_reasons, "Poll loop started paused");
            return None;
        }
        self.state = PollState::Polling;
        self.arm();
        tracing::debug!(interval_secs = self.interval.as_secs(), "Poll loop started");
        self.request_refresh()
    }

    pub fn pause(&mut self, reason: PauseReason) {
        if !self.pause_reasons.insert(reason) {
            return;
        }
        if self.state == PollState::Polling {
            self.disarm();
            self.state = PollState::Paused;
            // Whatever is still on its way is dropped on arrival; resuming
            // issues its own refresh straight away.
            self.epoch = self.epoch.wrapping_add(1);
            self.in_flight = false;
            self.refresh_queued = false;
            tracing::debug!(?reason, "Poll loop paused");
        }
    }

    /// Release one pause reason. When it was the last one, polling resumes
    /// with one immediate refresh and a fresh timer.
    pub fn resume(&mut self, reason: PauseReason) -> Option<RefreshTicket> {
        if !self.pause_reasons.remove(&reason) {
            return None;
        }
        if self.state != PollState::Paused || !self.pause_reasons.is_empty() {
            return None;
        }
        self.state = PollState::Polling;
        self.arm();
        tracing::debug!(?reason, "Poll loop resumed");
        self.request_refresh()
    }

    pub fn on_tick(&mut self, tick: PollTick) -> Option<RefreshTicket> {
        if self.state != PollState::Polling {
            return None;
        }
        if self.timer.as_ref().map(|t| t.id) != Some(tick.timer) {
            tracing::trace!(timer = tick.timer, "Ignoring tick from retired timer");
            return None;
        }
        if !self.visible {
            return None;
        }
        self.request_refresh()
    }

    /// Sidebar became renderable (`true`) or hidden (`false`). Showing it
    /// triggers an immediate refresh while polling.
    pub fn on_visibility(&mut self, visible: bool) -> Option<RefreshTicket> {
        let was_visible = std::mem::replace(&mut self.visible, visible);
        if visible && !was_visible && self.state == PollState::Polling {
            return self.request_refresh();
        }
        None
    }

    /// Ask for a refresh outside the timer (after a read commit, a feed edit
    /// or a navigation). Refused while not polling; queued while another
    /// refresh is in flight.
    pub fn request_refresh(&mut self) -> Option<RefreshTicket> {
        if self.state != PollState::Polling {
            return None;
        }
        if self.in_flight {
            self.refresh_queued = true;
            return None;
        }
        self.in_flight = true;
        Some(RefreshTicket {
            generation: self.generation,
            epoch: self.epoch,
        })
    }

    /// Apply a snapshot response for `ticket`.
    pub fn on_snapshot<E: Display>(
        &mut self,
        ticket: RefreshTicket,
        result: Result<SidebarSnapshot, E>,
    ) -> SnapshotApplied {
        if ticket.epoch != self.epoch {
            tracing::debug!(
                ticket = ticket.epoch,
                current = self.epoch,
                "Dropping snapshot issued before a pause"
            );
            return SnapshotApplied {
                outcome: SnapshotOutcome::Discarded,
                follow_up: None,
            };
        }
        self.in_flight = false;

        let outcome = if ticket.generation != self.generation {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.generation,
                "Dropping snapshot for old baseline"
            );
            SnapshotOutcome::Discarded
        } else if self.state != PollState::Polling {
            SnapshotOutcome::Discarded
        } else {
            match result {
                Ok(snapshot) => match &self.baseline {
                    Some(baseline) if baseline.same_content(&snapshot) => {
                        SnapshotOutcome::Unchanged
                    }
                    _ => {
                        self.baseline = Some(snapshot);
                        SnapshotOutcome::Changed
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to refresh sidebar");
                    SnapshotOutcome::Failed
                }
            }
        };

        let follow_up = if std::mem::take(&mut self.refresh_queued) {
            self.request_refresh()
        } else {
            None
        };

        SnapshotApplied { outcome, follow_up }
    }

    /// Forget the baseline so the next snapshot always renders. Responses
    /// issued before the reset are discarded.
    pub fn reset_baseline(&mut self) {
        self.baseline = None;
        self.generation = self.generation.wrapping_add(1);
    }

    fn arm(&mut self) {
        self.disarm();
        let id = self.next_timer_id;
        self.next_timer_id = self.next_timer_id.wrapping_add(1);

        let period = self.interval;
        let tx = self.tick_tx.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(PollTick { timer: id }).await.is_err() {
                    break;
                }
            }
        });
        self.timer = Some(ArmedTimer { id, handle });
    }

    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
        }
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.disarm();
    }
}
