//! Sequential dispatch over the contact store.
//!
//! The cursor is never stored: "current" is always the first pending record,
//! and the queue is finished when none is left.

use crate::{
    channel::types::DeliveryFailure,
    domain::{ChannelMode, Contact, ContactId, ContactStatus},
    store::{ContactStore, StatusCounts},
};

pub const DEFAULT_WARMUP_SECS: u32 = 3;
pub const DEFAULT_DIRECT_LINK_DELAY_SECS: u32 = 2;
pub const DEFAULT_REMOTE_SERVER_DELAY_SECS: u32 = 10;

/// Auto-play timing, in whole seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueTiming {
    /// Countdown after auto-play is switched on.
    pub warmup_secs: u32,
    pub direct_link_delay_secs: u32,
    /// Longer by default to respect the server's rate limits.
    pub remote_server_delay_secs: u32,
}

impl Default for QueueTiming {
    fn default() -> Self {
        Self {
            warmup_secs: DEFAULT_WARMUP_SECS,
            direct_link_delay_secs: DEFAULT_DIRECT_LINK_DELAY_SECS,
            remote_server_delay_secs: DEFAULT_REMOTE_SERVER_DELAY_SECS,
        }
    }
}

impl QueueTiming {
    pub fn delay_for(&self, mode: ChannelMode) -> u32 {
        match mode {
            ChannelMode::DirectLink => self.direct_link_delay_secs,
            ChannelMode::RemoteServer => self.remote_server_delay_secs,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cursor {
    At(usize),
    Finished,
}

/// Result of one auto-play second.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Auto-play off, nothing pending, channel unavailable, or a send is in flight.
    Idle,
    /// Seconds left before the next send.
    Countdown(u32),
    /// The countdown hit zero; the caller must send the current contact.
    SendDue,
}

#[derive(Clone, Debug)]
pub struct DispatchQueue {
    store: ContactStore,
    timing: QueueTiming,
    auto_play: bool,
    countdown: u32,
    auto_delay: u32,
    last_error: Option<String>,
    in_flight: Option<ContactId>,
}

impl DispatchQueue {
    pub fn new(timing: QueueTiming, mode: ChannelMode) -> Self {
        let auto_delay = timing.delay_for(mode);
        Self {
            store: ContactStore::new(),
            timing,
            auto_play: false,
            countdown: auto_delay,
            auto_delay,
            last_error: None,
            in_flight: None,
        }
    }

    /// Replace the list with a fresh record set.
    ///
    /// An attempt already in flight keeps the send guard until its outcome
    /// arrives, so no second send can start meanwhile.
    pub fn load(&mut self, contacts: Vec<Contact>) {
        self.store.replace_all(contacts);
        self.auto_play = false;
        self.countdown = self.auto_delay;
        self.last_error = None;
    }

    /// Drop every record and return to the empty initial state.
    pub fn reset(&mut self) {
        self.load(Vec::new());
    }

    /// Switch the steady-state delay for a new channel mode. Auto-play stops.
    pub fn set_mode(&mut self, mode: ChannelMode) {
        self.auto_delay = self.timing.delay_for(mode);
        self.countdown = self.auto_delay;
        self.auto_play = false;
    }

    pub fn store(&self) -> &ContactStore {
        &self.store
    }

    pub fn contacts(&self) -> &[Contact] {
        self.store.all()
    }

    pub fn cursor(&self) -> Cursor {
        match self.store.all().iter().position(|c| c.status.is_pending()) {
            Some(i) => Cursor::At(i),
            None => Cursor::Finished,
        }
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.cursor() {
            Cursor::At(i) => Some(i),
            Cursor::Finished => None,
        }
    }

    pub fn current(&self) -> Option<&Contact> {
        self.current_index().map(|i| &self.store.all()[i])
    }

    pub fn is_finished(&self) -> bool {
        self.cursor() == Cursor::Finished
    }

    pub fn auto_play(&self) -> bool {
        self.auto_play
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    pub fn auto_delay(&self) -> u32 {
        self.auto_delay
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn counts(&self) -> StatusCounts {
        self.store.counts()
    }

    /// Share of records no longer pending, rounded to whole percent.
    pub fn progress_percent(&self) -> u8 {
        let counts = self.store.counts();
        if counts.total() == 0 {
            return 0;
        }
        let pct = (counts.done() as f64 * 100.0 / counts.total() as f64).round();
        pct as u8
    }

    /// Mark the current record skipped. Returns the skipped contact.
    pub fn skip_current(&mut self) -> Option<Contact> {
        let current = self.current()?.clone();
        self.store.update_status(current.id, ContactStatus::Skipped);
        self.countdown = self.auto_delay;
        self.after_change();
        Some(current)
    }

    /// Claim the current record for a send attempt.
    ///
    /// Returns `None` when nothing is pending or another attempt is still
    /// unresolved.
    pub fn begin_send(&mut self) -> Option<Contact> {
        if self.in_flight.is_some() {
            return None;
        }
        let current = self.current()?.clone();
        self.in_flight = Some(current.id);
        self.last_error = None;
        Some(current)
    }

    /// Apply the outcome of the attempt started by [`begin_send`](Self::begin_send).
    ///
    /// Outcomes for any other id are ignored. An outcome for a record that
    /// was replaced while in flight only releases the guard.
    pub fn finish_send(&mut self, id: ContactId, outcome: &Result<(), DeliveryFailure>) {
        if self.in_flight != Some(id) {
            return;
        }
        self.in_flight = None;
        if self.store.get(id).is_none() {
            tracing::debug!(%id, "outcome for a replaced list dropped");
            return;
        }

        match outcome {
            Ok(()) => {
                self.store.update_status(id, ContactStatus::Sent);
            }
            Err(failure) => {
                if failure.marks_contact_error() {
                    self.store.update_status(id, ContactStatus::Error);
                }
                self.last_error = Some(failure.to_string());
                self.auto_play = false;
            }
        }
        self.after_change();
    }

    /// Flip auto-play. Switching it on restarts the warm-up countdown.
    pub fn toggle_auto_play(&mut self) -> bool {
        if !self.auto_play {
            self.countdown = self.timing.warmup_secs;
        }
        self.auto_play = !self.auto_play;
        self.auto_play
    }

    pub fn stop_auto_play(&mut self) {
        self.auto_play = false;
    }

    /// Advance the auto-play timer by one second.
    pub fn tick(&mut self, channel_available: bool) -> TickOutcome {
        if !self.auto_play
            || self.in_flight.is_some()
            || !channel_available
            || self.current().is_none()
        {
            return TickOutcome::Idle;
        }

        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            return TickOutcome::Countdown(self.countdown);
        }

        self.countdown = self.auto_delay;
        TickOutcome::SendDue
    }

    fn after_change(&mut self) {
        if self.is_finished() {
            self.auto_play = false;
        }
    }
}
