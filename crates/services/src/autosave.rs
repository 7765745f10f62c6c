use chrono::{DateTime, Duration, Utc};

/// Debounce window for navigation-driven saves.
pub const SAVE_DEBOUNCE_MS: i64 = 500;

/// Lifecycle of the single persisted session slot.
///
/// `Locked` is terminal: once a session ends or is discarded, no later
/// write may resurrect the cleared slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    Idle,
    /// A change is waiting out the debounce window.
    Pending { since: DateTime<Utc> },
    Saved { at: DateTime<Utc> },
    Locked,
}

/// Explicit autosave state machine, polled by the caller instead of driven
/// by timers so every transition is observable and testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Autosave {
    state: SaveState,
}

impl Default for Autosave {
    fn default() -> Self {
        Self::new()
    }
}

impl Autosave {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SaveState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> SaveState {
        self.state
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        matches!(self.state, SaveState::Locked)
    }

    /// Register a change. Restarts the debounce window, so a burst of
    /// changes produces a single trailing save.
    pub fn mark_dirty(&mut self, now: DateTime<Utc>) {
        if !self.is_locked() {
            self.state = SaveState::Pending { since: now };
        }
    }

    /// Whether a pending change has waited out the debounce window.
    #[must_use]
    pub fn due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.state, SaveState::Pending { since }
            if now - since >= Duration::milliseconds(SAVE_DEBOUNCE_MS))
    }

    /// Consume a due pending change. Returns true when the caller should
    /// write the snapshot now.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.due(now) {
            self.state = SaveState::Saved { at: now };
            true
        } else {
            false
        }
    }

    /// Force an immediate save, bypassing the debounce. Returns false when
    /// locked.
    pub fn force(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_locked() {
            return false;
        }
        self.state = SaveState::Saved { at: now };
        true
    }

    /// Permanently block further saves.
    pub fn lock(&mut self) {
        self.state = SaveState::Locked;
    }
}
