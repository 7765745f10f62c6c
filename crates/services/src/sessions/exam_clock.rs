use super::engine::SessionEngine;

/// Exam time budget per question, in seconds.
pub const SECONDS_PER_QUESTION: i64 = 60;

/// A forced snapshot write happens every this many countdown ticks.
pub const AUTOSAVE_TICK_INTERVAL: i64 = 5;

/// What one countdown tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Untimed session or the session has already ended; nothing to do.
    Idle,
    /// Clock advanced. `autosave_due` marks the periodic forced save.
    Running { remaining: i64, autosave_due: bool },
    /// The clock just ran out; the caller must end the session.
    Expired,
}

impl SessionEngine {
    /// Advance the exam clock by one second.
    ///
    /// The tick is driven externally so tests and hosts control time; the
    /// engine only accounts for it.
    pub fn tick(&mut self) -> TickOutcome {
        if self.is_ended() {
            return TickOutcome::Idle;
        }
        let Some(remaining) = self.time_left() else {
            return TickOutcome::Idle;
        };
        let remaining = remaining - 1;
        self.set_time_left(Some(remaining));
        if remaining <= 0 {
            return TickOutcome::Expired;
        }
        TickOutcome::Running {
            remaining,
            autosave_due: remaining % AUTOSAVE_TICK_INTERVAL == 0,
        }
    }
}
