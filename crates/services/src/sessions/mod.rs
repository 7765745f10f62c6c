mod engine;
mod exam_clock;
mod plan;
mod progress;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use engine::{
    DISTINCTION_THRESHOLD, EndReport, FlagToggle, MBA_MIN_SELECTIONS, SessionEngine,
    TopicBreakdown, WEAK_TOPIC_THRESHOLD,
};
pub use exam_clock::{AUTOSAVE_TICK_INTERVAL, SECONDS_PER_QUESTION, TickOutcome};
pub use plan::{
    MOCK_EXAM_COUNT, MOCK_EXAM_LENGTH, SMART_REVISION_LIMIT, SessionBuilder, SessionCriteria,
    SessionPlan,
};
pub use progress::SessionProgress;
pub use view::QuestionView;
pub use workflow::{ResumeOutcome, SessionWorkflow};
