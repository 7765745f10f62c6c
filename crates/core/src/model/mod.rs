mod flag;
mod ids;
mod question;
mod snapshot;
mod state;

pub use flag::{FlagEntry, FlagRegistry};
pub use ids::{ParseIdError, QuestionId, SessionId};
pub use question::{EmqStem, Question, QuestionKind, QuestionType, ReadingLink};
pub use snapshot::{SessionMode, SessionSnapshot, SnapshotError, TypeFilter};
pub use state::{Answer, AnswerStatus, QuestionState, ShuffledCorrect, ShuffledOrder, StateError};
