#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    FlagStore, InMemoryStore, QuestionRepository, SnapshotStore, StorageError, Stores, TopicWeights,
    WeightStore,
};
pub use sqlite::{SqliteInitError, SqliteStore};
