#![forbid(unsafe_code)]

pub mod app_services;
pub mod autosave;
pub mod catalog;
pub mod error;
pub mod flag_service;
pub mod rest_source;
pub mod sessions;

pub use quiz_core::Clock;
pub use sessions as session;

pub use app_services::AppServices;
pub use autosave::{Autosave, SAVE_DEBOUNCE_MS, SaveState};
pub use catalog::CatalogService;
pub use error::{AppServicesError, CatalogError, RestSourceError, SessionError};
pub use flag_service::FlagService;
pub use rest_source::{RestQuestionSource, RestSourceConfig};

pub use sessions::{
    EndReport, QuestionView, ResumeOutcome, SessionCriteria, SessionEngine, SessionProgress,
    SessionWorkflow, TickOutcome,
};
