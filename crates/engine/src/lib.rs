//! Cadence orchestration: multi-step outreach sequences, per-contact
//! enrollments, and the state machine that walks them through each step.

pub mod directory;
pub mod draft;
pub mod engine;
pub mod repository;
pub mod schedule;
pub mod state_machine;
pub mod types;
pub mod validation;

pub use directory::HttpContactDirectory;
pub use draft::{DraftAdapter, DraftGenerator, DraftRequest, HttpDraftGenerator, TemplateDraftGenerator};
pub use engine::CadenceEngine;
pub use repository::{CadenceRepository, InMemoryRepository};
pub use state_machine::EnrollmentStateMachine;
