// Task Workflow Module - lifecycle state machine and domain types
//
// The state machine is a pure evaluation over the persisted task status;
// the orchestrator is the only caller that writes the result back.

pub mod state_machine;
pub mod types;

pub use state_machine::{evaluate, is_overdue, refresh_overtime, OverrideTarget, TaskEvent};
pub use types::{
    ActorId, Assessment, AssessmentStatus, DocType, Document, DocumentId, DocumentPayload, Score,
    Task, TaskId, TaskSpec, TaskStatus, Vote, VoteId,
};

use thiserror::Error;

use crate::storage::StorageError;

/// Domain failures surfaced at the orchestrator boundary. Storage failures
/// pass through unchanged; everything else is a typed validation error the
/// caller can correct and retry.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("actor '{actor}' is not assigned to this task")]
    NotAssigned { actor: ActorId },

    #[error("action '{action}' is not valid while task is {status}")]
    InvalidState {
        status: TaskStatus,
        action: &'static str,
    },

    #[error("voter has already cast a vote on this document")]
    DuplicateVote,

    #[error("score {value} is outside the allowed range [1, 10]")]
    InvalidScore { value: u8 },

    #[error("writers may not vote on their own document")]
    SelfVote,

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error(transparent)]
    Storage(#[from] StorageError),
}
