// Peerdoc Library - Documentation Review Workflow Engine
// This exposes the core components for testing and integration

pub mod assessment;
pub mod cli;
pub mod config;
pub mod orchestrator;
pub mod storage;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use assessment::{aggregate, quorum_met, select_winner, QuorumPolicy, VoteTally};
pub use config::PeerdocConfig;
pub use orchestrator::{DocumentView, TaskView, VoteOutcome, WorkflowOrchestrator};
pub use storage::{JsonFileStore, MemoryStore, StorageError, WorkflowStore};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
pub use workflow::state_machine::{evaluate, is_overdue, refresh_overtime, OverrideTarget, TaskEvent};
pub use workflow::types::{
    ActorId, Assessment, AssessmentStatus, DocType, Document, DocumentId, DocumentPayload, Score,
    Task, TaskId, TaskSpec, TaskStatus, Vote, VoteId,
};
pub use workflow::WorkflowError;

#[cfg(feature = "database")]
pub use storage::SqliteStore;
