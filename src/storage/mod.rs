// Storage Layer - the persistence collaborator behind the workflow engine
//
// The engine only ever talks to `WorkflowStore`; concurrent writers are
// arbitrated by the store's uniqueness constraints (a losing concurrent
// vote surfaces as `Conflict`, mapped to a duplicate-vote failure by the
// orchestrator).

pub mod file;
pub mod memory;

#[cfg(feature = "database")]
pub mod database;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

#[cfg(feature = "database")]
pub use database::SqliteStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::workflow::types::{Assessment, Document, DocumentId, Task, TaskId, Vote};

/// Storage failures, kept distinct from domain validation errors. The
/// engine never retries these; retries are the collaborator's business.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("uniqueness conflict on {constraint}")]
    Conflict { constraint: &'static str },

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// The persistence contract the workflow engine consumes. Entities follow
/// the Task -> Document -> Vote ownership chain; assessments are keyed by
/// (task, document) and upserted, never hand-edited.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn load_task(&self, id: TaskId) -> Result<Option<Task>, StorageError>;
    async fn save_task(&self, task: &Task) -> Result<(), StorageError>;
    async fn list_tasks(&self) -> Result<Vec<Task>, StorageError>;

    async fn load_document(&self, id: DocumentId) -> Result<Option<Document>, StorageError>;
    async fn documents_for_task(&self, task: TaskId) -> Result<Vec<Document>, StorageError>;
    async fn save_document(&self, document: &Document) -> Result<(), StorageError>;

    async fn votes_for_document(&self, document: DocumentId) -> Result<Vec<Vote>, StorageError>;
    /// Enforces the unique (document, voter) constraint; the losing side
    /// of a concurrent double-vote gets `Conflict`.
    async fn save_vote(&self, vote: &Vote) -> Result<(), StorageError>;

    async fn assessments_for_task(&self, task: TaskId) -> Result<Vec<Assessment>, StorageError>;
    async fn save_assessment(&self, assessment: &Assessment) -> Result<(), StorageError>;
}
