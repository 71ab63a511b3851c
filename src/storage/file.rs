use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{StorageError, WorkflowStore};
use crate::workflow::types::{Assessment, Document, DocumentId, Task, TaskId, Vote};

const STATE_VERSION: &str = "1.0";

/// Whole-state JSON snapshot on disk. Writes go to a temp file first and
/// are renamed into place so a crash never leaves a torn snapshot.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: RwLock<FileState>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct FileState {
    version: String,
    tasks: Vec<Task>,
    documents: Vec<Document>,
    votes: Vec<Vote>,
    assessments: Vec<Assessment>,
}

impl JsonFileStore {
    /// Open (or create) the store at `path`, loading any existing state.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let state = match fs::read(&path).await {
            Ok(bytes) => {
                let state: FileState = serde_json::from_slice(&bytes)?;
                debug!(
                    path = %path.display(),
                    tasks = state.tasks.len(),
                    "loaded workflow state"
                );
                state
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "starting with empty workflow state");
                FileState {
                    version: STATE_VERSION.to_string(),
                    ..Default::default()
                }
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    async fn persist(&self, state: &FileState) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for JsonFileStore {
    async fn load_task(&self, id: TaskId) -> Result<Option<Task>, StorageError> {
        let state = self.state.read().await;
        Ok(state.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn save_task(&self, task: &Task) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        match state.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task.clone(),
            None => state.tasks.push(task.clone()),
        }
        self.persist(&state).await
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, StorageError> {
        let state = self.state.read().await;
        let mut tasks = state.tasks.clone();
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }

    async fn load_document(&self, id: DocumentId) -> Result<Option<Document>, StorageError> {
        let state = self.state.read().await;
        Ok(state.documents.iter().find(|d| d.id == id).cloned())
    }

    async fn documents_for_task(&self, task: TaskId) -> Result<Vec<Document>, StorageError> {
        let state = self.state.read().await;
        let mut documents: Vec<Document> = state
            .documents
            .iter()
            .filter(|d| d.task == task)
            .cloned()
            .collect();
        documents.sort_by_key(|d| d.submitted_at);
        Ok(documents)
    }

    async fn save_document(&self, document: &Document) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        match state.documents.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document.clone(),
            None => state.documents.push(document.clone()),
        }
        self.persist(&state).await
    }

    async fn votes_for_document(&self, document: DocumentId) -> Result<Vec<Vote>, StorageError> {
        let state = self.state.read().await;
        let mut votes: Vec<Vote> = state
            .votes
            .iter()
            .filter(|v| v.document == document)
            .cloned()
            .collect();
        votes.sort_by_key(|v| v.voted_at);
        Ok(votes)
    }

    async fn save_vote(&self, vote: &Vote) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if state
            .votes
            .iter()
            .any(|v| v.document == vote.document && v.voter == vote.voter)
        {
            return Err(StorageError::Conflict {
                constraint: "vote (document, voter)",
            });
        }
        state.votes.push(vote.clone());
        self.persist(&state).await
    }

    async fn assessments_for_task(&self, task: TaskId) -> Result<Vec<Assessment>, StorageError> {
        let state = self.state.read().await;
        let mut assessments: Vec<Assessment> = state
            .assessments
            .iter()
            .filter(|a| a.task == task)
            .cloned()
            .collect();
        assessments.sort_by_key(|a| a.document);
        Ok(assessments)
    }

    async fn save_assessment(&self, assessment: &Assessment) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        match state
            .assessments
            .iter_mut()
            .find(|a| a.task == assessment.task && a.document == assessment.document)
        {
            Some(existing) => *existing = assessment.clone(),
            None => state.assessments.push(assessment.clone()),
        }
        self.persist(&state).await
    }
}
