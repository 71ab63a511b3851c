use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{StorageError, WorkflowStore};
use crate::workflow::types::{ActorId, Assessment, Document, DocumentId, Task, TaskId, Vote};

/// In-memory store: the reference semantics for `WorkflowStore` and the
/// test double used throughout the integration suite.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    tasks: HashMap<TaskId, Task>,
    documents: HashMap<DocumentId, Document>,
    votes: HashMap<(DocumentId, ActorId), Vote>,
    assessments: HashMap<(TaskId, DocumentId), Assessment>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn load_task(&self, id: TaskId) -> Result<Option<Task>, StorageError> {
        Ok(self.inner.read().await.tasks.get(&id).cloned())
    }

    async fn save_task(&self, task: &Task) -> Result<(), StorageError> {
        self.inner.write().await.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, StorageError> {
        let mut tasks: Vec<Task> = self.inner.read().await.tasks.values().cloned().collect();
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }

    async fn load_document(&self, id: DocumentId) -> Result<Option<Document>, StorageError> {
        Ok(self.inner.read().await.documents.get(&id).cloned())
    }

    async fn documents_for_task(&self, task: TaskId) -> Result<Vec<Document>, StorageError> {
        let mut documents: Vec<Document> = self
            .inner
            .read()
            .await
            .documents
            .values()
            .filter(|d| d.task == task)
            .cloned()
            .collect();
        documents.sort_by_key(|d| d.submitted_at);
        Ok(documents)
    }

    async fn save_document(&self, document: &Document) -> Result<(), StorageError> {
        self.inner
            .write()
            .await
            .documents
            .insert(document.id, document.clone());
        Ok(())
    }

    async fn votes_for_document(&self, document: DocumentId) -> Result<Vec<Vote>, StorageError> {
        let mut votes: Vec<Vote> = self
            .inner
            .read()
            .await
            .votes
            .values()
            .filter(|v| v.document == document)
            .cloned()
            .collect();
        votes.sort_by_key(|v| v.voted_at);
        Ok(votes)
    }

    async fn save_vote(&self, vote: &Vote) -> Result<(), StorageError> {
        let mut state = self.inner.write().await;
        let key = (vote.document, vote.voter.clone());
        if state.votes.contains_key(&key) {
            return Err(StorageError::Conflict {
                constraint: "vote (document, voter)",
            });
        }
        state.votes.insert(key, vote.clone());
        Ok(())
    }

    async fn assessments_for_task(&self, task: TaskId) -> Result<Vec<Assessment>, StorageError> {
        let mut assessments: Vec<Assessment> = self
            .inner
            .read()
            .await
            .assessments
            .values()
            .filter(|a| a.task == task)
            .cloned()
            .collect();
        assessments.sort_by_key(|a| a.document);
        Ok(assessments)
    }

    async fn save_assessment(&self, assessment: &Assessment) -> Result<(), StorageError> {
        self.inner
            .write()
            .await
            .assessments
            .insert((assessment.task, assessment.document), assessment.clone());
        Ok(())
    }
}
