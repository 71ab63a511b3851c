// Workflow Orchestrator - the single entry point external callers use to
// mutate task state. No other code path writes `Task.status`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assessment::{self, QuorumPolicy};
use crate::storage::{StorageError, WorkflowStore};
use crate::workflow::state_machine::{self, OverrideTarget, TaskEvent};
use crate::workflow::types::{
    ActorId, Assessment, AssessmentStatus, Document, DocumentId, DocumentPayload, Task, TaskId,
    TaskSpec, TaskStatus, Vote, VoteId,
};
use crate::workflow::WorkflowError;

/// Read-model returned by `view_task`: task plus documents, votes,
/// assessments and the computed overdue flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskView {
    pub task: Task,
    pub documents: Vec<DocumentView>,
    pub is_overdue: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentView {
    pub document: Document,
    pub votes: Vec<Vote>,
    pub assessment: Assessment,
}

/// Result of a successful `cast_vote`.
#[derive(Debug, Clone)]
pub struct VoteOutcome {
    pub task: Task,
    pub vote: Vote,
    pub assessment: Assessment,
}

pub struct WorkflowOrchestrator<S: WorkflowStore> {
    store: S,
    reviewer_pool: Vec<ActorId>,
    quorum: QuorumPolicy,
}

impl<S: WorkflowStore> WorkflowOrchestrator<S> {
    pub fn new(store: S, reviewer_pool: Vec<ActorId>, quorum: QuorumPolicy) -> Self {
        Self {
            store,
            reviewer_pool,
            quorum,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn require_task(&self, id: TaskId) -> Result<Task, WorkflowError> {
        self.store
            .load_task(id)
            .await?
            .ok_or(WorkflowError::NotFound { entity: "task" })
    }

    /// Materialize lazily-evaluated overtime and persist it so listings
    /// stay consistent before the next inspection.
    async fn materialize_overtime(
        &self,
        task: &mut Task,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        let refreshed = state_machine::refresh_overtime(task.status, task.deadline, now);
        if refreshed != task.status {
            info!(
                task_id = %task.id,
                from = %task.status,
                deadline = ?task.deadline,
                "task moved to overtime"
            );
            task.status = refreshed;
            task.touch();
            self.store.save_task(task).await?;
        }
        Ok(())
    }

    /// Create a new task in `not_started`, on behalf of the assigning
    /// actor (admin or code author).
    pub async fn create_task(&self, spec: TaskSpec) -> Result<Task, WorkflowError> {
        let task = spec.into_task(Utc::now());
        self.store.save_task(&task).await?;
        info!(
            task_id = %task.id,
            writer1 = %task.writer1,
            writer2 = ?task.writer2,
            deadline = ?task.deadline,
            "task created"
        );
        Ok(task)
    }

    /// A writer accepts their assignment. Idempotent-once: a repeat accept
    /// by the same (or the other) assigned writer is a no-op, not an error.
    pub async fn accept_assignment(
        &self,
        task_id: TaskId,
        actor: &ActorId,
    ) -> Result<Task, WorkflowError> {
        let mut task = self.require_task(task_id).await?;
        self.materialize_overtime(&mut task, Utc::now()).await?;

        if !task.is_writer(actor) {
            return Err(WorkflowError::NotAssigned {
                actor: actor.clone(),
            });
        }

        let next = state_machine::evaluate(
            &task,
            &TaskEvent::AcceptAssignment {
                writer: actor.clone(),
            },
        )?;
        if next != task.status {
            task.status = next;
            task.touch();
            self.store.save_task(&task).await?;
        }
        Ok(task)
    }

    /// A writer submits their draft. Documents are immutable: a second
    /// submission by the same writer is rejected, except when it retries
    /// a submission whose status write never landed. Writing closes
    /// (voting opens) once every required writer has submitted.
    pub async fn submit_document(
        &self,
        task_id: TaskId,
        actor: &ActorId,
        payload: DocumentPayload,
    ) -> Result<(Task, Document), WorkflowError> {
        let now = Utc::now();
        let mut task = self.require_task(task_id).await?;
        self.materialize_overtime(&mut task, now).await?;

        if !task.is_writer(actor) {
            return Err(WorkflowError::NotAssigned {
                actor: actor.clone(),
            });
        }

        let existing = self.store.documents_for_task(task.id).await?;
        if existing.iter().any(|d| d.author == *actor) {
            return self.resume_or_reject_submission(task, actor, &existing).await;
        }

        let all_writers_submitted = task
            .required_writers()
            .iter()
            .all(|writer| *writer == actor || existing.iter().any(|d| d.author == **writer));

        let next = state_machine::evaluate(
            &task,
            &TaskEvent::DocumentSubmitted {
                all_writers_submitted,
            },
        )?;

        let document = Document {
            id: DocumentId::new(),
            task: task.id,
            author: actor.clone(),
            title: payload.title,
            content: payload.content,
            doc_type: payload.doc_type,
            submitted_at: now,
        };
        self.store.save_document(&document).await?;
        // Seed the pending assessment projection for the new document.
        self.store
            .save_assessment(&assessment::project_assessment(task.id, document.id, &[]))
            .await?;

        task.status = next;
        task.touch();
        self.store.save_task(&task).await?;

        info!(
            task_id = %task.id,
            document_id = %document.id,
            author = %actor,
            status = %task.status,
            "document submitted"
        );
        Ok((task, document))
    }

    /// A document by this writer already exists. When the recorded status
    /// is behind what that submission should have produced (an earlier
    /// request failed between the document write and the status write),
    /// finish the transition and hand back the stored document. Otherwise
    /// the retry is a real resubmission and is rejected.
    async fn resume_or_reject_submission(
        &self,
        mut task: Task,
        actor: &ActorId,
        existing: &[Document],
    ) -> Result<(Task, Document), WorkflowError> {
        let all_writers_submitted = task
            .required_writers()
            .iter()
            .all(|writer| existing.iter().any(|d| d.author == **writer));

        if let Ok(next) = state_machine::evaluate(
            &task,
            &TaskEvent::DocumentSubmitted {
                all_writers_submitted,
            },
        ) {
            if next != task.status {
                let document = existing
                    .iter()
                    .find(|d| d.author == *actor)
                    .cloned()
                    .ok_or(WorkflowError::NotFound { entity: "document" })?;

                let assessments = self.store.assessments_for_task(task.id).await?;
                for doc in existing {
                    if !assessments.iter().any(|a| a.document == doc.id) {
                        self.store
                            .save_assessment(&assessment::project_assessment(task.id, doc.id, &[]))
                            .await?;
                    }
                }

                task.status = next;
                task.touch();
                self.store.save_task(&task).await?;
                info!(
                    task_id = %task.id,
                    document_id = %document.id,
                    author = %actor,
                    status = %task.status,
                    "finished interrupted submission"
                );
                return Ok((task, document));
            }
        }

        warn!(task_id = %task.id, actor = %actor, "rejected resubmission");
        Err(WorkflowError::InvalidState {
            status: task.status,
            action: "resubmit_document",
        })
    }

    /// A reviewer casts a vote on a document. On success the assessment
    /// projection is refreshed; when the quorum policy is satisfied the
    /// winner is selected and the task completes.
    pub async fn cast_vote(
        &self,
        document_id: DocumentId,
        voter: &ActorId,
        document_quality: u8,
        code_readability: u8,
        comments: Option<String>,
    ) -> Result<VoteOutcome, WorkflowError> {
        let now = Utc::now();
        let document = self
            .store
            .load_document(document_id)
            .await?
            .ok_or(WorkflowError::NotFound { entity: "document" })?;
        let mut task = self.require_task(document.task).await?;
        self.materialize_overtime(&mut task, now).await?;

        if task.status != TaskStatus::PendingVote {
            return Err(WorkflowError::InvalidState {
                status: task.status,
                action: "cast_vote",
            });
        }

        let existing = self.store.votes_for_document(document_id).await?;
        let (quality, readability) = assessment::validate_vote(
            &document,
            &existing,
            voter,
            document_quality,
            code_readability,
        )?;

        let vote = Vote {
            id: VoteId::new(),
            document: document_id,
            voter: voter.clone(),
            document_quality: quality,
            code_readability: readability,
            comments,
            voted_at: now,
        };
        // The store's uniqueness constraint arbitrates concurrent votes;
        // the losing side becomes a duplicate-vote failure.
        match self.store.save_vote(&vote).await {
            Ok(()) => {}
            Err(StorageError::Conflict { .. }) => return Err(WorkflowError::DuplicateVote),
            Err(err) => return Err(err.into()),
        }

        let mut votes = existing;
        votes.push(vote.clone());
        let mut doc_assessment = assessment::project_assessment(task.id, document_id, &votes);

        let documents = self.store.documents_for_task(task.id).await?;
        let mut votes_by_document: HashMap<DocumentId, Vec<Vote>> = HashMap::new();
        for doc in &documents {
            let doc_votes = if doc.id == document_id {
                votes.clone()
            } else {
                self.store.votes_for_document(doc.id).await?
            };
            votes_by_document.insert(doc.id, doc_votes);
        }

        let quorum_met = assessment::quorum_met(
            &self.quorum,
            &self.reviewer_pool,
            &documents,
            &votes_by_document,
        );
        let next = state_machine::evaluate(&task, &TaskEvent::VoteRecorded { quorum_met })?;

        if next == TaskStatus::Completed {
            let (winner, tally) = assessment::select_winner(&documents, &votes_by_document)
                .ok_or(WorkflowError::NotFound { entity: "document" })?;

            for doc in &documents {
                let mut final_assessment = assessment::project_assessment(
                    task.id,
                    doc.id,
                    votes_by_document.get(&doc.id).map_or(&[], Vec::as_slice),
                );
                final_assessment.status = AssessmentStatus::Completed;
                final_assessment.completed_at = Some(now);
                if doc.id == document_id {
                    doc_assessment = final_assessment.clone();
                }
                self.store.save_assessment(&final_assessment).await?;
            }

            task.winning_document = Some(winner);
            info!(
                task_id = %task.id,
                winner = %winner,
                avg_document_quality = tally.avg_document_quality,
                avg_code_readability = tally.avg_code_readability,
                "task completed, winning document selected"
            );
        } else {
            self.store.save_assessment(&doc_assessment).await?;
        }

        task.status = next;
        task.touch();
        self.store.save_task(&task).await?;

        Ok(VoteOutcome {
            task,
            vote,
            assessment: doc_assessment,
        })
    }

    /// Pull-style deadline check: recompute overtime against `now`,
    /// persist any change, and return the refreshed task.
    pub async fn refresh_overtime_status(
        &self,
        task_id: TaskId,
        now: DateTime<Utc>,
    ) -> Result<Task, WorkflowError> {
        let mut task = self.require_task(task_id).await?;
        self.materialize_overtime(&mut task, now).await?;
        Ok(task)
    }

    /// Operator escape hatch: move an overtime task back into the flow,
    /// optionally extending its deadline.
    pub async fn override_overtime(
        &self,
        task_id: TaskId,
        target: OverrideTarget,
        new_deadline: Option<DateTime<Utc>>,
    ) -> Result<Task, WorkflowError> {
        let mut task = self.require_task(task_id).await?;
        self.materialize_overtime(&mut task, Utc::now()).await?;

        let next = state_machine::evaluate(&task, &TaskEvent::OperatorOverride { target })?;
        if let Some(deadline) = new_deadline {
            task.deadline = Some(deadline);
        }
        task.status = next;
        task.touch();
        self.store.save_task(&task).await?;

        warn!(
            task_id = %task.id,
            status = %task.status,
            deadline = ?task.deadline,
            "operator override applied"
        );
        Ok(task)
    }

    /// Full read model for one task, with overtime materialized first so
    /// the overdue flag is never stale by more than one request.
    pub async fn view_task(
        &self,
        task_id: TaskId,
        now: DateTime<Utc>,
    ) -> Result<TaskView, WorkflowError> {
        let mut task = self.require_task(task_id).await?;
        self.materialize_overtime(&mut task, now).await?;

        let documents = self.store.documents_for_task(task.id).await?;
        let assessments = self.store.assessments_for_task(task.id).await?;

        let mut views = Vec::with_capacity(documents.len());
        for document in documents {
            let votes = self.store.votes_for_document(document.id).await?;
            let assessment = assessments
                .iter()
                .find(|a| a.document == document.id)
                .cloned()
                .unwrap_or_else(|| assessment::project_assessment(task.id, document.id, &votes));
            views.push(DocumentView {
                document,
                votes,
                assessment,
            });
        }

        let is_overdue = state_machine::is_overdue(task.deadline, now);
        Ok(TaskView {
            task,
            documents: views,
            is_overdue,
        })
    }

    /// Task listing with overtime materialized per task.
    pub async fn list_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>, WorkflowError> {
        let mut tasks = self.store.list_tasks().await?;
        for task in &mut tasks {
            self.materialize_overtime(task, now).await?;
        }
        Ok(tasks)
    }
}
