//! Vote aggregation and assessment tests
//!
//! Covers the derived-assessment behavior visible through the
//! orchestrator: average refresh on each vote, the configurable quorum
//! policy, and deterministic winner selection on exact ties.

use chrono::{Duration, Utc};

use peerdoc::workflow::types::{ActorId, DocType, DocumentPayload, TaskSpec, TaskStatus};
use peerdoc::{MemoryStore, QuorumPolicy, WorkflowOrchestrator, WorkflowStore};

fn spec(writer2: Option<&str>) -> TaskSpec {
    TaskSpec {
        function_ref: "crate::cache::evict".to_string(),
        title: "Document evict()".to_string(),
        description: String::new(),
        annotator: ActorId::new("annotator"),
        writer1: ActorId::new("alice"),
        writer2: writer2.map(ActorId::new),
        deadline: Some(Utc::now() + Duration::days(7)),
    }
}

fn draft(title: &str) -> DocumentPayload {
    DocumentPayload {
        title: title.to_string(),
        content: "Eviction strategy notes.".to_string(),
        doc_type: DocType::Guide,
    }
}

#[tokio::test]
async fn test_assessment_refreshes_with_each_vote() {
    let pool: Vec<ActorId> = ["r1", "r2", "r3"].iter().map(|r| ActorId::new(*r)).collect();
    let orchestrator =
        WorkflowOrchestrator::new(MemoryStore::new(), pool, QuorumPolicy::AllEligible);
    let alice = ActorId::new("alice");

    let task = orchestrator.create_task(spec(None)).await.unwrap();
    orchestrator.accept_assignment(task.id, &alice).await.unwrap();
    let (_, document) = orchestrator
        .submit_document(task.id, &alice, draft("Draft"))
        .await
        .unwrap();

    // Submission seeds a pending assessment with no votes.
    let seeded = orchestrator
        .store()
        .assessments_for_task(task.id)
        .await
        .unwrap();
    assert_eq!(seeded.len(), 1);
    assert_eq!(seeded[0].total_votes, 0);
    assert_eq!(seeded[0].avg_document_quality, 0.0);

    let first = orchestrator
        .cast_vote(document.id, &ActorId::new("r1"), 6, 9, Some("solid".into()))
        .await
        .unwrap();
    assert_eq!(first.assessment.total_votes, 1);
    assert_eq!(first.assessment.avg_document_quality, 6.0);
    assert_eq!(first.assessment.avg_code_readability, 9.0);

    let second = orchestrator
        .cast_vote(document.id, &ActorId::new("r2"), 7, 8, None)
        .await
        .unwrap();
    assert_eq!(second.assessment.total_votes, 2);
    assert_eq!(second.assessment.avg_document_quality, 6.5);
    assert_eq!(second.assessment.avg_code_readability, 8.5);
}

#[tokio::test]
async fn test_minimum_votes_policy_completes_early() {
    // A single vote per document resolves the task under minimum_votes=1,
    // even though the pool has three reviewers.
    let pool: Vec<ActorId> = ["r1", "r2", "r3"].iter().map(|r| ActorId::new(*r)).collect();
    let orchestrator =
        WorkflowOrchestrator::new(MemoryStore::new(), pool, QuorumPolicy::MinimumVotes(1));
    let alice = ActorId::new("alice");

    let task = orchestrator.create_task(spec(None)).await.unwrap();
    orchestrator.accept_assignment(task.id, &alice).await.unwrap();
    let (_, document) = orchestrator
        .submit_document(task.id, &alice, draft("Draft"))
        .await
        .unwrap();

    let outcome = orchestrator
        .cast_vote(document.id, &ActorId::new("r1"), 8, 8, None)
        .await
        .unwrap();
    assert_eq!(outcome.task.status, TaskStatus::Completed);
    assert_eq!(outcome.task.winning_document, Some(document.id));
}

#[tokio::test]
async fn test_exact_tie_resolves_to_earlier_submission() {
    let pool: Vec<ActorId> = ["r1"].iter().map(|r| ActorId::new(*r)).collect();
    let orchestrator =
        WorkflowOrchestrator::new(MemoryStore::new(), pool, QuorumPolicy::MinimumVotes(1));
    let alice = ActorId::new("alice");
    let bob = ActorId::new("bob");
    let r1 = ActorId::new("r1");

    let task = orchestrator.create_task(spec(Some("bob"))).await.unwrap();
    orchestrator.accept_assignment(task.id, &alice).await.unwrap();
    let (_, first_doc) = orchestrator
        .submit_document(task.id, &alice, draft("First in"))
        .await
        .unwrap();
    let (_, second_doc) = orchestrator
        .submit_document(task.id, &bob, draft("Second in"))
        .await
        .unwrap();
    assert!(first_doc.submitted_at <= second_doc.submitted_at);

    // Identical scores on both axes for both documents.
    orchestrator
        .cast_vote(first_doc.id, &r1, 8, 8, None)
        .await
        .unwrap();
    let outcome = orchestrator
        .cast_vote(second_doc.id, &r1, 8, 8, None)
        .await
        .unwrap();

    assert_eq!(outcome.task.status, TaskStatus::Completed);
    assert_eq!(outcome.task.winning_document, Some(first_doc.id));
}

#[tokio::test]
async fn test_completion_finalizes_every_assessment() {
    let pool: Vec<ActorId> = ["r1", "r2"].iter().map(|r| ActorId::new(*r)).collect();
    let orchestrator =
        WorkflowOrchestrator::new(MemoryStore::new(), pool.clone(), QuorumPolicy::AllEligible);
    let alice = ActorId::new("alice");
    let bob = ActorId::new("bob");

    let task = orchestrator.create_task(spec(Some("bob"))).await.unwrap();
    orchestrator.accept_assignment(task.id, &alice).await.unwrap();
    let (_, d1) = orchestrator
        .submit_document(task.id, &alice, draft("Alice's"))
        .await
        .unwrap();
    let (_, d2) = orchestrator
        .submit_document(task.id, &bob, draft("Bob's"))
        .await
        .unwrap();

    for reviewer in &pool {
        orchestrator.cast_vote(d1.id, reviewer, 9, 9, None).await.unwrap();
    }
    for reviewer in &pool {
        orchestrator.cast_vote(d2.id, reviewer, 5, 5, None).await.unwrap();
    }

    let view = orchestrator.view_task(task.id, Utc::now()).await.unwrap();
    assert_eq!(view.task.status, TaskStatus::Completed);
    assert_eq!(view.task.winning_document, Some(d1.id));
    assert_eq!(view.documents.len(), 2);
    for document_view in &view.documents {
        assert_eq!(
            document_view.assessment.status,
            peerdoc::AssessmentStatus::Completed
        );
        assert!(document_view.assessment.completed_at.is_some());
        assert_eq!(document_view.assessment.total_votes, 2);
    }
}
