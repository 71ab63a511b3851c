// Vote Aggregator - reduces per-document reviewer votes into quality
// statistics and drives the completion decision.
//
// Assessment is a derived projection: everything here is recomputable from
// the vote set, and nothing is cached beyond what the orchestrator writes
// back immediately.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::workflow::types::{
    ActorId, Assessment, AssessmentStatus, Document, DocumentId, Score, TaskId, Vote,
};
use crate::workflow::WorkflowError;

/// Aggregated score statistics for one document's vote set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoteTally {
    pub avg_document_quality: f64,
    pub avg_code_readability: f64,
    pub total_votes: u32,
}

impl VoteTally {
    pub fn empty() -> Self {
        Self {
            avg_document_quality: 0.0,
            avg_code_readability: 0.0,
            total_votes: 0,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean scores rounded to two decimal places; zeros when no votes exist.
/// Order-independent: permuting the vote set yields identical averages.
pub fn aggregate(votes: &[Vote]) -> VoteTally {
    if votes.is_empty() {
        return VoteTally::empty();
    }

    let count = votes.len() as f64;
    let quality_sum: u32 = votes.iter().map(|v| v.document_quality.value() as u32).sum();
    let readability_sum: u32 = votes.iter().map(|v| v.code_readability.value() as u32).sum();

    VoteTally {
        avg_document_quality: round2(quality_sum as f64 / count),
        avg_code_readability: round2(readability_sum as f64 / count),
        total_votes: votes.len() as u32,
    }
}

/// Rebuild the assessment projection for one (task, document) pair from
/// its current vote set. Completion is stamped separately by the
/// orchestrator once the quorum policy is satisfied.
pub fn project_assessment(task: TaskId, document: DocumentId, votes: &[Vote]) -> Assessment {
    let tally = aggregate(votes);
    Assessment {
        task,
        document,
        avg_document_quality: tally.avg_document_quality,
        avg_code_readability: tally.avg_code_readability,
        total_votes: tally.total_votes,
        status: if tally.total_votes == 0 {
            AssessmentStatus::Pending
        } else {
            AssessmentStatus::InProgress
        },
        completed_at: None,
    }
}

/// Validate a prospective vote against the document and its existing
/// votes. Returns the parsed scores on success.
pub fn validate_vote(
    document: &Document,
    existing_votes: &[Vote],
    voter: &ActorId,
    document_quality: u8,
    code_readability: u8,
) -> Result<(Score, Score), WorkflowError> {
    let quality = Score::new(document_quality)?;
    let readability = Score::new(code_readability)?;

    if document.author == *voter {
        return Err(WorkflowError::SelfVote);
    }
    if existing_votes.iter().any(|v| v.voter == *voter) {
        return Err(WorkflowError::DuplicateVote);
    }

    Ok((quality, readability))
}

/// Completion quorum policy. "Every eligible reviewer" is the kanban
/// default; deployments can relax it to a minimum vote count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumPolicy {
    /// Every reviewer in the pool, minus the document authors, has voted
    /// on every active document.
    AllEligible,
    /// Every active document has at least this many votes.
    MinimumVotes(u32),
}

/// Whether the vote sets satisfy the completion policy for a task's
/// active documents. Never satisfied while there are no documents or,
/// under `AllEligible`, no eligible reviewers.
pub fn quorum_met(
    policy: &QuorumPolicy,
    reviewer_pool: &[ActorId],
    documents: &[Document],
    votes_by_document: &HashMap<DocumentId, Vec<Vote>>,
) -> bool {
    if documents.is_empty() {
        return false;
    }

    let met = match policy {
        QuorumPolicy::MinimumVotes(minimum) => documents.iter().all(|doc| {
            votes_by_document
                .get(&doc.id)
                .map_or(0, |votes| votes.len() as u32)
                >= *minimum
        }),
        QuorumPolicy::AllEligible => {
            let authors: HashSet<&ActorId> = documents.iter().map(|d| &d.author).collect();
            let eligible: Vec<&ActorId> = reviewer_pool
                .iter()
                .filter(|reviewer| !authors.contains(reviewer))
                .collect();
            if eligible.is_empty() {
                return false;
            }

            documents.iter().all(|doc| {
                let voters: HashSet<&ActorId> = votes_by_document
                    .get(&doc.id)
                    .map(|votes| votes.iter().map(|v| &v.voter).collect())
                    .unwrap_or_default();
                eligible.iter().all(|reviewer| voters.contains(*reviewer))
            })
        }
    };

    debug!(policy = ?policy, documents = documents.len(), met, "quorum evaluation");
    met
}

/// Centi-point key so winner comparison stays deterministic despite the
/// float averages.
fn centi(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Select the winning document: higher avg quality, then higher avg
/// readability, then earlier submission time.
pub fn select_winner(
    documents: &[Document],
    votes_by_document: &HashMap<DocumentId, Vec<Vote>>,
) -> Option<(DocumentId, VoteTally)> {
    documents
        .iter()
        .map(|doc| {
            let tally = votes_by_document
                .get(&doc.id)
                .map(|votes| aggregate(votes))
                .unwrap_or_else(VoteTally::empty);
            (doc, tally)
        })
        .max_by_key(|(doc, tally)| {
            (
                centi(tally.avg_document_quality),
                centi(tally.avg_code_readability),
                Reverse(doc.submitted_at),
            )
        })
        .map(|(doc, tally)| (doc.id, tally))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{DocType, VoteId};
    use chrono::{DateTime, Duration, Utc};

    fn vote(document: DocumentId, voter: &str, quality: u8, readability: u8) -> Vote {
        Vote {
            id: VoteId::new(),
            document,
            voter: ActorId::new(voter),
            document_quality: Score::new(quality).unwrap(),
            code_readability: Score::new(readability).unwrap(),
            comments: None,
            voted_at: Utc::now(),
        }
    }

    fn document(task: TaskId, author: &str, submitted_at: DateTime<Utc>) -> Document {
        Document {
            id: DocumentId::new(),
            task,
            author: ActorId::new(author),
            title: format!("{author}'s draft"),
            content: "fn docs".to_string(),
            doc_type: DocType::Reference,
            submitted_at,
        }
    }

    #[test]
    fn test_aggregate_empty_vote_set_yields_zeros() {
        let tally = aggregate(&[]);
        assert_eq!(tally, VoteTally::empty());
    }

    #[test]
    fn test_aggregate_rounds_to_two_decimals() {
        let doc = DocumentId::new();
        let votes = vec![
            vote(doc, "r1", 8, 7),
            vote(doc, "r2", 9, 7),
            vote(doc, "r3", 8, 8),
        ];
        let tally = aggregate(&votes);
        assert_eq!(tally.avg_document_quality, 8.33);
        assert_eq!(tally.avg_code_readability, 7.33);
        assert_eq!(tally.total_votes, 3);
    }

    #[test]
    fn test_aggregate_is_order_independent() {
        let doc = DocumentId::new();
        let mut votes = vec![
            vote(doc, "r1", 3, 10),
            vote(doc, "r2", 7, 2),
            vote(doc, "r3", 9, 6),
            vote(doc, "r4", 1, 8),
        ];
        let baseline = aggregate(&votes);

        votes.reverse();
        assert_eq!(aggregate(&votes), baseline);

        votes.swap(0, 2);
        assert_eq!(aggregate(&votes), baseline);

        // Non-empty averages always land inside the score domain.
        assert!(baseline.avg_document_quality >= 1.0);
        assert!(baseline.avg_document_quality <= 10.0);
    }

    #[test]
    fn test_validate_vote_rejects_self_vote_and_duplicates() {
        let task = TaskId::new();
        let doc = document(task, "alice", Utc::now());
        let existing = vec![vote(doc.id, "r1", 5, 5)];

        assert!(matches!(
            validate_vote(&doc, &existing, &ActorId::new("alice"), 5, 5),
            Err(WorkflowError::SelfVote)
        ));
        assert!(matches!(
            validate_vote(&doc, &existing, &ActorId::new("r1"), 5, 5),
            Err(WorkflowError::DuplicateVote)
        ));
        assert!(matches!(
            validate_vote(&doc, &existing, &ActorId::new("r2"), 0, 5),
            Err(WorkflowError::InvalidScore { value: 0 })
        ));
        assert!(validate_vote(&doc, &existing, &ActorId::new("r2"), 5, 5).is_ok());
    }

    #[test]
    fn test_all_eligible_quorum_excludes_authors() {
        let task = TaskId::new();
        let d1 = document(task, "alice", Utc::now());
        let d2 = document(task, "bob", Utc::now());
        let pool: Vec<ActorId> = ["alice", "bob", "r1", "r2"]
            .iter()
            .map(|s| ActorId::new(*s))
            .collect();

        let mut votes = HashMap::new();
        votes.insert(d1.id, vec![vote(d1.id, "r1", 8, 8), vote(d1.id, "r2", 7, 7)]);
        votes.insert(d2.id, vec![vote(d2.id, "r1", 6, 6)]);

        let docs = vec![d1.clone(), d2.clone()];
        // r2 has not voted on d2 yet.
        assert!(!quorum_met(&QuorumPolicy::AllEligible, &pool, &docs, &votes));

        votes.get_mut(&d2.id).unwrap().push(vote(d2.id, "r2", 6, 6));
        assert!(quorum_met(&QuorumPolicy::AllEligible, &pool, &docs, &votes));
    }

    #[test]
    fn test_all_eligible_quorum_needs_a_reviewer() {
        let task = TaskId::new();
        let d1 = document(task, "alice", Utc::now());
        let pool = vec![ActorId::new("alice")];
        let votes = HashMap::new();

        assert!(!quorum_met(
            &QuorumPolicy::AllEligible,
            &pool,
            &[d1],
            &votes
        ));
    }

    #[test]
    fn test_minimum_votes_quorum() {
        let task = TaskId::new();
        let d1 = document(task, "alice", Utc::now());
        let pool: Vec<ActorId> = vec![ActorId::new("r1")];

        let mut votes = HashMap::new();
        votes.insert(d1.id, vec![vote(d1.id, "r1", 8, 8)]);

        let docs = vec![d1];
        assert!(quorum_met(&QuorumPolicy::MinimumVotes(1), &pool, &docs, &votes));
        assert!(!quorum_met(&QuorumPolicy::MinimumVotes(2), &pool, &docs, &votes));
    }

    #[test]
    fn test_winner_by_quality_then_readability() {
        let task = TaskId::new();
        let now = Utc::now();
        let d1 = document(task, "alice", now);
        let d2 = document(task, "bob", now + Duration::minutes(5));

        let mut votes = HashMap::new();
        votes.insert(d1.id, vec![vote(d1.id, "r1", 9, 5)]);
        votes.insert(d2.id, vec![vote(d2.id, "r1", 9, 6)]);

        let (winner, _) = select_winner(&[d1.clone(), d2.clone()], &votes).unwrap();
        assert_eq!(winner, d2.id);
    }

    #[test]
    fn test_winner_tie_breaks_on_earlier_submission() {
        let task = TaskId::new();
        let now = Utc::now();
        let earlier = document(task, "alice", now);
        let later = document(task, "bob", now + Duration::minutes(1));

        let mut votes = HashMap::new();
        votes.insert(earlier.id, vec![vote(earlier.id, "r1", 8, 8)]);
        votes.insert(later.id, vec![vote(later.id, "r2", 8, 8)]);

        // Identical averages on both axes: the earlier submission wins,
        // regardless of iteration order.
        let (winner, _) = select_winner(&[later.clone(), earlier.clone()], &votes).unwrap();
        assert_eq!(winner, earlier.id);
        let (winner, _) = select_winner(&[earlier.clone(), later.clone()], &votes).unwrap();
        assert_eq!(winner, earlier.id);
    }
}
