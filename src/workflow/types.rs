use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::WorkflowError;

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

entity_id!(TaskId);
entity_id!(DocumentId);
entity_id!(VoteId);

/// Identity of an acting user (annotator, writer, reviewer, operator).
/// Supplied by the excluded auth layer and trusted as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl PartialEq<str> for ActorId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Task lifecycle states. `NotStarted` is initial, `Completed` is the only
/// non-escalating terminal state, `Overtime` is a side state cleared only
/// by operator override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    PendingVote,
    Completed,
    Overtime,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::PendingVote => "pending_vote",
            TaskStatus::Completed => "completed",
            TaskStatus::Overtime => "overtime",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(TaskStatus::NotStarted),
            "in_progress" => Ok(TaskStatus::InProgress),
            "pending_vote" => Ok(TaskStatus::PendingVote),
            "completed" => Ok(TaskStatus::Completed),
            "overtime" => Ok(TaskStatus::Overtime),
            other => Err(format!("unknown task status '{other}'")),
        }
    }
}

/// A unit of documentation work binding one function to one documentation
/// effort. Never physically deleted, only terminal-stated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub function_ref: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub annotator: ActorId,
    pub writer1: ActorId,
    pub writer2: Option<ActorId>,
    pub deadline: Option<DateTime<Utc>>,
    pub winning_document: Option<DocumentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_writer(&self, actor: &ActorId) -> bool {
        self.writer1 == *actor || self.writer2.as_ref() == Some(actor)
    }

    /// Writers whose submissions are required before voting can open.
    pub fn required_writers(&self) -> Vec<&ActorId> {
        let mut writers = vec![&self.writer1];
        if let Some(writer2) = &self.writer2 {
            writers.push(writer2);
        }
        writers
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Creation payload for a new task, supplied by the assigning actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub function_ref: String,
    pub title: String,
    pub description: String,
    pub annotator: ActorId,
    pub writer1: ActorId,
    pub writer2: Option<ActorId>,
    pub deadline: Option<DateTime<Utc>>,
}

impl TaskSpec {
    pub fn into_task(self, now: DateTime<Utc>) -> Task {
        Task {
            id: TaskId::new(),
            function_ref: self.function_ref,
            title: self.title,
            description: self.description,
            status: TaskStatus::NotStarted,
            annotator: self.annotator,
            writer1: self.writer1,
            writer2: self.writer2,
            deadline: self.deadline,
            winning_document: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Guide,
    #[default]
    Reference,
    Example,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Guide => "guide",
            DocType::Reference => "reference",
            DocType::Example => "example",
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guide" => Ok(DocType::Guide),
            "reference" => Ok(DocType::Reference),
            "example" => Ok(DocType::Example),
            other => Err(format!("unknown doc type '{other}'")),
        }
    }
}

/// A writer's submitted draft competing for selection. Immutable once
/// created; a revision attempt is rejected, not merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub task: TaskId,
    pub author: ActorId,
    pub title: String,
    pub content: String,
    pub doc_type: DocType,
    pub submitted_at: DateTime<Utc>,
}

/// Submission payload for a new document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPayload {
    pub title: String,
    pub content: String,
    pub doc_type: DocType,
}

/// A reviewer score on the closed interval [1, 10].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(value: u8) -> Result<Self, WorkflowError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(WorkflowError::InvalidScore { value })
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Score {
    type Error = WorkflowError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Score::new(value)
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> u8 {
        score.0
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One reviewer's assessment of one document. Unique on (document, voter);
/// never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub document: DocumentId,
    pub voter: ActorId,
    pub document_quality: Score,
    pub code_readability: Score,
    pub comments: Option<String>,
    pub voted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Pending,
    InProgress,
    Completed,
}

impl AssessmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentStatus::Pending => "pending",
            AssessmentStatus::InProgress => "in_progress",
            AssessmentStatus::Completed => "completed",
        }
    }
}

impl std::str::FromStr for AssessmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AssessmentStatus::Pending),
            "in_progress" => Ok(AssessmentStatus::InProgress),
            "completed" => Ok(AssessmentStatus::Completed),
            other => Err(format!("unknown assessment status '{other}'")),
        }
    }
}

/// Derived aggregate for one (task, document) pair. Holds no authoritative
/// data that is not reconstructible from the vote set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub task: TaskId,
    pub document: DocumentId,
    pub avg_document_quality: f64,
    pub avg_code_readability: f64,
    pub total_votes: u32,
    pub status: AssessmentStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_bounds() {
        assert!(Score::new(1).is_ok());
        assert!(Score::new(10).is_ok());
        assert!(matches!(
            Score::new(0),
            Err(WorkflowError::InvalidScore { value: 0 })
        ));
        assert!(matches!(
            Score::new(11),
            Err(WorkflowError::InvalidScore { value: 11 })
        ));
    }

    #[test]
    fn test_task_status_round_trip() {
        for status in [
            TaskStatus::NotStarted,
            TaskStatus::InProgress,
            TaskStatus::PendingVote,
            TaskStatus::Completed,
            TaskStatus::Overtime,
        ] {
            let parsed: TaskStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_required_writers_with_and_without_second_writer() {
        let spec = TaskSpec {
            function_ref: "crate::parse".to_string(),
            title: "Document parse()".to_string(),
            description: String::new(),
            annotator: ActorId::new("annotator"),
            writer1: ActorId::new("alice"),
            writer2: None,
            deadline: None,
        };
        let solo = spec.clone().into_task(Utc::now());
        assert_eq!(solo.required_writers().len(), 1);

        let mut spec = spec;
        spec.writer2 = Some(ActorId::new("bob"));
        let pair = spec.into_task(Utc::now());
        assert_eq!(pair.required_writers().len(), 2);
        assert!(pair.is_writer(&ActorId::new("bob")));
        assert!(!pair.is_writer(&ActorId::new("carol")));
    }
}
