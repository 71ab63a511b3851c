use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::types::{ActorId, Task, TaskStatus};
use super::WorkflowError;

/// Events that drive a task's lifecycle. Guards that need collaborator
/// data (submission counts, quorum) are resolved by the orchestrator and
/// carried here as plain facts, keeping the transition evaluation pure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    AcceptAssignment { writer: ActorId },
    DocumentSubmitted { all_writers_submitted: bool },
    VoteRecorded { quorum_met: bool },
    DeadlineExpired,
    OperatorOverride { target: OverrideTarget },
}

impl TaskEvent {
    pub fn label(&self) -> &'static str {
        match self {
            TaskEvent::AcceptAssignment { .. } => "accept_assignment",
            TaskEvent::DocumentSubmitted { .. } => "submit_document",
            TaskEvent::VoteRecorded { .. } => "cast_vote",
            TaskEvent::DeadlineExpired => "deadline_check",
            TaskEvent::OperatorOverride { .. } => "operator_override",
        }
    }
}

/// Where an operator override sends an overtime task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideTarget {
    Writing,
    Voting,
}

impl OverrideTarget {
    pub fn status(self) -> TaskStatus {
        match self {
            OverrideTarget::Writing => TaskStatus::InProgress,
            OverrideTarget::Voting => TaskStatus::PendingVote,
        }
    }
}

/// Evaluate one lifecycle event against the task's persisted status.
///
/// Pure except for structured transition logging; the caller persists the
/// returned status. A re-accept by an already-active writer yields the
/// current status unchanged, which is what makes `accept_assignment`
/// idempotent-once at the orchestrator.
pub fn evaluate(task: &Task, event: &TaskEvent) -> Result<TaskStatus, WorkflowError> {
    let next = match (task.status, event) {
        (TaskStatus::NotStarted, TaskEvent::AcceptAssignment { writer })
        | (TaskStatus::InProgress, TaskEvent::AcceptAssignment { writer }) => {
            if !task.is_writer(writer) {
                return Err(WorkflowError::NotAssigned {
                    actor: writer.clone(),
                });
            }
            TaskStatus::InProgress
        }

        (
            TaskStatus::InProgress,
            TaskEvent::DocumentSubmitted {
                all_writers_submitted,
            },
        ) => {
            if *all_writers_submitted {
                TaskStatus::PendingVote
            } else {
                TaskStatus::InProgress
            }
        }

        (TaskStatus::PendingVote, TaskEvent::VoteRecorded { quorum_met }) => {
            if *quorum_met {
                TaskStatus::Completed
            } else {
                TaskStatus::PendingVote
            }
        }

        (status, TaskEvent::DeadlineExpired) if !status.is_terminal() => TaskStatus::Overtime,

        (TaskStatus::Overtime, TaskEvent::OperatorOverride { target }) => target.status(),

        (status, event) => {
            warn!(
                task_id = %task.id,
                status = %status,
                event = event.label(),
                "rejected task transition"
            );
            return Err(WorkflowError::InvalidState {
                status,
                action: event.label(),
            });
        }
    };

    if next != task.status {
        info!(
            task_id = %task.id,
            from = %task.status,
            to = %next,
            event = event.label(),
            "task transition"
        );
    }

    Ok(next)
}

/// Whether a deadline has passed. `None` deadlines never expire.
pub fn is_overdue(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    deadline.is_some_and(|d| now > d)
}

/// Lazily materialized overtime: a pure function of (status, deadline, now).
///
/// Monotone in `now` - once a task reads `Overtime` it stays there until an
/// operator override, even if the deadline is later extended. Completed
/// tasks never escalate.
pub fn refresh_overtime(
    status: TaskStatus,
    deadline: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> TaskStatus {
    match status {
        TaskStatus::Completed | TaskStatus::Overtime => status,
        _ if is_overdue(deadline, now) => TaskStatus::Overtime,
        _ => status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::TaskSpec;
    use chrono::Duration;

    fn task_with_status(status: TaskStatus) -> Task {
        let mut task = TaskSpec {
            function_ref: "crate::tokenize".to_string(),
            title: "Document tokenize()".to_string(),
            description: "Needs a worked example".to_string(),
            annotator: ActorId::new("annotator"),
            writer1: ActorId::new("alice"),
            writer2: Some(ActorId::new("bob")),
            deadline: None,
        }
        .into_task(Utc::now());
        task.status = status;
        task
    }

    #[test]
    fn test_accept_moves_not_started_to_in_progress() {
        let task = task_with_status(TaskStatus::NotStarted);
        let event = TaskEvent::AcceptAssignment {
            writer: ActorId::new("alice"),
        };
        assert_eq!(evaluate(&task, &event).unwrap(), TaskStatus::InProgress);
    }

    #[test]
    fn test_accept_by_unassigned_actor_fails() {
        let task = task_with_status(TaskStatus::NotStarted);
        let event = TaskEvent::AcceptAssignment {
            writer: ActorId::new("mallory"),
        };
        assert!(matches!(
            evaluate(&task, &event),
            Err(WorkflowError::NotAssigned { .. })
        ));
    }

    #[test]
    fn test_second_accept_is_a_no_op() {
        let task = task_with_status(TaskStatus::InProgress);
        let event = TaskEvent::AcceptAssignment {
            writer: ActorId::new("bob"),
        };
        assert_eq!(evaluate(&task, &event).unwrap(), TaskStatus::InProgress);
    }

    #[test]
    fn test_submission_opens_voting_only_when_all_writers_submitted() {
        let task = task_with_status(TaskStatus::InProgress);
        let partial = TaskEvent::DocumentSubmitted {
            all_writers_submitted: false,
        };
        assert_eq!(evaluate(&task, &partial).unwrap(), TaskStatus::InProgress);

        let all = TaskEvent::DocumentSubmitted {
            all_writers_submitted: true,
        };
        assert_eq!(evaluate(&task, &all).unwrap(), TaskStatus::PendingVote);
    }

    #[test]
    fn test_submission_requires_writing_phase() {
        for status in [
            TaskStatus::NotStarted,
            TaskStatus::PendingVote,
            TaskStatus::Completed,
            TaskStatus::Overtime,
        ] {
            let task = task_with_status(status);
            let event = TaskEvent::DocumentSubmitted {
                all_writers_submitted: true,
            };
            assert!(matches!(
                evaluate(&task, &event),
                Err(WorkflowError::InvalidState { .. })
            ));
        }
    }

    #[test]
    fn test_quorum_completes_pending_vote() {
        let task = task_with_status(TaskStatus::PendingVote);
        let event = TaskEvent::VoteRecorded { quorum_met: true };
        assert_eq!(evaluate(&task, &event).unwrap(), TaskStatus::Completed);

        let event = TaskEvent::VoteRecorded { quorum_met: false };
        assert_eq!(evaluate(&task, &event).unwrap(), TaskStatus::PendingVote);
    }

    #[test]
    fn test_deadline_escalates_any_non_terminal_state() {
        for status in [
            TaskStatus::NotStarted,
            TaskStatus::InProgress,
            TaskStatus::PendingVote,
            TaskStatus::Overtime,
        ] {
            let task = task_with_status(status);
            assert_eq!(
                evaluate(&task, &TaskEvent::DeadlineExpired).unwrap(),
                TaskStatus::Overtime
            );
        }

        let completed = task_with_status(TaskStatus::Completed);
        assert!(matches!(
            evaluate(&completed, &TaskEvent::DeadlineExpired),
            Err(WorkflowError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_override_leaves_overtime_only() {
        let task = task_with_status(TaskStatus::Overtime);
        let event = TaskEvent::OperatorOverride {
            target: OverrideTarget::Voting,
        };
        assert_eq!(evaluate(&task, &event).unwrap(), TaskStatus::PendingVote);

        let event = TaskEvent::OperatorOverride {
            target: OverrideTarget::Writing,
        };
        assert_eq!(evaluate(&task, &event).unwrap(), TaskStatus::InProgress);

        let active = task_with_status(TaskStatus::InProgress);
        assert!(matches!(
            evaluate(&active, &event),
            Err(WorkflowError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_refresh_overtime_is_pure_and_monotone() {
        let now = Utc::now();
        let deadline = Some(now - Duration::days(1));

        // Same inputs, same output.
        let first = refresh_overtime(TaskStatus::InProgress, deadline, now);
        let second = refresh_overtime(TaskStatus::InProgress, deadline, now);
        assert_eq!(first, TaskStatus::Overtime);
        assert_eq!(first, second);

        // Advancing the clock never clears overtime, even with an
        // extended deadline - only an override does that.
        let later = now + Duration::days(30);
        let extended = Some(later + Duration::days(7));
        assert_eq!(
            refresh_overtime(TaskStatus::Overtime, extended, later),
            TaskStatus::Overtime
        );
    }

    #[test]
    fn test_refresh_overtime_spares_completed_and_undeadlined_tasks() {
        let now = Utc::now();
        let past = Some(now - Duration::hours(1));

        assert_eq!(
            refresh_overtime(TaskStatus::Completed, past, now),
            TaskStatus::Completed
        );
        assert_eq!(
            refresh_overtime(TaskStatus::InProgress, None, now),
            TaskStatus::InProgress
        );
        assert_eq!(
            refresh_overtime(TaskStatus::PendingVote, Some(now + Duration::hours(1)), now),
            TaskStatus::PendingVote
        );
    }
}
