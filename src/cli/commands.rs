use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tracing::Instrument;

use super::{Cli, Commands, OverrideTargetArg};
use crate::config::{PeerdocConfig, StorageBackend};
use crate::orchestrator::WorkflowOrchestrator;
use crate::storage::{JsonFileStore, WorkflowStore};
use crate::telemetry::create_workflow_span;
use crate::workflow::state_machine::OverrideTarget;
use crate::workflow::types::{ActorId, DocType, DocumentId, DocumentPayload, TaskId, TaskSpec};

impl From<OverrideTargetArg> for OverrideTarget {
    fn from(arg: OverrideTargetArg) -> Self {
        match arg {
            OverrideTargetArg::Writing => OverrideTarget::Writing,
            OverrideTargetArg::Voting => OverrideTarget::Voting,
        }
    }
}

/// Span attributes for one CLI invocation: operation name plus the task
/// (or document) id and acting actor when the command carries them.
fn span_context(command: &Commands) -> (&'static str, Option<String>, Option<String>) {
    match command {
        Commands::Init { .. } => ("init", None, None),
        Commands::Create { writer1, .. } => ("create_task", None, Some(writer1.clone())),
        Commands::Accept { task, actor } => {
            ("accept_assignment", Some(task.to_string()), Some(actor.clone()))
        }
        Commands::Submit { task, actor, .. } => {
            ("submit_document", Some(task.to_string()), Some(actor.clone()))
        }
        Commands::Vote { document, voter, .. } => {
            ("cast_vote", Some(document.to_string()), Some(voter.clone()))
        }
        Commands::View { task } => ("view_task", Some(task.to_string()), None),
        Commands::List => ("list_tasks", None, None),
        Commands::Override { task, .. } => ("override_overtime", Some(task.to_string()), None),
    }
}

/// Dispatch a parsed CLI invocation against the configured store.
pub async fn run(cli: Cli, config: PeerdocConfig) -> Result<()> {
    if let Commands::Init { force } = &cli.command {
        return init_config(*force);
    }

    let (operation, task_id, actor) = span_context(&cli.command);
    let span = create_workflow_span(operation, task_id.as_deref(), actor.as_deref());

    match config.storage.backend {
        StorageBackend::Json => {
            let store = JsonFileStore::open(&config.storage.path)
                .await
                .with_context(|| format!("opening workflow state at {}", config.storage.path))?;
            let orchestrator =
                WorkflowOrchestrator::new(store, config.reviewer_pool(), config.quorum_policy());
            dispatch(cli.command, &orchestrator).instrument(span).await
        }
        #[cfg(feature = "database")]
        StorageBackend::Sqlite => {
            let store = crate::storage::SqliteStore::connect(&config.storage.database_url)
                .await
                .with_context(|| {
                    format!("connecting to workflow database {}", config.storage.database_url)
                })?;
            let orchestrator =
                WorkflowOrchestrator::new(store, config.reviewer_pool(), config.quorum_policy());
            dispatch(cli.command, &orchestrator).instrument(span).await
        }
        #[cfg(not(feature = "database"))]
        StorageBackend::Sqlite => {
            anyhow::bail!("storage backend 'sqlite' requires a build with the 'database' feature")
        }
    }
}

async fn dispatch<S: WorkflowStore>(
    command: Commands,
    orchestrator: &WorkflowOrchestrator<S>,
) -> Result<()> {
    match command {
        Commands::Init { .. } => unreachable!("handled before store setup"),
        Commands::Create {
            function,
            title,
            description,
            annotator,
            writer1,
            writer2,
            deadline_days,
        } => {
            let task = orchestrator
                .create_task(TaskSpec {
                    function_ref: function,
                    title,
                    description,
                    annotator: ActorId::new(annotator),
                    writer1: ActorId::new(writer1),
                    writer2: writer2.map(ActorId::new),
                    deadline: deadline_days.map(|days| Utc::now() + Duration::days(days)),
                })
                .await?;
            println!("✅ Created task {} ({})", task.id, task.status);
        }
        Commands::Accept { task, actor } => {
            let task = orchestrator
                .accept_assignment(TaskId(task), &ActorId::new(actor))
                .await?;
            println!("✅ Assignment accepted, task {} is {}", task.id, task.status);
        }
        Commands::Submit {
            task,
            actor,
            title,
            content,
            file,
            doc_type,
        } => {
            let content = match (content, file) {
                (Some(inline), _) => inline,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading draft from {}", path.display()))?,
                (None, None) => anyhow::bail!("provide draft content via --content or --file"),
            };
            let doc_type: DocType = doc_type.parse().map_err(anyhow::Error::msg)?;

            let (task, document) = orchestrator
                .submit_document(
                    TaskId(task),
                    &ActorId::new(actor),
                    DocumentPayload {
                        title,
                        content,
                        doc_type,
                    },
                )
                .await?;
            println!(
                "✅ Document {} submitted, task {} is {}",
                document.id, task.id, task.status
            );
        }
        Commands::Vote {
            document,
            voter,
            quality,
            readability,
            comment,
        } => {
            let outcome = orchestrator
                .cast_vote(
                    DocumentId(document),
                    &ActorId::new(voter),
                    quality,
                    readability,
                    comment,
                )
                .await?;
            println!(
                "✅ Vote recorded ({} votes, quality {:.2}, readability {:.2})",
                outcome.assessment.total_votes,
                outcome.assessment.avg_document_quality,
                outcome.assessment.avg_code_readability,
            );
            if let Some(winner) = outcome.task.winning_document {
                println!("🏁 Task {} completed, winning document {}", outcome.task.id, winner);
            }
        }
        Commands::View { task } => {
            let view = orchestrator.view_task(TaskId(task), Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Commands::List => {
            let tasks = orchestrator.list_tasks(Utc::now()).await?;
            if tasks.is_empty() {
                println!("No tasks yet - create one with 'peerdoc create'");
            }
            for task in tasks {
                let deadline = task
                    .deadline
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {:12}  deadline {}  {}",
                    task.id, task.status, deadline, task.title
                );
            }
        }
        Commands::Override {
            task,
            target,
            extend_days,
        } => {
            let task = orchestrator
                .override_overtime(
                    TaskId(task),
                    target.into(),
                    extend_days.map(|days| Utc::now() + Duration::days(days)),
                )
                .await?;
            println!("⚠️  Override applied, task {} is {}", task.id, task.status);
        }
    }

    Ok(())
}

fn init_config(force: bool) -> Result<()> {
    let path = std::path::Path::new("peerdoc.toml");
    if path.exists() && !force {
        anyhow::bail!("peerdoc.toml already exists (use --force to overwrite)");
    }

    let rendered = toml::to_string_pretty(&PeerdocConfig::default())?;
    std::fs::write(path, rendered)?;
    println!("✅ Wrote default configuration to peerdoc.toml");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_span_context_carries_task_and_actor() {
        let task = Uuid::new_v4();
        let (operation, task_id, actor) = span_context(&Commands::Accept {
            task,
            actor: "alice".to_string(),
        });
        assert_eq!(operation, "accept_assignment");
        assert_eq!(task_id, Some(task.to_string()));
        assert_eq!(actor, Some("alice".to_string()));

        let (operation, task_id, actor) = span_context(&Commands::List);
        assert_eq!(operation, "list_tasks");
        assert!(task_id.is_none() && actor.is_none());
    }
}
