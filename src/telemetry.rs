use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Initialize structured logging. RUST_LOG takes precedence over the
/// configured level.
pub fn init_telemetry(log_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
        .with(filter)
        .init();

    tracing::debug!("peerdoc telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking related operations
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create a span with common workflow attributes. Every span carries a
/// fresh correlation id so the log lines of one request can be stitched
/// back together.
pub fn create_workflow_span(
    operation: &str,
    task_id: Option<&str>,
    actor: Option<&str>,
) -> tracing::Span {
    tracing::info_span!(
        "workflow_operation",
        operation = operation,
        correlation_id = %generate_correlation_id(),
        task.id = task_id,
        actor.id = actor,
    )
}
