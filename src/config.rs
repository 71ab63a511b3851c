use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::assessment::QuorumPolicy;
use crate::workflow::types::ActorId;

/// Main configuration structure for peerdoc
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PeerdocConfig {
    /// Reviewer pool used by the completion policy
    #[serde(default)]
    pub reviewers: ReviewerConfig,
    /// Completion quorum policy
    #[serde(default)]
    pub quorum: QuorumConfig,
    /// Workflow state storage settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Observability settings
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReviewerConfig {
    /// Actor ids of the configured reviewer team
    #[serde(default)]
    pub pool: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumPolicyKind {
    AllEligible,
    MinimumVotes,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuorumConfig {
    /// "all_eligible" or "minimum_votes"
    #[serde(default = "default_quorum_policy")]
    pub policy: QuorumPolicyKind,
    /// Vote threshold per document when policy = "minimum_votes"
    #[serde(default = "default_minimum_votes")]
    pub minimum_votes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// "json" (default) or "sqlite" (requires the `database` feature)
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    /// Path of the JSON workflow state file
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Connection URL when backend = "sqlite"
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level for the tracing env filter
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_quorum_policy() -> QuorumPolicyKind {
    QuorumPolicyKind::AllEligible
}

fn default_minimum_votes() -> u32 {
    1
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Json
}

fn default_storage_path() -> String {
    ".peerdoc/workflow.json".to_string()
}

fn default_database_url() -> String {
    "sqlite://.peerdoc/workflow.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            policy: default_quorum_policy(),
            minimum_votes: default_minimum_votes(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: default_storage_path(),
            database_url: default_database_url(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl PeerdocConfig {
    /// Load configuration from peerdoc.toml (if present) with PEERDOC_*
    /// environment overrides on top.
    pub fn load() -> Result<Self> {
        Self::load_from("peerdoc.toml")
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("PEERDOC").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn reviewer_pool(&self) -> Vec<ActorId> {
        self.reviewers.pool.iter().cloned().map(ActorId).collect()
    }

    pub fn quorum_policy(&self) -> QuorumPolicy {
        match self.quorum.policy {
            QuorumPolicyKind::AllEligible => QuorumPolicy::AllEligible,
            QuorumPolicyKind::MinimumVotes => QuorumPolicy::MinimumVotes(self.quorum.minimum_votes),
        }
    }
}
