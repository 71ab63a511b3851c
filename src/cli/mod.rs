use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

pub mod commands;

#[derive(Parser)]
#[command(name = "peerdoc")]
#[command(about = "Documentation review workflow - competing drafts, reviewer votes, one winner")]
#[command(
    long_about = "Peerdoc tracks documentation tasks through assignment, writing, voting and \
                  completion. Writers submit competing drafts, reviewers score them on quality \
                  and readability, and the engine selects the winning draft."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default peerdoc.toml configuration file
    Init {
        /// Overwrite an existing peerdoc.toml
        #[arg(long, help = "Overwrite existing configuration")]
        force: bool,
    },
    /// Create a documentation task for a function (assigning actor)
    Create {
        /// Function the task documents, e.g. "crate::parser::tokenize"
        #[arg(long)]
        function: String,
        /// Short task title
        #[arg(long)]
        title: String,
        /// Longer task description
        #[arg(long, default_value = "")]
        description: String,
        /// Actor id of the code annotator creating the task
        #[arg(long)]
        annotator: String,
        /// First assigned writer
        #[arg(long)]
        writer1: String,
        /// Optional second (competing) writer
        #[arg(long)]
        writer2: Option<String>,
        /// Deadline as days from now
        #[arg(long, help = "Days until the task goes overtime")]
        deadline_days: Option<i64>,
    },
    /// Accept a writing assignment (writer)
    Accept {
        /// Task id
        task: Uuid,
        /// Acting writer's actor id
        #[arg(long)]
        actor: String,
    },
    /// Submit a documentation draft (writer)
    Submit {
        /// Task id
        task: Uuid,
        /// Acting writer's actor id
        #[arg(long)]
        actor: String,
        /// Draft title
        #[arg(long)]
        title: String,
        /// Draft content (inline)
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,
        /// Read draft content from a file
        #[arg(long)]
        file: Option<std::path::PathBuf>,
        /// Document type: guide, reference or example
        #[arg(long, default_value = "reference")]
        doc_type: String,
    },
    /// Cast a reviewer vote on a document
    Vote {
        /// Document id
        document: Uuid,
        /// Voting reviewer's actor id
        #[arg(long)]
        voter: String,
        /// Document quality score, 1-10
        #[arg(long)]
        quality: u8,
        /// Code readability score, 1-10
        #[arg(long)]
        readability: u8,
        /// Optional free-form comment
        #[arg(long)]
        comment: Option<String>,
    },
    /// Show one task with its documents, votes and assessments
    View {
        /// Task id
        task: Uuid,
    },
    /// List all tasks with their current status
    List,
    /// Operator override: move an overtime task back into the flow
    Override {
        /// Task id
        task: Uuid,
        /// Phase the task returns to
        #[arg(long, value_enum)]
        target: OverrideTargetArg,
        /// Extend the deadline by this many days from now
        #[arg(long, help = "New deadline as days from now")]
        extend_days: Option<i64>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OverrideTargetArg {
    Writing,
    Voting,
}
