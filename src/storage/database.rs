use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{migrate::MigrateDatabase, sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

use super::{StorageError, WorkflowStore};
use crate::workflow::types::{
    ActorId, Assessment, AssessmentStatus, DocType, Document, DocumentId, Score, Task, TaskId,
    TaskStatus, Vote, VoteId,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        function_ref TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        status TEXT NOT NULL,
        annotator TEXT NOT NULL,
        writer1 TEXT NOT NULL,
        writer2 TEXT,
        deadline TEXT,
        winning_document TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
        author TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        doc_type TEXT NOT NULL,
        submitted_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS votes (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        voter TEXT NOT NULL,
        document_quality INTEGER NOT NULL,
        code_readability INTEGER NOT NULL,
        comments TEXT,
        voted_at TEXT NOT NULL,
        UNIQUE (document_id, voter)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assessments (
        task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
        document_id TEXT NOT NULL,
        avg_document_quality REAL NOT NULL,
        avg_code_readability REAL NOT NULL,
        total_votes INTEGER NOT NULL,
        status TEXT NOT NULL,
        completed_at TEXT,
        PRIMARY KEY (task_id, document_id)
    )
    "#,
];

/// SQLite-backed store for deployments that outgrow the JSON snapshot.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to the database, creating it and its schema on first use.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        if !sqlx::Sqlite::database_exists(database_url)
            .await
            .map_err(backend)?
        {
            info!(url = database_url, "creating workflow database");
            sqlx::Sqlite::create_database(database_url)
                .await
                .map_err(backend)?;
        }

        let pool = SqlitePool::connect(database_url).await.map_err(backend)?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await.map_err(backend)?;
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn shutdown(&self) {
        self.pool.close().await;
    }
}

fn backend(err: sqlx::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Backend(format!("bad timestamp '{raw}': {e}")))
}

fn parse_opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>, StorageError> {
    raw.as_deref().map(parse_ts).transpose()
}

fn parse_uuid(raw: &str) -> Result<uuid::Uuid, StorageError> {
    uuid::Uuid::parse_str(raw).map_err(|e| StorageError::Backend(format!("bad id '{raw}': {e}")))
}

fn parse_score(raw: i64) -> Result<Score, StorageError> {
    let value = u8::try_from(raw)
        .map_err(|_| StorageError::Backend(format!("score {raw} out of range")))?;
    Score::new(value).map_err(|e| StorageError::Backend(e.to_string()))
}

fn task_from_row(row: &SqliteRow) -> Result<Task, StorageError> {
    let status: String = row.get("status");
    let writer2: Option<String> = row.get("writer2");
    let winning: Option<String> = row.get("winning_document");

    Ok(Task {
        id: TaskId(parse_uuid(row.get::<String, _>("id").as_str())?),
        function_ref: row.get("function_ref"),
        title: row.get("title"),
        description: row.get("description"),
        status: status
            .parse::<TaskStatus>()
            .map_err(StorageError::Backend)?,
        annotator: ActorId::new(row.get::<String, _>("annotator")),
        writer1: ActorId::new(row.get::<String, _>("writer1")),
        writer2: writer2.map(ActorId::new),
        deadline: parse_opt_ts(row.get("deadline"))?,
        winning_document: winning
            .as_deref()
            .map(parse_uuid)
            .transpose()?
            .map(DocumentId),
        created_at: parse_ts(row.get::<String, _>("created_at").as_str())?,
        updated_at: parse_ts(row.get::<String, _>("updated_at").as_str())?,
    })
}

fn document_from_row(row: &SqliteRow) -> Result<Document, StorageError> {
    let doc_type: String = row.get("doc_type");
    Ok(Document {
        id: DocumentId(parse_uuid(row.get::<String, _>("id").as_str())?),
        task: TaskId(parse_uuid(row.get::<String, _>("task_id").as_str())?),
        author: ActorId::new(row.get::<String, _>("author")),
        title: row.get("title"),
        content: row.get("content"),
        doc_type: doc_type.parse::<DocType>().map_err(StorageError::Backend)?,
        submitted_at: parse_ts(row.get::<String, _>("submitted_at").as_str())?,
    })
}

fn vote_from_row(row: &SqliteRow) -> Result<Vote, StorageError> {
    Ok(Vote {
        id: VoteId(parse_uuid(row.get::<String, _>("id").as_str())?),
        document: DocumentId(parse_uuid(row.get::<String, _>("document_id").as_str())?),
        voter: ActorId::new(row.get::<String, _>("voter")),
        document_quality: parse_score(row.get("document_quality"))?,
        code_readability: parse_score(row.get("code_readability"))?,
        comments: row.get("comments"),
        voted_at: parse_ts(row.get::<String, _>("voted_at").as_str())?,
    })
}

fn assessment_from_row(row: &SqliteRow) -> Result<Assessment, StorageError> {
    let status: String = row.get("status");
    Ok(Assessment {
        task: TaskId(parse_uuid(row.get::<String, _>("task_id").as_str())?),
        document: DocumentId(parse_uuid(row.get::<String, _>("document_id").as_str())?),
        avg_document_quality: row.get("avg_document_quality"),
        avg_code_readability: row.get("avg_code_readability"),
        total_votes: row.get::<i64, _>("total_votes") as u32,
        status: status
            .parse::<AssessmentStatus>()
            .map_err(StorageError::Backend)?,
        completed_at: parse_opt_ts(row.get("completed_at"))?,
    })
}

#[async_trait]
impl WorkflowStore for SqliteStore {
    async fn load_task(&self, id: TaskId) -> Result<Option<Task>, StorageError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn save_task(&self, task: &Task) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO tasks
                (id, function_ref, title, description, status, annotator,
                 writer1, writer2, deadline, winning_document, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(task.id.to_string())
        .bind(&task.function_ref)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(&task.annotator.0)
        .bind(&task.writer1.0)
        .bind(task.writer2.as_ref().map(|w| w.0.clone()))
        .bind(task.deadline.map(|d| d.to_rfc3339()))
        .bind(task.winning_document.map(|d| d.to_string()))
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, StorageError> {
        let rows = sqlx::query("SELECT * FROM tasks ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.iter().map(task_from_row).collect()
    }

    async fn load_document(&self, id: DocumentId) -> Result<Option<Document>, StorageError> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(document_from_row).transpose()
    }

    async fn documents_for_task(&self, task: TaskId) -> Result<Vec<Document>, StorageError> {
        let rows =
            sqlx::query("SELECT * FROM documents WHERE task_id = ?1 ORDER BY submitted_at ASC")
                .bind(task.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        rows.iter().map(document_from_row).collect()
    }

    async fn save_document(&self, document: &Document) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO documents
                (id, task_id, author, title, content, doc_type, submitted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(document.id.to_string())
        .bind(document.task.to_string())
        .bind(&document.author.0)
        .bind(&document.title)
        .bind(&document.content)
        .bind(document.doc_type.as_str())
        .bind(document.submitted_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn votes_for_document(&self, document: DocumentId) -> Result<Vec<Vote>, StorageError> {
        let rows = sqlx::query("SELECT * FROM votes WHERE document_id = ?1 ORDER BY voted_at ASC")
            .bind(document.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.iter().map(vote_from_row).collect()
    }

    async fn save_vote(&self, vote: &Vote) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO votes
                (id, document_id, voter, document_quality, code_readability, comments, voted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(vote.id.to_string())
        .bind(vote.document.to_string())
        .bind(&vote.voter.0)
        .bind(vote.document_quality.value() as i64)
        .bind(vote.code_readability.value() as i64)
        .bind(vote.comments.as_deref())
        .bind(vote.voted_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StorageError::Conflict {
                    constraint: "vote (document, voter)",
                })
            }
            Err(err) => Err(backend(err)),
        }
    }

    async fn assessments_for_task(&self, task: TaskId) -> Result<Vec<Assessment>, StorageError> {
        let rows =
            sqlx::query("SELECT * FROM assessments WHERE task_id = ?1 ORDER BY document_id ASC")
                .bind(task.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        rows.iter().map(assessment_from_row).collect()
    }

    async fn save_assessment(&self, assessment: &Assessment) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO assessments
                (task_id, document_id, avg_document_quality, avg_code_readability,
                 total_votes, status, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(assessment.task.to_string())
        .bind(assessment.document.to_string())
        .bind(assessment.avg_document_quality)
        .bind(assessment.avg_code_readability)
        .bind(assessment.total_votes as i64)
        .bind(assessment.status.as_str())
        .bind(assessment.completed_at.map(|d| d.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}
