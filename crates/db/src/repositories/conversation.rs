use chrono::Utc;
use sqlx::Row;

use shelfdesk_core::domain::conversation::{
    MessageRole, SessionId, SessionSummary, StoredMessage, ToolCallRecord, TranscriptEntry,
};

use super::{parse_timestamp, ConversationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<StoredMessage, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let session_id: String =
        row.try_get("session_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let role: String = row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let content: String =
        row.try_get("content").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(StoredMessage {
        id,
        session_id: SessionId(session_id),
        role,
        content,
        created_at: parse_timestamp(&created_at_str),
    })
}

fn row_to_tool_call(row: &sqlx::sqlite::SqliteRow) -> Result<ToolCallRecord, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let session_id: String =
        row.try_get("session_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let args_json: String =
        row.try_get("args_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let result_json: String =
        row.try_get("result_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(ToolCallRecord {
        id,
        session_id: SessionId(session_id),
        name,
        args_json,
        result_json,
        created_at: parse_timestamp(&created_at_str),
    })
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn append_message(
        &self,
        session: &SessionId,
        role: MessageRole,
        content: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO messages (session_id, role, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.0)
        .bind(role.as_str())
        .bind(content)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append_tool_call(
        &self,
        session: &SessionId,
        name: &str,
        args_json: &str,
        result_json: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO tool_calls (session_id, name, args_json, result_json, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&session.0)
        .bind(name)
        .bind(args_json)
        .bind(result_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn history(&self, session: &SessionId) -> Result<Vec<TranscriptEntry>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT role, content FROM messages
             WHERE session_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(&session.0)
        .fetch_all(&self.pool)
        .await?;

        let mut transcript = Vec::with_capacity(rows.len());
        for row in &rows {
            let role_str: String =
                row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            // Non-conversational rows stay in the log but never reach the
            // transcript.
            let Some(role) = MessageRole::parse(&role_str) else {
                continue;
            };
            let content: String =
                row.try_get("content").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            transcript.push(TranscriptEntry { role, content });
        }

        Ok(transcript)
    }

    async fn raw_messages(
        &self,
        session: &SessionId,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, session_id, role, content, created_at FROM messages
             WHERE session_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(&session.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_message).collect::<Result<Vec<_>, _>>()
    }

    async fn tool_calls(
        &self,
        session: &SessionId,
    ) -> Result<Vec<ToolCallRecord>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, session_id, name, args_json, result_json, created_at FROM tool_calls
             WHERE session_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(&session.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_tool_call).collect::<Result<Vec<_>, _>>()
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT session_id, MIN(created_at) AS started, COUNT(*) AS message_count
             FROM messages GROUP BY session_id ORDER BY MAX(created_at) DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            let session_id: String =
                row.try_get("session_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let started_str: String =
                row.try_get("started").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let message_count: i64 = row
                .try_get("message_count")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            sessions.push(SessionSummary {
                session_id: SessionId(session_id),
                started: parse_timestamp(&started_str),
                message_count,
            });
        }

        Ok(sessions)
    }
}
