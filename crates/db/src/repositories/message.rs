use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use fieldops_core::domain::company::CompanyId;

use super::{timestamp_column, RepositoryError};
use crate::pagination::{PageMeta, PageQuery};
use crate::DbPool;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MessageRecord {
    pub id: String,
    pub conversation_id: String,
    pub sender: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversationRecord {
    pub id: String,
    pub participant_name: String,
    pub participant_email: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub struct SqlMessageRepository {
    pool: DbPool,
}

impl SqlMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        company_id: &CompanyId,
        page: PageQuery,
    ) -> Result<(Vec<MessageRecord>, PageMeta), RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM message WHERE company_id = ?")
            .bind(&company_id.0)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            "SELECT id, conversation_id, sender, body, created_at
             FROM message WHERE company_id = ?
             ORDER BY created_at DESC
             LIMIT ? OFFSET ?",
        )
        .bind(&company_id.0)
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let messages =
            rows.iter().map(decode_message_row).collect::<Result<Vec<_>, RepositoryError>>()?;
        Ok((messages, PageMeta::new(page, total as u64)))
    }

    /// Conversations ordered by most recent activity, the way an inbox
    /// lists threads.
    pub async fn threads(
        &self,
        company_id: &CompanyId,
        page: PageQuery,
    ) -> Result<(Vec<ConversationRecord>, PageMeta), RepositoryError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM conversation WHERE company_id = ?")
                .bind(&company_id.0)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query(
            "SELECT id, participant_name, participant_email, last_message_at, created_at
             FROM conversation WHERE company_id = ?
             ORDER BY IFNULL(last_message_at, created_at) DESC
             LIMIT ? OFFSET ?",
        )
        .bind(&company_id.0)
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let threads =
            rows.iter().map(decode_thread_row).collect::<Result<Vec<_>, RepositoryError>>()?;
        Ok((threads, PageMeta::new(page, total as u64)))
    }
}

fn decode_message_row(row: &SqliteRow) -> Result<MessageRecord, RepositoryError> {
    Ok(MessageRecord {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        sender: row.try_get("sender")?,
        body: row.try_get("body")?,
        created_at: timestamp_column(row, "created_at")?,
    })
}

fn decode_thread_row(row: &SqliteRow) -> Result<ConversationRecord, RepositoryError> {
    let last_message_at = match row.try_get::<Option<String>, _>("last_message_at")? {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(&raw)
                .map(|value| value.with_timezone(&Utc))
                .map_err(|_| {
                    RepositoryError::Decode(format!(
                        "column `last_message_at` holds a non-rfc3339 value `{raw}`"
                    ))
                })?,
        ),
        None => None,
    };

    Ok(ConversationRecord {
        id: row.try_get("id")?,
        participant_name: row.try_get("participant_name")?,
        participant_email: row.try_get("participant_email")?,
        last_message_at,
        created_at: timestamp_column(row, "created_at")?,
    })
}
