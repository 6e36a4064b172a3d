//! Job persistence, including materialization of a job from an accepted
//! quote. The conversion guards live in `fieldops_core::conversion`; this
//! module supplies the quote, the client address, and the technician
//! check, and persists the draft inside one transaction.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use fieldops_core::conversion::{materialize_job, JobConversionInput};
use fieldops_core::domain::client::{Address, ClientId};
use fieldops_core::domain::company::{CompanyId, UserId};
use fieldops_core::domain::job::{Job, JobId, JobPriority, JobStatus};
use fieldops_core::domain::quote::QuoteId;

use super::{
    date_column, optional_decimal_column, new_row_id, quote::fetch_record_tx, stored_money,
    timestamp_column, RepositoryError,
};
use crate::DbPool;

pub struct SqlJobRepository {
    pool: DbPool,
}

impl SqlJobRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Convert an accepted quote into a scheduled job. The quote itself is
    /// left untouched; conversion is not exclusive, so a quote may produce
    /// more than one job.
    pub async fn create_from_quote(
        &self,
        company_id: &CompanyId,
        quote_id: &QuoteId,
        input: JobConversionInput,
    ) -> Result<Job, RepositoryError> {
        let now = Utc::now();
        let today = now.date_naive();

        let mut tx = self.pool.begin().await?;
        let record = fetch_record_tx(&mut tx, company_id, quote_id).await?;

        if let Some(technician) = &input.assigned_technician {
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM users WHERE id = ? AND company_id = ?")
                    .bind(&technician.0)
                    .bind(&company_id.0)
                    .fetch_optional(&mut *tx)
                    .await?;
            if exists.is_none() {
                return Err(RepositoryError::not_found("technician"));
            }
        }

        let client_address_raw: Option<Option<String>> =
            sqlx::query_scalar("SELECT address FROM client WHERE id = ? AND company_id = ?")
                .bind(&record.quote.client_id.0)
                .bind(&company_id.0)
                .fetch_optional(&mut *tx)
                .await?;
        let client_address = client_address_raw
            .flatten()
            .map(|raw| {
                serde_json::from_str::<Address>(&raw).map_err(|_| {
                    RepositoryError::Decode(format!("client address is not valid JSON: `{raw}`"))
                })
            })
            .transpose()?;

        let draft = materialize_job(&record.quote, client_address.as_ref(), input, today)?;

        let job_id = new_row_id();
        let timestamp = now.to_rfc3339();
        let location_json = serde_json::to_string(&draft.location)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO job
                (id, company_id, client_id, quote_id, title, description, status, priority,
                 estimated_duration, assigned_technician, scheduled_date, location, notes,
                 created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job_id)
        .bind(&company_id.0)
        .bind(&record.quote.client_id.0)
        .bind(&record.quote.id.0)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.status.as_str())
        .bind(draft.priority.as_str())
        .bind(draft.estimated_duration.map(stored_money))
        .bind(draft.assigned_technician.as_ref().map(|technician| technician.0.clone()))
        .bind(draft.scheduled_date.to_string())
        .bind(&location_json)
        .bind(&draft.notes)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get(company_id, &JobId(job_id)).await
    }

    pub async fn get(&self, company_id: &CompanyId, id: &JobId) -> Result<Job, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, company_id, client_id, quote_id, title, description, status, priority,
                    estimated_duration, assigned_technician, scheduled_date, location, notes,
                    created_at, updated_at
             FROM job WHERE id = ? AND company_id = ?",
        )
        .bind(&id.0)
        .bind(&company_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => decode_job_row(&row),
            None => Err(RepositoryError::not_found("job")),
        }
    }

    pub async fn list_for_quote(
        &self,
        company_id: &CompanyId,
        quote_id: &QuoteId,
    ) -> Result<Vec<Job>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, company_id, client_id, quote_id, title, description, status, priority,
                    estimated_duration, assigned_technician, scheduled_date, location, notes,
                    created_at, updated_at
             FROM job WHERE quote_id = ? AND company_id = ?
             ORDER BY created_at",
        )
        .bind(&quote_id.0)
        .bind(&company_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_job_row).collect()
    }
}

fn decode_job_row(row: &SqliteRow) -> Result<Job, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    let status = JobStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown job status `{status_raw}`")))?;

    let priority_raw: String = row.try_get("priority")?;
    let priority = JobPriority::parse(&priority_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown job priority `{priority_raw}`"))
    })?;

    let location_raw: String = row.try_get("location")?;
    let location = serde_json::from_str::<Address>(&location_raw).map_err(|_| {
        RepositoryError::Decode(format!("job location is not valid JSON: `{location_raw}`"))
    })?;

    Ok(Job {
        id: JobId(row.try_get("id")?),
        company_id: CompanyId(row.try_get("company_id")?),
        client_id: ClientId(row.try_get("client_id")?),
        quote_id: row.try_get::<Option<String>, _>("quote_id")?.map(QuoteId),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status,
        priority,
        estimated_duration: optional_decimal_column(row, "estimated_duration")?,
        assigned_technician: row
            .try_get::<Option<String>, _>("assigned_technician")?
            .map(UserId),
        scheduled_date: date_column(row, "scheduled_date")?,
        location,
        notes: row.try_get("notes")?,
        created_at: timestamp_column(row, "created_at")?,
        updated_at: timestamp_column(row, "updated_at")?,
    })
}
