use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use fieldops_core::domain::company::{CompanyId, UserId};

use super::{timestamp_column, RepositoryError};
use crate::DbPool;

#[derive(Clone, Copy, Debug)]
pub struct ScheduleWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScheduleEventRecord {
    pub id: String,
    pub job_id: Option<String>,
    pub technician_id: Option<String>,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

pub struct SqlScheduleRepository {
    pool: DbPool,
}

impl SqlScheduleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Calendar rows for the tenant, optionally limited to a time window
    /// and a technician. This is a plain filtered listing; conflict
    /// detection and availability remain unimplemented.
    pub async fn events(
        &self,
        company_id: &CompanyId,
        window: Option<ScheduleWindow>,
        technician: Option<&UserId>,
    ) -> Result<Vec<ScheduleEventRecord>, RepositoryError> {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT id, job_id, technician_id, title, starts_at, ends_at
             FROM schedule_event WHERE company_id = ",
        );
        builder.push_bind(company_id.0.clone());

        if let Some(window) = window {
            builder.push(" AND starts_at BETWEEN ");
            builder.push_bind(window.start.to_rfc3339());
            builder.push(" AND ");
            builder.push_bind(window.end.to_rfc3339());
        }

        if let Some(technician) = technician {
            builder.push(" AND technician_id = ");
            builder.push_bind(technician.0.clone());
        }

        builder.push(" ORDER BY starts_at");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(decode_event_row).collect()
    }
}

fn decode_event_row(row: &SqliteRow) -> Result<ScheduleEventRecord, RepositoryError> {
    Ok(ScheduleEventRecord {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        technician_id: row.try_get("technician_id")?,
        title: row.try_get("title")?,
        starts_at: timestamp_column(row, "starts_at")?,
        ends_at: timestamp_column(row, "ends_at")?,
    })
}
