use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use thiserror::Error;

use fieldops_core::errors::DomainError;

pub mod client;
pub mod job;
pub mod message;
pub mod quote;
pub mod schedule;
pub mod user;

pub use client::SqlClientRepository;
pub use job::SqlJobRepository;
pub use message::{ConversationRecord, MessageRecord, SqlMessageRepository};
pub use quote::{
    NewQuote, QuoteFilters, QuoteRecord, QuoteSort, QuoteUpdate, SqlQuoteRepository,
    TransitionAction,
};
pub use schedule::{ScheduleEventRecord, ScheduleWindow, SqlScheduleRepository};
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }
}

/// Canonical stored form for monetary amounts: two fractional digits,
/// half-away-from-zero. SQLite has no decimal column type, so amounts are
/// persisted as text and parsed back into `Decimal` on read.
pub(crate) fn stored_money(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

pub(crate) fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, RepositoryError> {
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|_| {
        RepositoryError::Decode(format!("column `{column}` holds a non-decimal value `{raw}`"))
    })
}

pub(crate) fn optional_decimal_column(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<Decimal>, RepositoryError> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|raw| {
        raw.parse().map_err(|_| {
            RepositoryError::Decode(format!("column `{column}` holds a non-decimal value `{raw}`"))
        })
    })
    .transpose()
}

pub(crate) fn timestamp_column(
    row: &SqliteRow,
    column: &str,
) -> Result<DateTime<Utc>, RepositoryError> {
    let raw: String = row.try_get(column)?;
    DateTime::parse_from_rfc3339(&raw).map(|value| value.with_timezone(&Utc)).map_err(|_| {
        RepositoryError::Decode(format!("column `{column}` holds a non-rfc3339 value `{raw}`"))
    })
}

pub(crate) fn date_column(row: &SqliteRow, column: &str) -> Result<NaiveDate, RepositoryError> {
    let raw: String = row.try_get(column)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
        RepositoryError::Decode(format!("column `{column}` holds a non-date value `{raw}`"))
    })
}

pub(crate) fn new_row_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
