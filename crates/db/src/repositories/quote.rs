//! Quote persistence: filtered listing, transactional writes, and the
//! status transitions described by the lifecycle table in the domain
//! crate. Every operation takes the tenant explicitly; a row outside the
//! caller's company is indistinguishable from a missing row.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, Transaction};

use fieldops_core::domain::client::ClientId;
use fieldops_core::domain::company::CompanyId;
use fieldops_core::domain::quote::{Quote, QuoteId, QuoteItem, QuoteItemId, QuoteStatus};
use fieldops_core::errors::{DomainError, ValidationErrors};
use fieldops_core::pricing::{self, LineItemInput, PricedLine};

use super::{
    date_column, decimal_column, new_row_id, stored_money, timestamp_column, RepositoryError,
};
use crate::pagination::{PageMeta, PageQuery, SortDirection};
use crate::DbPool;

#[derive(Clone, Debug, Default)]
pub struct QuoteFilters {
    pub status: Option<QuoteStatus>,
    pub client_id: Option<ClientId>,
    pub search: Option<String>,
}

#[derive(Clone, Debug)]
pub struct QuoteSort {
    pub column: String,
    pub direction: SortDirection,
}

impl Default for QuoteSort {
    fn default() -> Self {
        Self { column: "created_at".to_string(), direction: SortDirection::Desc }
    }
}

/// A quote joined with the client summary the API embeds in every
/// response.
#[derive(Clone, Debug, PartialEq)]
pub struct QuoteRecord {
    pub quote: Quote,
    pub client_name: String,
    pub client_email: String,
}

#[derive(Clone, Debug)]
pub struct NewQuote {
    pub client_id: ClientId,
    pub items: Vec<LineItemInput>,
    pub valid_until: NaiveDate,
    pub notes: Option<String>,
    pub profit_margin: Option<Decimal>,
}

#[derive(Clone, Debug, Default)]
pub struct QuoteUpdate {
    pub items: Option<Vec<LineItemInput>>,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub profit_margin: Option<Decimal>,
    pub status: Option<QuoteStatus>,
}

impl QuoteUpdate {
    fn is_empty(&self) -> bool {
        self.items.is_none()
            && self.valid_until.is_none()
            && self.notes.is_none()
            && self.profit_margin.is_none()
            && self.status.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionAction {
    Send,
    Accept,
    Reject,
}

impl TransitionAction {
    fn target(&self) -> QuoteStatus {
        match self {
            Self::Send => QuoteStatus::Sent,
            Self::Accept => QuoteStatus::Accepted,
            Self::Reject => QuoteStatus::Rejected,
        }
    }

    fn allowed_from(&self) -> &'static [QuoteStatus] {
        match self {
            Self::Send => &[QuoteStatus::Draft, QuoteStatus::Sent],
            Self::Accept | Self::Reject => &[QuoteStatus::Sent],
        }
    }

    fn conflict_message(&self) -> &'static str {
        match self {
            Self::Send => "only draft or sent quotes can be sent",
            Self::Accept => "only sent quotes can be accepted",
            Self::Reject => "only sent quotes can be rejected",
        }
    }
}

/// Columns a listing may be sorted by, mapped to their ORDER BY
/// expressions. Money columns are stored as text and must be compared
/// numerically.
const SORTABLE_COLUMNS: &[(&str, &str)] = &[
    ("id", "q.id"),
    ("client_id", "q.client_id"),
    ("status", "q.status"),
    ("subtotal", "CAST(q.subtotal AS REAL)"),
    ("tax_amount", "CAST(q.tax_amount AS REAL)"),
    ("total", "CAST(q.total AS REAL)"),
    ("profit_margin", "CAST(q.profit_margin AS REAL)"),
    ("valid_until", "q.valid_until"),
    ("created_at", "q.created_at"),
    ("updated_at", "q.updated_at"),
];

fn sort_expression(column: &str) -> Result<&'static str, DomainError> {
    SORTABLE_COLUMNS
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, expression)| *expression)
        .ok_or_else(|| {
            DomainError::single_field("sortBy", format!("`{column}` is not a sortable column"))
        })
}

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        company_id: &CompanyId,
        filters: &QuoteFilters,
        sort: &QuoteSort,
        page: PageQuery,
    ) -> Result<(Vec<QuoteRecord>, PageMeta), RepositoryError> {
        let order = sort_expression(&sort.column)?;

        let mut count_builder = QueryBuilder::new(
            "SELECT COUNT(*) AS total
             FROM quote q
             INNER JOIN client c ON c.id = q.client_id
             WHERE q.company_id = ",
        );
        count_builder.push_bind(company_id.0.clone());
        push_filters(&mut count_builder, filters);

        let total: i64 = count_builder.build().fetch_one(&self.pool).await?.try_get("total")?;

        let mut builder = QueryBuilder::new(
            "SELECT q.id, q.company_id, q.client_id, q.subtotal, q.tax_amount, q.total,
                    q.profit_margin, q.status, q.valid_until, q.notes, q.created_at, q.updated_at,
                    c.name AS client_name, c.email AS client_email
             FROM quote q
             INNER JOIN client c ON c.id = q.client_id
             WHERE q.company_id = ",
        );
        builder.push_bind(company_id.0.clone());
        push_filters(&mut builder, filters);
        builder.push(format!(" ORDER BY {} {}", order, sort.direction.as_sql()));
        builder.push(" LIMIT ");
        builder.push_bind(i64::from(page.limit));
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let rows = builder.build().fetch_all(&self.pool).await?;
        let mut records =
            rows.iter().map(decode_quote_row).collect::<Result<Vec<_>, RepositoryError>>()?;

        let quote_ids: Vec<String> =
            records.iter().map(|record| record.quote.id.0.clone()).collect();
        let mut items = load_items(&self.pool, &quote_ids).await?;
        for record in &mut records {
            record.quote.items = items.remove(&record.quote.id.0).unwrap_or_default();
        }

        Ok((records, PageMeta::new(page, total as u64)))
    }

    pub async fn get(
        &self,
        company_id: &CompanyId,
        id: &QuoteId,
    ) -> Result<QuoteRecord, RepositoryError> {
        let row = sqlx::query(
            "SELECT q.id, q.company_id, q.client_id, q.subtotal, q.tax_amount, q.total,
                    q.profit_margin, q.status, q.valid_until, q.notes, q.created_at, q.updated_at,
                    c.name AS client_name, c.email AS client_email
             FROM quote q
             INNER JOIN client c ON c.id = q.client_id
             WHERE q.id = ? AND q.company_id = ?",
        )
        .bind(&id.0)
        .bind(&company_id.0)
        .fetch_optional(&self.pool)
        .await?;

        let mut record = match row {
            Some(row) => decode_quote_row(&row)?,
            None => return Err(RepositoryError::not_found("quote")),
        };

        let mut items = load_items(&self.pool, std::slice::from_ref(&record.quote.id.0)).await?;
        record.quote.items = items.remove(&record.quote.id.0).unwrap_or_default();
        Ok(record)
    }

    pub async fn create(
        &self,
        company_id: &CompanyId,
        input: NewQuote,
    ) -> Result<QuoteRecord, RepositoryError> {
        let now = Utc::now();
        let today = now.date_naive();

        validate_quote_fields(Some(input.valid_until), input.profit_margin, today)?;
        let totals = pricing::price_items(&input.items)?;

        let client_exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM client WHERE id = ? AND company_id = ?")
                .bind(&input.client_id.0)
                .bind(&company_id.0)
                .fetch_optional(&self.pool)
                .await?;
        if client_exists.is_none() {
            return Err(RepositoryError::not_found("client"));
        }

        let quote_id = new_row_id();
        let timestamp = now.to_rfc3339();
        let profit_margin = input.profit_margin.unwrap_or(Decimal::ZERO);

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO quote
                (id, company_id, client_id, subtotal, tax_amount, total, profit_margin,
                 status, valid_until, notes, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 'draft', ?, ?, ?, ?)",
        )
        .bind(&quote_id)
        .bind(&company_id.0)
        .bind(&input.client_id.0)
        .bind(stored_money(totals.subtotal))
        .bind(stored_money(totals.tax_amount))
        .bind(stored_money(totals.total))
        .bind(stored_money(profit_margin))
        .bind(input.valid_until.to_string())
        .bind(&input.notes)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&mut *tx)
        .await?;

        insert_items(&mut tx, &quote_id, &totals.lines, &timestamp).await?;
        tx.commit().await?;

        self.get(company_id, &QuoteId(quote_id)).await
    }

    /// Apply an item replacement and/or field patch in a single
    /// transaction. Replacing items recomputes the stored totals; the
    /// guarded UPDATE keeps the write race-free against a concurrent
    /// accept or reject.
    pub async fn update(
        &self,
        company_id: &CompanyId,
        id: &QuoteId,
        update: QuoteUpdate,
    ) -> Result<QuoteRecord, RepositoryError> {
        let now = Utc::now();
        let today = now.date_naive();

        validate_quote_fields(update.valid_until, update.profit_margin, today)?;

        let mut tx = self.pool.begin().await?;
        let existing = fetch_record_tx(&mut tx, company_id, id).await?;
        existing.quote.ensure_mutable()?;

        let next_status = match update.status {
            Some(next) if next == existing.quote.status => None,
            Some(next) => {
                if !existing.quote.can_transition_to(next) {
                    return Err(DomainError::InvalidTransition {
                        from: existing.quote.status,
                        to: next,
                    }
                    .into());
                }
                Some(next)
            }
            None => None,
        };

        if update.is_empty() {
            tx.commit().await?;
            return self.get(company_id, id).await;
        }

        let totals =
            update.items.as_deref().map(pricing::price_items).transpose()?;

        if let Some(totals) = &totals {
            sqlx::query("DELETE FROM quote_item WHERE quote_id = ?")
                .bind(&id.0)
                .execute(&mut *tx)
                .await?;
            insert_items(&mut tx, &id.0, &totals.lines, &now.to_rfc3339()).await?;
        }

        let mut builder = QueryBuilder::new("UPDATE quote SET updated_at = ");
        builder.push_bind(now.to_rfc3339());
        if let Some(totals) = &totals {
            builder.push(", subtotal = ");
            builder.push_bind(stored_money(totals.subtotal));
            builder.push(", tax_amount = ");
            builder.push_bind(stored_money(totals.tax_amount));
            builder.push(", total = ");
            builder.push_bind(stored_money(totals.total));
        }
        if let Some(valid_until) = update.valid_until {
            builder.push(", valid_until = ");
            builder.push_bind(valid_until.to_string());
        }
        if let Some(notes) = update.notes {
            builder.push(", notes = ");
            builder.push_bind(notes);
        }
        if let Some(profit_margin) = update.profit_margin {
            builder.push(", profit_margin = ");
            builder.push_bind(stored_money(profit_margin));
        }
        if let Some(next) = next_status {
            builder.push(", status = ");
            builder.push_bind(next.as_str());
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id.0.clone());
        builder.push(" AND company_id = ");
        builder.push_bind(company_id.0.clone());
        builder.push(" AND status IN ('draft', 'sent')");

        let result = builder.build().execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return Err(
                DomainError::conflict("cannot update accepted or rejected quotes").into()
            );
        }

        tx.commit().await?;
        self.get(company_id, id).await
    }

    pub async fn delete(
        &self,
        company_id: &CompanyId,
        id: &QuoteId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM quote WHERE id = ? AND company_id = ?")
            .bind(&id.0)
            .bind(&company_id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("quote"));
        }
        Ok(())
    }

    /// Drive a lifecycle transition with a compare-and-swap on `status`.
    ///
    /// A stale accept persists the quote as `expired` before the request
    /// fails; expiry is detected at access time, never by a background
    /// sweep.
    pub async fn transition(
        &self,
        company_id: &CompanyId,
        id: &QuoteId,
        action: TransitionAction,
    ) -> Result<QuoteRecord, RepositoryError> {
        let now = Utc::now();
        let today = now.date_naive();

        let mut tx = self.pool.begin().await?;
        let existing = fetch_record_tx(&mut tx, company_id, id).await?;

        if !action.allowed_from().contains(&existing.quote.status) {
            return Err(DomainError::conflict(action.conflict_message()).into());
        }

        if action == TransitionAction::Accept && existing.quote.is_expired_as_of(today) {
            sqlx::query(
                "UPDATE quote SET status = 'expired', updated_at = ?
                 WHERE id = ? AND company_id = ? AND status = 'sent'",
            )
            .bind(now.to_rfc3339())
            .bind(&id.0)
            .bind(&company_id.0)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            return Err(DomainError::conflict("quote has expired").into());
        }

        let mut builder = QueryBuilder::new("UPDATE quote SET status = ");
        builder.push_bind(action.target().as_str());
        builder.push(", updated_at = ");
        builder.push_bind(now.to_rfc3339());
        builder.push(" WHERE id = ");
        builder.push_bind(id.0.clone());
        builder.push(" AND company_id = ");
        builder.push_bind(company_id.0.clone());
        builder.push(" AND status IN (");
        let mut separated = builder.separated(", ");
        for status in action.allowed_from() {
            separated.push_bind(status.as_str());
        }
        builder.push(")");

        let result = builder.build().execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::conflict(action.conflict_message()).into());
        }

        tx.commit().await?;
        self.get(company_id, id).await
    }
}

fn validate_quote_fields(
    valid_until: Option<NaiveDate>,
    profit_margin: Option<Decimal>,
    today: NaiveDate,
) -> Result<(), DomainError> {
    let mut errors = ValidationErrors::new();

    if let Some(date) = valid_until {
        if date <= today {
            errors.add("valid_until", "must be a date after today");
        }
    }

    if let Some(margin) = profit_margin {
        if margin < Decimal::ZERO || margin > Decimal::ONE_HUNDRED {
            errors.add("profit_margin", "must be between 0 and 100");
        }
    }

    errors.into_result()
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filters: &QuoteFilters) {
    if let Some(status) = filters.status {
        builder.push(" AND q.status = ");
        builder.push_bind(status.as_str());
    }

    if let Some(client_id) = &filters.client_id {
        builder.push(" AND q.client_id = ");
        builder.push_bind(client_id.0.clone());
    }

    if let Some(search) = &filters.search {
        let trimmed = search.trim().to_ascii_lowercase();
        if !trimmed.is_empty() {
            let pattern = format!("%{trimmed}%");
            builder.push(" AND (LOWER(c.name) LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR LOWER(c.email) LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR LOWER(IFNULL(q.notes, '')) LIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }
    }
}

pub(crate) async fn fetch_record_tx(
    tx: &mut Transaction<'_, Sqlite>,
    company_id: &CompanyId,
    id: &QuoteId,
) -> Result<QuoteRecord, RepositoryError> {
    let row = sqlx::query(
        "SELECT q.id, q.company_id, q.client_id, q.subtotal, q.tax_amount, q.total,
                q.profit_margin, q.status, q.valid_until, q.notes, q.created_at, q.updated_at,
                c.name AS client_name, c.email AS client_email
         FROM quote q
         INNER JOIN client c ON c.id = q.client_id
         WHERE q.id = ? AND q.company_id = ?",
    )
    .bind(&id.0)
    .bind(&company_id.0)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(row) => decode_quote_row(&row),
        None => Err(RepositoryError::not_found("quote")),
    }
}

pub(crate) fn decode_quote_row(row: &SqliteRow) -> Result<QuoteRecord, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    let status = QuoteStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown quote status `{status_raw}`"))
    })?;

    Ok(QuoteRecord {
        quote: Quote {
            id: QuoteId(row.try_get("id")?),
            company_id: CompanyId(row.try_get("company_id")?),
            client_id: ClientId(row.try_get("client_id")?),
            subtotal: decimal_column(row, "subtotal")?,
            tax_amount: decimal_column(row, "tax_amount")?,
            total: decimal_column(row, "total")?,
            profit_margin: decimal_column(row, "profit_margin")?,
            status,
            valid_until: date_column(row, "valid_until")?,
            notes: row.try_get("notes")?,
            items: Vec::new(),
            created_at: timestamp_column(row, "created_at")?,
            updated_at: timestamp_column(row, "updated_at")?,
        },
        client_name: row.try_get("client_name")?,
        client_email: row.try_get("client_email")?,
    })
}

async fn load_items(
    pool: &DbPool,
    quote_ids: &[String],
) -> Result<HashMap<String, Vec<QuoteItem>>, RepositoryError> {
    if quote_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut builder = QueryBuilder::new(
        "SELECT id, quote_id, description, quantity, unit_price, tax_rate, line_total
         FROM quote_item WHERE quote_id IN (",
    );
    let mut separated = builder.separated(", ");
    for id in quote_ids {
        separated.push_bind(id.clone());
    }
    builder.push(") ORDER BY quote_id, position");

    let rows = builder.build().fetch_all(pool).await?;
    let mut grouped: HashMap<String, Vec<QuoteItem>> = HashMap::new();
    for row in &rows {
        let quote_id: String = row.try_get("quote_id")?;
        grouped.entry(quote_id).or_default().push(QuoteItem {
            id: QuoteItemId(row.try_get("id")?),
            description: row.try_get("description")?,
            quantity: decimal_column(row, "quantity")?,
            unit_price: decimal_column(row, "unit_price")?,
            tax_rate: decimal_column(row, "tax_rate")?,
            line_total: decimal_column(row, "line_total")?,
        });
    }

    Ok(grouped)
}

async fn insert_items(
    tx: &mut Transaction<'_, Sqlite>,
    quote_id: &str,
    lines: &[PricedLine],
    timestamp: &str,
) -> Result<(), RepositoryError> {
    for (position, line) in lines.iter().enumerate() {
        sqlx::query(
            "INSERT INTO quote_item
                (id, quote_id, description, quantity, unit_price, tax_rate, line_total,
                 position, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new_row_id())
        .bind(quote_id)
        .bind(&line.description)
        .bind(stored_money(line.quantity))
        .bind(stored_money(line.unit_price))
        .bind(stored_money(line.tax_rate))
        .bind(stored_money(line.line_total))
        .bind(position as i64)
        .bind(timestamp)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
