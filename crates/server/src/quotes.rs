//! REST surface for the quote lifecycle.
//!
//! Endpoints:
//! - `GET    /quotes`                      — filtered, sorted, paginated listing
//! - `POST   /quotes`                      — create (computes totals)
//! - `GET    /quotes/{id}`                 — fetch with client and items
//! - `PUT    /quotes/{id}`                 — item replacement and/or field patch
//! - `DELETE /quotes/{id}`                 — hard delete, cascades items
//! - `POST   /quotes/{id}/send|accept|reject` — lifecycle transitions
//! - `POST   /quotes/{id}/convert-to-job`  — materialize a job
//! - `GET    /quotes/{id}/pdf`             — rendered document (attachment)
//! - `GET    /quotes/{id}/pdf/stream`      — rendered document (inline)

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use fieldops_core::config::{AppConfig, PaginationConfig};
use fieldops_core::conversion::JobConversionInput;
use fieldops_core::domain::client::{Address, ClientId};
use fieldops_core::domain::company::UserId;
use fieldops_core::domain::job::JobPriority;
use fieldops_core::domain::quote::{QuoteId, QuoteStatus};
use fieldops_core::pricing::LineItemInput;
use fieldops_db::repositories::{
    NewQuote, QuoteFilters, QuoteRecord, QuoteSort, QuoteUpdate, SqlJobRepository,
    SqlQuoteRepository, TransitionAction,
};
use fieldops_db::{DbPool, PageQuery, SortDirection};

use crate::envelope::{self, ApiError};
use crate::pdf::PdfGenerator;
use crate::tenant::Tenant;

#[derive(Clone)]
pub struct QuotesState {
    db_pool: DbPool,
    pagination: PaginationConfig,
    pdf_generator: Option<Arc<PdfGenerator>>,
}

pub fn router(db_pool: DbPool, config: &AppConfig) -> Router {
    let pdf_generator = match PdfGenerator::new("templates/quotes") {
        Ok(generator) => Some(Arc::new(generator)),
        Err(error) => {
            warn!(
                error = %error,
                "failed to load quote templates from filesystem, using embedded fallback"
            );
            Some(Arc::new(PdfGenerator::with_embedded_templates()))
        }
    };

    Router::new()
        .route("/quotes", get(list_quotes).post(create_quote))
        .route("/quotes/{id}", get(get_quote).put(update_quote).delete(delete_quote))
        .route("/quotes/{id}/send", post(send_quote))
        .route("/quotes/{id}/accept", post(accept_quote))
        .route("/quotes/{id}/reject", post(reject_quote))
        .route("/quotes/{id}/convert-to-job", post(convert_quote_to_job))
        .route("/quotes/{id}/pdf", get(download_quote_pdf))
        .route("/quotes/{id}/pdf/stream", get(stream_quote_pdf))
        .with_state(QuotesState {
            db_pool,
            pagination: config.pagination.clone(),
            pdf_generator,
        })
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListQuotesQuery {
    pub status: Option<String>,
    pub client_id: Option<String>,
    pub search: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(rename = "sortDirection")]
    pub sort_direction: Option<String>,
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteItemBody {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
}

impl From<QuoteItemBody> for LineItemInput {
    fn from(body: QuoteItemBody) -> Self {
        Self {
            description: body.description,
            quantity: body.quantity,
            unit_price: body.unit_price,
            tax_rate: body.tax_rate,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateQuoteBody {
    pub client_id: String,
    pub items: Vec<QuoteItemBody>,
    pub valid_until: NaiveDate,
    pub notes: Option<String>,
    pub profit_margin: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuoteBody {
    pub items: Option<Vec<QuoteItemBody>>,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub profit_margin: Option<Decimal>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConvertToJobBody {
    pub scheduled_date: NaiveDate,
    pub assigned_technician: Option<String>,
    pub priority: Option<String>,
    pub estimated_duration: Option<Decimal>,
    pub location: Option<Address>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClientSummary {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct QuoteItemResponse {
    pub id: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub id: String,
    pub company_id: String,
    pub client_id: String,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub profit_margin: Decimal,
    pub status: QuoteStatus,
    pub valid_until: NaiveDate,
    pub notes: Option<String>,
    pub items: Vec<QuoteItemResponse>,
    pub client: ClientSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<QuoteRecord> for QuoteResponse {
    fn from(record: QuoteRecord) -> Self {
        let quote = record.quote;
        Self {
            id: quote.id.0.clone(),
            company_id: quote.company_id.0,
            client_id: quote.client_id.0.clone(),
            subtotal: quote.subtotal,
            tax_amount: quote.tax_amount,
            total: quote.total,
            profit_margin: quote.profit_margin,
            status: quote.status,
            valid_until: quote.valid_until,
            notes: quote.notes,
            items: quote
                .items
                .into_iter()
                .map(|item| QuoteItemResponse {
                    id: item.id.0,
                    description: item.description,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    tax_rate: item.tax_rate,
                    line_total: item.line_total,
                })
                .collect(),
            client: ClientSummary {
                id: quote.client_id.0,
                name: record.client_name,
                email: record.client_email,
            },
            created_at: quote.created_at,
            updated_at: quote.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn list_quotes(
    State(state): State<QuotesState>,
    Tenant(company_id): Tenant,
    Query(query): Query<ListQuotesQuery>,
) -> Result<Response, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|raw| {
            QuoteStatus::parse(raw).ok_or_else(|| {
                ApiError::validation(
                    "status",
                    "must be one of draft|sent|accepted|rejected|expired",
                )
            })
        })
        .transpose()?;

    let direction = query
        .sort_direction
        .as_deref()
        .map(|raw| {
            SortDirection::parse(raw)
                .ok_or_else(|| ApiError::validation("sortDirection", "must be asc or desc"))
        })
        .transpose()?
        .unwrap_or_default();

    let filters = QuoteFilters {
        status,
        client_id: query.client_id.map(ClientId),
        search: query.search,
    };
    let sort = QuoteSort {
        column: query.sort_by.unwrap_or_else(|| "created_at".to_string()),
        direction,
    };
    let page = PageQuery::clamped(
        query.page,
        query.limit,
        state.pagination.default_limit,
        state.pagination.max_limit,
    );

    let repo = SqlQuoteRepository::new(state.db_pool.clone());
    let (records, meta) = repo.list(&company_id, &filters, &sort, page).await?;

    let data: Vec<QuoteResponse> = records.into_iter().map(QuoteResponse::from).collect();
    Ok(envelope::paginated(data, meta))
}

async fn create_quote(
    State(state): State<QuotesState>,
    Tenant(company_id): Tenant,
    Json(body): Json<CreateQuoteBody>,
) -> Result<Response, ApiError> {
    let repo = SqlQuoteRepository::new(state.db_pool.clone());
    let record = repo
        .create(
            &company_id,
            NewQuote {
                client_id: ClientId(body.client_id),
                items: body.items.into_iter().map(LineItemInput::from).collect(),
                valid_until: body.valid_until,
                notes: body.notes,
                profit_margin: body.profit_margin,
            },
        )
        .await?;

    info!(
        event_name = "quote.created",
        company_id = %company_id.0,
        quote_id = %record.quote.id.0,
        total = %record.quote.total,
        "quote created"
    );

    Ok(envelope::created(QuoteResponse::from(record), "Quote created successfully"))
}

async fn get_quote(
    State(state): State<QuotesState>,
    Tenant(company_id): Tenant,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let repo = SqlQuoteRepository::new(state.db_pool.clone());
    let record = repo.get(&company_id, &QuoteId(id)).await?;
    Ok(envelope::ok(QuoteResponse::from(record)))
}

async fn update_quote(
    State(state): State<QuotesState>,
    Tenant(company_id): Tenant,
    Path(id): Path<String>,
    Json(body): Json<UpdateQuoteBody>,
) -> Result<Response, ApiError> {
    let status = body
        .status
        .as_deref()
        .map(|raw| {
            QuoteStatus::parse(raw).ok_or_else(|| {
                ApiError::validation(
                    "status",
                    "must be one of draft|sent|accepted|rejected|expired",
                )
            })
        })
        .transpose()?;

    let repo = SqlQuoteRepository::new(state.db_pool.clone());
    let record = repo
        .update(
            &company_id,
            &QuoteId(id),
            QuoteUpdate {
                items: body
                    .items
                    .map(|items| items.into_iter().map(LineItemInput::from).collect()),
                valid_until: body.valid_until,
                notes: body.notes,
                profit_margin: body.profit_margin,
                status,
            },
        )
        .await?;

    info!(
        event_name = "quote.updated",
        company_id = %company_id.0,
        quote_id = %record.quote.id.0,
        "quote updated"
    );

    Ok(envelope::ok_with_message(QuoteResponse::from(record), "Quote updated successfully"))
}

async fn delete_quote(
    State(state): State<QuotesState>,
    Tenant(company_id): Tenant,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let repo = SqlQuoteRepository::new(state.db_pool.clone());
    repo.delete(&company_id, &QuoteId(id.clone())).await?;

    info!(
        event_name = "quote.deleted",
        company_id = %company_id.0,
        quote_id = %id,
        "quote deleted"
    );

    Ok(envelope::ok_with_message(serde_json::Value::Null, "Quote deleted successfully"))
}

async fn send_quote(
    state: State<QuotesState>,
    tenant: Tenant,
    id: Path<String>,
) -> Result<Response, ApiError> {
    transition_quote(state, tenant, id, TransitionAction::Send, "Quote sent successfully").await
}

async fn accept_quote(
    state: State<QuotesState>,
    tenant: Tenant,
    id: Path<String>,
) -> Result<Response, ApiError> {
    transition_quote(state, tenant, id, TransitionAction::Accept, "Quote accepted successfully")
        .await
}

async fn reject_quote(
    state: State<QuotesState>,
    tenant: Tenant,
    id: Path<String>,
) -> Result<Response, ApiError> {
    transition_quote(state, tenant, id, TransitionAction::Reject, "Quote rejected successfully")
        .await
}

async fn transition_quote(
    State(state): State<QuotesState>,
    Tenant(company_id): Tenant,
    Path(id): Path<String>,
    action: TransitionAction,
    message: &'static str,
) -> Result<Response, ApiError> {
    let repo = SqlQuoteRepository::new(state.db_pool.clone());
    let record = repo.transition(&company_id, &QuoteId(id), action).await?;

    info!(
        event_name = "quote.transitioned",
        company_id = %company_id.0,
        quote_id = %record.quote.id.0,
        status = %record.quote.status,
        "quote status changed"
    );

    Ok(envelope::ok_with_message(QuoteResponse::from(record), message))
}

async fn convert_quote_to_job(
    State(state): State<QuotesState>,
    Tenant(company_id): Tenant,
    Path(id): Path<String>,
    Json(body): Json<ConvertToJobBody>,
) -> Result<Response, ApiError> {
    let priority = body
        .priority
        .as_deref()
        .map(|raw| {
            JobPriority::parse(raw).ok_or_else(|| {
                ApiError::validation("priority", "must be one of low|medium|high|urgent")
            })
        })
        .transpose()?;

    let repo = SqlJobRepository::new(state.db_pool.clone());
    let job = repo
        .create_from_quote(
            &company_id,
            &QuoteId(id),
            JobConversionInput {
                scheduled_date: Some(body.scheduled_date),
                assigned_technician: body.assigned_technician.map(UserId),
                priority,
                estimated_duration: body.estimated_duration,
                location: body.location,
                notes: body.notes,
            },
        )
        .await?;

    info!(
        event_name = "quote.converted_to_job",
        company_id = %company_id.0,
        quote_id = %job.quote_id.as_ref().map(|quote_id| quote_id.0.as_str()).unwrap_or("unknown"),
        job_id = %job.id.0,
        "job created from accepted quote"
    );

    Ok(envelope::created(job, "Job created from quote successfully"))
}

async fn download_quote_pdf(
    state: State<QuotesState>,
    tenant: Tenant,
    id: Path<String>,
) -> Result<Response, ApiError> {
    render_quote_pdf(state, tenant, id, false).await
}

async fn stream_quote_pdf(
    state: State<QuotesState>,
    tenant: Tenant,
    id: Path<String>,
) -> Result<Response, ApiError> {
    render_quote_pdf(state, tenant, id, true).await
}

async fn render_quote_pdf(
    State(state): State<QuotesState>,
    Tenant(company_id): Tenant,
    Path(id): Path<String>,
    inline: bool,
) -> Result<Response, ApiError> {
    let generator = state
        .pdf_generator
        .as_ref()
        .ok_or(ApiError::Unavailable("quote document rendering"))?;

    let repo = SqlQuoteRepository::new(state.db_pool.clone());
    let record = repo.get(&company_id, &QuoteId(id)).await?;

    let filename = format!("quote-{}.pdf", record.quote.id.short());
    let document = generator
        .generate_quote_document(&quote_document_data(&record))
        .await
        .map_err(|error| ApiError::Internal(error.to_string()))?;

    info!(
        event_name = "quote.pdf.rendered",
        company_id = %company_id.0,
        quote_id = %record.quote.id.0,
        inline,
        "quote document rendered"
    );

    Ok(document.into_response(&filename, inline))
}

/// Shape the quote record into the context the document templates expect.
fn quote_document_data(record: &QuoteRecord) -> serde_json::Value {
    let quote = &record.quote;
    json!({
        "id": quote.id.0,
        "short_id": quote.id.short(),
        "status": quote.status.as_str(),
        "valid_until": quote.valid_until.to_string(),
        "created_at": quote.created_at.to_rfc3339(),
        "notes": quote.notes,
        "client": {
            "name": record.client_name,
            "email": record.client_email,
        },
        "lines": quote.items.iter().map(|item| json!({
            "description": item.description,
            "quantity": item.quantity.to_f64().unwrap_or(0.0),
            "unit_price": item.unit_price.to_f64().unwrap_or(0.0),
            "tax_rate": item.tax_rate.to_f64().unwrap_or(0.0),
            "line_total": item.line_total.to_f64().unwrap_or(0.0),
        })).collect::<Vec<_>>(),
        "pricing": {
            "subtotal": quote.subtotal.to_f64().unwrap_or(0.0),
            "tax_amount": quote.tax_amount.to_f64().unwrap_or(0.0),
            "total": quote.total.to_f64().unwrap_or(0.0),
        },
    })
}
