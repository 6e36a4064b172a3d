//! Messaging endpoints: inbox and thread listings plus the canned
//! template catalogue. Outbound delivery (WhatsApp/email) is handled by
//! an external collaborator and remains unimplemented here.

use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;

use fieldops_core::config::{AppConfig, PaginationConfig};
use fieldops_db::repositories::SqlMessageRepository;
use fieldops_db::{DbPool, PageQuery};

use crate::envelope::{self, ApiError};
use crate::tenant::Tenant;

#[derive(Clone)]
pub struct MessagesState {
    db_pool: DbPool,
    pagination: PaginationConfig,
}

pub fn router(db_pool: DbPool, config: &AppConfig) -> Router {
    Router::new()
        .route("/messages", get(list_messages))
        .route("/messages/threads", get(list_threads))
        .route("/messages/templates", get(list_templates))
        .route("/messages/send", post(send_message))
        .with_state(MessagesState { db_pool, pagination: config.pagination.clone() })
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

async fn list_messages(
    State(state): State<MessagesState>,
    Tenant(company_id): Tenant,
    Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
    let page = PageQuery::clamped(
        params.page,
        params.limit,
        state.pagination.default_limit,
        state.pagination.max_limit,
    );
    let repo = SqlMessageRepository::new(state.db_pool.clone());
    let (messages, meta) = repo.list(&company_id, page).await?;
    Ok(envelope::paginated(messages, meta))
}

async fn list_threads(
    State(state): State<MessagesState>,
    Tenant(company_id): Tenant,
    Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
    let page = PageQuery::clamped(
        params.page,
        params.limit,
        state.pagination.default_limit,
        state.pagination.max_limit,
    );
    let repo = SqlMessageRepository::new(state.db_pool.clone());
    let (threads, meta) = repo.threads(&company_id, page).await?;
    Ok(envelope::paginated(threads, meta))
}

async fn list_templates(Tenant(_company_id): Tenant) -> Response {
    envelope::ok(json!([
        {
            "id": "quote_sent",
            "name": "Quote Sent",
            "content": "Your quote has been sent. Please review and let us know if you have any questions.",
        },
        {
            "id": "job_scheduled",
            "name": "Job Scheduled",
            "content": "Your job has been scheduled. We will arrive on {date} at {time}.",
        },
        {
            "id": "payment_reminder",
            "name": "Payment Reminder",
            "content": "This is a reminder that invoice #{invoice_number} is due on {due_date}.",
        },
    ]))
}

async fn send_message(Tenant(_company_id): Tenant) -> ApiError {
    ApiError::Unavailable("message sending")
}
