//! Schedule endpoints. The calendar is a filtered listing of stored
//! events; availability and conflict detection are unimplemented.

use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use fieldops_core::domain::company::UserId;
use fieldops_db::repositories::{ScheduleWindow, SqlScheduleRepository};
use fieldops_db::DbPool;

use crate::envelope::{self, ApiError};
use crate::tenant::Tenant;

#[derive(Clone)]
pub struct ScheduleState {
    db_pool: DbPool,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new()
        .route("/schedule/events", get(list_events))
        .route("/schedule/availability", get(availability))
        .route("/schedule/conflicts", get(conflicts))
        .with_state(ScheduleState { db_pool })
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub technician_id: Option<String>,
}

async fn list_events(
    State(state): State<ScheduleState>,
    Tenant(company_id): Tenant,
    Query(query): Query<EventsQuery>,
) -> Result<Response, ApiError> {
    let window = match (query.start, query.end) {
        (Some(start), Some(end)) => {
            if end < start {
                return Err(ApiError::validation("end", "must not precede start"));
            }
            Some(ScheduleWindow { start, end })
        }
        (None, None) => None,
        _ => {
            return Err(ApiError::validation(
                "start",
                "start and end must be supplied together",
            ))
        }
    };

    let technician = query.technician_id.map(UserId);
    let repo = SqlScheduleRepository::new(state.db_pool.clone());
    let events = repo.events(&company_id, window, technician.as_ref()).await?;
    Ok(envelope::ok(events))
}

async fn availability(Tenant(_company_id): Tenant) -> ApiError {
    ApiError::Unavailable("technician availability")
}

async fn conflicts(Tenant(_company_id): Tenant) -> ApiError {
    ApiError::Unavailable("schedule conflict detection")
}
