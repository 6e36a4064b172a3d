//! Tenant resolution for authenticated callers.
//!
//! Authentication itself happens upstream: the gateway verifies the JWT
//! and installs the caller's company id as `X-Company-Id`. Handlers take
//! the tenant as an extractor argument, so no query can forget scoping.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use fieldops_core::domain::company::CompanyId;

use crate::envelope::ApiError;

pub const TENANT_HEADER: &str = "x-company-id";

#[derive(Clone, Debug)]
pub struct Tenant(pub CompanyId);

impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        match value {
            Some(company_id) => Ok(Self(CompanyId(company_id.to_string()))),
            None => Err(ApiError::validation(
                TENANT_HEADER,
                "tenant context header is required",
            )),
        }
    }
}
