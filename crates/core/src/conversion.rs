//! Materialization of a Job from an accepted Quote.
//!
//! The guards and derivations live here as a pure function; the repository
//! layer supplies the quote, the client address, and the clock, and
//! persists the resulting draft inside its own transaction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::client::Address;
use crate::domain::company::UserId;
use crate::domain::job::{JobPriority, JobStatus};
use crate::domain::quote::{Quote, QuoteStatus};
use crate::errors::{DomainError, ValidationErrors};

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct JobConversionInput {
    pub scheduled_date: Option<NaiveDate>,
    pub assigned_technician: Option<UserId>,
    pub priority: Option<JobPriority>,
    pub estimated_duration: Option<Decimal>,
    pub location: Option<Address>,
    pub notes: Option<String>,
}

/// Everything needed to insert the job row, minus the identifiers the
/// repository mints at write time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JobDraft {
    pub title: String,
    pub description: String,
    pub status: JobStatus,
    pub priority: JobPriority,
    pub estimated_duration: Option<Decimal>,
    pub assigned_technician: Option<UserId>,
    pub scheduled_date: NaiveDate,
    pub location: Address,
    pub notes: Option<String>,
}

pub fn materialize_job(
    quote: &Quote,
    client_address: Option<&Address>,
    input: JobConversionInput,
    today: NaiveDate,
) -> Result<JobDraft, DomainError> {
    if quote.status != QuoteStatus::Accepted {
        return Err(DomainError::conflict("only accepted quotes can be converted to jobs"));
    }

    let mut errors = ValidationErrors::new();
    let scheduled_date = match input.scheduled_date {
        Some(date) if date > today => Some(date),
        Some(_) => {
            errors.add("scheduled_date", "must be a date after today");
            None
        }
        None => {
            errors.add("scheduled_date", "is required");
            None
        }
    };
    if let Some(duration) = input.estimated_duration {
        if duration < Decimal::ZERO {
            errors.add("estimated_duration", "must not be negative");
        }
    }
    errors.into_result()?;

    let location = input
        .location
        .or_else(|| client_address.cloned())
        .unwrap_or_default();

    Ok(JobDraft {
        title: format!("Job from Quote #{}", quote.id.short()),
        description: quote
            .notes
            .clone()
            .filter(|notes| !notes.trim().is_empty())
            .unwrap_or_else(|| "Job created from accepted quote".to_string()),
        status: JobStatus::Scheduled,
        priority: input.priority.unwrap_or_default(),
        estimated_duration: input.estimated_duration,
        assigned_technician: input.assigned_technician,
        scheduled_date: scheduled_date.unwrap_or(today),
        location,
        notes: input.notes,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use crate::domain::client::{Address, ClientId};
    use crate::domain::company::CompanyId;
    use crate::domain::job::{JobPriority, JobStatus};
    use crate::domain::quote::{Quote, QuoteId, QuoteStatus};
    use crate::errors::DomainError;

    use super::{materialize_job, JobConversionInput};

    fn accepted_quote() -> Quote {
        Quote {
            id: QuoteId("9f8e7d6c-0000-0000-0000-000000000000".to_string()),
            company_id: CompanyId("co-1".to_string()),
            client_id: ClientId("cl-1".to_string()),
            subtotal: Decimal::new(10000, 2),
            tax_amount: Decimal::new(2100, 2),
            total: Decimal::new(12100, 2),
            profit_margin: Decimal::ZERO,
            status: QuoteStatus::Accepted,
            valid_until: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            notes: Some("Replace boiler and flush radiators".to_string()),
            items: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2029, 12, 1).unwrap()
    }

    fn tomorrow() -> NaiveDate {
        NaiveDate::from_ymd_opt(2029, 12, 2).unwrap()
    }

    #[test]
    fn derives_title_description_and_defaults() {
        let draft = materialize_job(
            &accepted_quote(),
            None,
            JobConversionInput { scheduled_date: Some(tomorrow()), ..Default::default() },
            today(),
        )
        .expect("conversion");

        assert_eq!(draft.title, "Job from Quote #9f8e7d6c");
        assert_eq!(draft.description, "Replace boiler and flush radiators");
        assert_eq!(draft.status, JobStatus::Scheduled);
        assert_eq!(draft.priority, JobPriority::Medium);
        assert!(draft.location.is_empty());
    }

    #[test]
    fn falls_back_to_generic_description_without_notes() {
        let mut quote = accepted_quote();
        quote.notes = None;
        let draft = materialize_job(
            &quote,
            None,
            JobConversionInput { scheduled_date: Some(tomorrow()), ..Default::default() },
            today(),
        )
        .expect("conversion");
        assert_eq!(draft.description, "Job created from accepted quote");
    }

    #[test]
    fn location_defaults_to_client_address() {
        let client_address =
            Address { city: Some("Utrecht".to_string()), ..Address::default() };
        let draft = materialize_job(
            &accepted_quote(),
            Some(&client_address),
            JobConversionInput { scheduled_date: Some(tomorrow()), ..Default::default() },
            today(),
        )
        .expect("conversion");
        assert_eq!(draft.location, client_address);
    }

    #[test]
    fn explicit_location_wins_over_client_address() {
        let client_address =
            Address { city: Some("Utrecht".to_string()), ..Address::default() };
        let explicit = Address { city: Some("Leiden".to_string()), ..Address::default() };
        let draft = materialize_job(
            &accepted_quote(),
            Some(&client_address),
            JobConversionInput {
                scheduled_date: Some(tomorrow()),
                location: Some(explicit.clone()),
                ..Default::default()
            },
            today(),
        )
        .expect("conversion");
        assert_eq!(draft.location, explicit);
    }

    #[test]
    fn rejects_non_accepted_quotes() {
        for status in [QuoteStatus::Draft, QuoteStatus::Sent, QuoteStatus::Rejected] {
            let mut quote = accepted_quote();
            quote.status = status;
            let error = materialize_job(
                &quote,
                None,
                JobConversionInput { scheduled_date: Some(tomorrow()), ..Default::default() },
                today(),
            )
            .expect_err("non-accepted quote");
            assert!(matches!(error, DomainError::Conflict(_)));
        }
    }

    #[test]
    fn rejects_past_and_same_day_schedules() {
        for date in [today(), NaiveDate::from_ymd_opt(2029, 11, 30).unwrap()] {
            let error = materialize_job(
                &accepted_quote(),
                None,
                JobConversionInput { scheduled_date: Some(date), ..Default::default() },
                today(),
            )
            .expect_err("stale schedule");
            assert!(matches!(error, DomainError::Validation(_)));
        }
    }
}
