pub mod config;
pub mod conversion;
pub mod domain;
pub mod errors;
pub mod pricing;

pub use conversion::{materialize_job, JobConversionInput, JobDraft};
pub use domain::client::{Address, Client, ClientId};
pub use domain::company::{CompanyId, User, UserId};
pub use domain::job::{Job, JobId, JobPriority, JobStatus};
pub use domain::quote::{Quote, QuoteId, QuoteItem, QuoteItemId, QuoteStatus};
pub use errors::{DomainError, ValidationErrors};
pub use pricing::{price_items, LineItemInput, PricedLine, QuoteTotals};
