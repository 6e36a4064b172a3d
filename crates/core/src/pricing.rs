//! Monetary computation for quote line items.
//!
//! Everything is computed in `rust_decimal::Decimal`; stored amounts carry
//! two fractional digits. Each line is rounded to two digits before the
//! quote-level sums, so the persisted `line_total` values always add up to
//! the persisted `subtotal` exactly.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, ValidationErrors};

pub const MAX_DESCRIPTION_LEN: usize = 255;
pub const MAX_TAX_RATE: Decimal = Decimal::ONE_HUNDRED;

/// Raw line input as received from the API, before validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItemInput {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
}

/// A validated line with its derived total. `line_total` excludes tax;
/// tax is aggregated at the quote level only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricedLine {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub line_total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub lines: Vec<PricedLine>,
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Check every line against the input constraints, reporting all failures
/// keyed by `items.N.field`.
pub fn validate_items(items: &[LineItemInput]) -> Result<(), DomainError> {
    let mut errors = ValidationErrors::new();

    if items.is_empty() {
        errors.add("items", "at least one item is required");
    }

    for (index, item) in items.iter().enumerate() {
        let description = item.description.trim();
        if description.is_empty() {
            errors.add(format!("items.{index}.description"), "must not be empty");
        } else if description.chars().count() > MAX_DESCRIPTION_LEN {
            errors.add(
                format!("items.{index}.description"),
                format!("must not exceed {MAX_DESCRIPTION_LEN} characters"),
            );
        }

        if item.quantity <= Decimal::ZERO {
            errors.add(format!("items.{index}.quantity"), "must be greater than zero");
        }

        if item.unit_price < Decimal::ZERO {
            errors.add(format!("items.{index}.unit_price"), "must not be negative");
        }

        if let Some(tax_rate) = item.tax_rate {
            if tax_rate < Decimal::ZERO || tax_rate > MAX_TAX_RATE {
                errors.add(format!("items.{index}.tax_rate"), "must be between 0 and 100");
            }
        }
    }

    errors.into_result()
}

/// Validate and price a set of line items. No partial result is ever
/// produced: the computation either returns the full totals or the
/// complete list of offending fields.
pub fn price_items(items: &[LineItemInput]) -> Result<QuoteTotals, DomainError> {
    validate_items(items)?;

    let mut subtotal = Decimal::ZERO;
    let mut tax_amount = Decimal::ZERO;
    let mut lines = Vec::with_capacity(items.len());

    for item in items {
        let tax_rate = item.tax_rate.unwrap_or(Decimal::ZERO);
        let line_total = round2(item.quantity * item.unit_price);
        let line_tax = round2(line_total * tax_rate / Decimal::ONE_HUNDRED);

        subtotal += line_total;
        tax_amount += line_tax;

        lines.push(PricedLine {
            description: item.description.trim().to_string(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            tax_rate,
            line_total,
        });
    }

    Ok(QuoteTotals { subtotal, tax_amount, total: subtotal + tax_amount, lines })
}
