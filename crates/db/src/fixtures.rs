//! Deterministic demo fixtures for local development and end-to-end
//! checks. The dataset covers both tenants, every quote lifecycle state,
//! one quote-to-job conversion, an inbox, and schedule entries.

use sqlx::Executor;

use crate::repositories::RepositoryError;
use crate::DbPool;

/// Expected row counts per table, used to verify a loaded dataset.
const SEED_CONTRACT: &[(&str, i64)] = &[
    ("company", 2),
    ("client", 3),
    ("users", 3),
    ("quote", 5),
    ("quote_item", 7),
    ("job", 1),
    ("conversation", 2),
    ("message", 3),
    ("schedule_event", 2),
];

pub struct DemoSeedDataset;

#[derive(Clone, Debug)]
pub struct SeedResult {
    pub tables_seeded: Vec<&'static str>,
}

#[derive(Clone, Debug)]
pub struct SeedVerification {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

impl DemoSeedDataset {
    /// SQL fixture content for the demo dataset.
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Load the demo dataset in one transaction.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            tables_seeded: SEED_CONTRACT.iter().map(|(table, _)| *table).collect(),
        })
    }

    /// Verify that every table holds the row count the fixture promises.
    pub async fn verify(pool: &DbPool) -> Result<SeedVerification, RepositoryError> {
        let mut checks = Vec::with_capacity(SEED_CONTRACT.len());

        for (table, expected) in SEED_CONTRACT {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(pool)
                .await?;
            checks.push((*table, count == *expected));
        }

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(SeedVerification { all_present, checks })
    }
}
