use fieldops_core::domain::company::{CompanyId, User, UserId};
use sqlx::Row;

use super::RepositoryError;
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find(
        &self,
        company_id: &CompanyId,
        id: &UserId,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, company_id, name, email, role
             FROM users WHERE id = ? AND company_id = ?",
        )
        .bind(&id.0)
        .bind(&company_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(User {
                id: UserId(row.try_get("id")?),
                company_id: CompanyId(row.try_get("company_id")?),
                name: row.try_get("name")?,
                email: row.try_get("email")?,
                role: row.try_get("role")?,
            })
        })
        .transpose()
    }
}
