use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use fieldops_core::domain::client::{Address, Client, ClientId};
use fieldops_core::domain::company::CompanyId;

use super::{timestamp_column, RepositoryError};
use crate::DbPool;

pub struct SqlClientRepository {
    pool: DbPool,
}

impl SqlClientRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find(
        &self,
        company_id: &CompanyId,
        id: &ClientId,
    ) -> Result<Option<Client>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, company_id, name, email, phone, address, created_at, updated_at
             FROM client WHERE id = ? AND company_id = ?",
        )
        .bind(&id.0)
        .bind(&company_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| decode_client_row(&row)).transpose()
    }
}

fn decode_client_row(row: &SqliteRow) -> Result<Client, RepositoryError> {
    let address_raw: Option<String> = row.try_get("address")?;
    let address = address_raw
        .map(|raw| {
            serde_json::from_str::<Address>(&raw).map_err(|_| {
                RepositoryError::Decode(format!("client address is not valid JSON: `{raw}`"))
            })
        })
        .transpose()?;

    Ok(Client {
        id: ClientId(row.try_get("id")?),
        company_id: CompanyId(row.try_get("company_id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        address,
        created_at: timestamp_column(row, "created_at")?,
        updated_at: timestamp_column(row, "updated_at")?,
    })
}
