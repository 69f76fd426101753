use async_trait::async_trait;
use sqlx::PgPool;

use farmchain_core::{Role, TradeError, User, UserDirectory};

use crate::database::storage_error;

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    settlement_address: String,
    role: String,
}

fn parse_role(raw: &str) -> Result<Role, TradeError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| TradeError::Storage(format!("unknown role '{}'", raw)))
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn get_user(&self, id: &str) -> Result<Option<User>, TradeError> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, settlement_address, role FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;

        match row {
            Some(row) => Ok(Some(User {
                role: parse_role(&row.role)?,
                id: row.id,
                settlement_address: row.settlement_address,
            })),
            None => Ok(None),
        }
    }
}
