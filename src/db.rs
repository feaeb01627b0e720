//! Database module
//!
//! Connectivity and schema checks plus small sqlx helpers.
//! The schema itself lives in `migrations/`.

use std::fmt::Display;

use sqlx::PgPool;

const REQUIRED_TABLES: &[&str] = &[
    "accounts",
    "account_logs",
    "envelopes",
    "envelope_claims",
    "distributed_locks",
];

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Check that the tables exist and the system holding account is seeded
pub async fn check_schema(pool: &PgPool, system_account_no: &str) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    let system_exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE account_no = $1)")
            .bind(system_account_no)
            .fetch_one(pool)
            .await?;

    if !system_exists {
        tracing::error!(
            "System account '{}' does not exist. Please run database seed.",
            system_account_no
        );
        return Ok(false);
    }

    tracing::info!(system_account_no, "Schema and system account verified");
    Ok(true)
}

/// Decode failure for a column holding a value outside its enum
pub(crate) fn decode_error(column: &str, value: impl Display) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("unexpected value {}", value).into(),
    }
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_names_column() {
        let err = decode_error("change_type", 42);
        let message = err.to_string();
        assert!(message.contains("change_type"));
        assert!(message.contains("42"));
    }

    #[test]
    fn test_non_database_error_is_not_unique_violation() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
