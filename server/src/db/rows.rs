//! Database operations for the table_rows table.
//!
//! Payloads are stored in the engine's typed encoding of [`Record`], so
//! timestamps and binaries read back exactly as they were planned.

use crate::tables::Table;
use sluice_engine::{MutationType, Plan, Record};
use sqlx::{PgPool, Postgres, Row, Transaction};

/// An open row read back from storage.
#[derive(Debug)]
pub struct StoredRow {
    pub row_key: serde_json::Value,
    pub payload: serde_json::Value,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredRow {
            row_key: row.try_get("row_key")?,
            payload: row.try_get("payload")?,
        })
    }
}

impl StoredRow {
    /// Decode the stored payload into a record.
    pub fn to_record(&self) -> Result<Record, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Fetch the open rows of a table matching any of the given keys.
pub async fn fetch_open_rows(
    pool: &PgPool,
    table_name: &str,
    row_keys: &[serde_json::Value],
) -> Result<Vec<StoredRow>, sqlx::Error> {
    sqlx::query_as::<_, StoredRow>(
        r#"
        SELECT row_key, payload
        FROM table_rows
        WHERE table_name = $1 AND is_open AND row_key = ANY($2)
        "#,
    )
    .bind(table_name)
    .bind(row_keys)
    .fetch_all(pool)
    .await
}

/// Apply a plan to a table in one transaction.
///
/// INSERT writes new rows. UPDATE rewrites the open row for each key, and
/// DELETE removes it. Returns the number of rows written or removed.
pub async fn apply_plan(pool: &PgPool, table: &Table, plan: &Plan) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut affected = 0u64;

    for mutation in plan {
        for record in mutation.records() {
            affected += match mutation.kind() {
                MutationType::Insert => insert_row(&mut tx, table, record).await?,
                MutationType::Update => update_open_row(&mut tx, table, record).await?,
                MutationType::Delete => delete_open_row(&mut tx, table, record).await?,
            };
        }
    }

    tx.commit().await?;
    Ok(affected)
}

async fn insert_row(
    tx: &mut Transaction<'_, Postgres>,
    table: &Table,
    record: &Record,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO table_rows (table_name, row_key, payload, is_open)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(table.name())
    .bind(table.row_key(record))
    .bind(payload(record)?)
    .bind(table.is_open(record))
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

async fn update_open_row(
    tx: &mut Transaction<'_, Postgres>,
    table: &Table,
    record: &Record,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE table_rows
        SET payload = $3, is_open = $4, written_at = NOW()
        WHERE table_name = $1 AND row_key = $2 AND is_open
        "#,
    )
    .bind(table.name())
    .bind(table.row_key(record))
    .bind(payload(record)?)
    .bind(table.is_open(record))
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

async fn delete_open_row(
    tx: &mut Transaction<'_, Postgres>,
    table: &Table,
    record: &Record,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM table_rows
        WHERE table_name = $1 AND row_key = $2 AND is_open
        "#,
    )
    .bind(table.name())
    .bind(table.row_key(record))
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

fn payload(record: &Record) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(record).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}
