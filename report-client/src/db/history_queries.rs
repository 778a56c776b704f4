use anyhow::Result;
use sqlx::PgPool;

use crate::domain::{AnalysisResult, HistoryEntry};

const SCHEMA_SQL: &str = include_str!("../../../sql/schema/01_consumption_history.sql");

/// Create `consumption_history` if it does not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

/// Append one analysis summary. Id and timestamp are assigned by the database.
pub async fn insert_history_entry(
    pool: &PgPool,
    source_file_name: &str,
    analysis: &AnalysisResult,
) -> Result<HistoryEntry> {
    let row = sqlx::query_as::<_, HistoryEntry>(
        r#"
        INSERT INTO consumption_history (
            source_file_name,
            total_kwh,
            mean_kwh,
            max_kwh,
            min_kwh,
            top_consumer_name,
            potential_savings_kwh,
            potential_savings_currency
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING
            id,
            source_file_name,
            total_kwh,
            mean_kwh,
            max_kwh,
            min_kwh,
            top_consumer_name,
            potential_savings_kwh,
            potential_savings_currency,
            inserted_at
        "#,
    )
    .bind(source_file_name)
    .bind(analysis.total_kwh)
    .bind(analysis.mean_kwh)
    .bind(analysis.max_kwh)
    .bind(analysis.min_kwh)
    .bind(&analysis.top_consumer_name)
    .bind(analysis.potential_savings_kwh)
    .bind(analysis.potential_savings_currency)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Every stored analysis, oldest first.
pub async fn fetch_history(pool: &PgPool) -> Result<Vec<HistoryEntry>> {
    let rows = sqlx::query_as::<_, HistoryEntry>(
        r#"
        SELECT
            id,
            source_file_name,
            total_kwh,
            mean_kwh,
            max_kwh,
            min_kwh,
            top_consumer_name,
            potential_savings_kwh,
            potential_savings_currency,
            inserted_at
        FROM consumption_history
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
