use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HistoryEntry {
    pub id: i64,
    pub source_file_name: String,
    pub total_kwh: i64,
    pub mean_kwh: f64,
    pub max_kwh: i64,
    pub min_kwh: i64,
    pub top_consumer_name: String,
    pub potential_savings_kwh: f64,
    pub potential_savings_currency: f64,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub inserted_at: OffsetDateTime,
}
