/// Aggregate statistics and savings suggestions for one uploaded table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AnalysisResult {
    pub total_kwh: i64,
    pub mean_kwh: f64,
    pub max_kwh: i64,
    pub min_kwh: i64,
    pub top_consumer_name: String,
    pub potential_savings_kwh: f64,
    pub potential_savings_currency: f64,
    pub suggestions: Vec<String>,
}
