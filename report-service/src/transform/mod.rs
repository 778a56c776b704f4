use report_client::domain::{AnalysisResult, ConsumptionTable};

use crate::pipeline::PipelineError;

/// Reduction target applied to the largest consumer.
pub const SAVINGS_TARGET_RATIO: f64 = 0.10;

/// Pure aggregation over a consumption table.
///
/// Rules:
/// - totals, max and min are truncated toward zero; the mean is not.
/// - the top consumer is the first row (input order) holding the maximum.
/// - currency savings are zero unless the cost per kWh is positive.
#[derive(Debug, Clone)]
pub struct ConsumptionAnalyzer {
    currency_symbol: String,
}

impl Default for ConsumptionAnalyzer {
    fn default() -> Self {
        Self::new("$")
    }
}

impl ConsumptionAnalyzer {
    pub fn new(currency_symbol: impl Into<String>) -> Self {
        Self {
            currency_symbol: currency_symbol.into(),
        }
    }

    pub fn analyze(
        &self,
        table: &ConsumptionTable,
        cost_per_kwh: f64,
    ) -> Result<AnalysisResult, PipelineError> {
        let records = table.records();
        let first = records.first().ok_or(PipelineError::EmptyTable)?;

        let mut top = first;
        let mut min = first.consumption_kwh;
        let mut sum = 0.0;
        for r in records {
            sum += r.consumption_kwh;
            // Strict comparison keeps the earliest row on ties.
            if r.consumption_kwh > top.consumption_kwh {
                top = r;
            }
            if r.consumption_kwh < min {
                min = r.consumption_kwh;
            }
        }

        let total_kwh = sum.trunc() as i64;
        let mean_kwh = sum / records.len() as f64;
        let max_kwh = top.consumption_kwh.trunc() as i64;
        let min_kwh = min.trunc() as i64;

        let potential_savings_kwh = max_kwh as f64 * SAVINGS_TARGET_RATIO;
        let potential_savings_currency = if cost_per_kwh > 0.0 {
            potential_savings_kwh * cost_per_kwh
        } else {
            0.0
        };

        let top_share_pct = if total_kwh == 0 {
            0.0
        } else {
            table.total_for(&top.name) / total_kwh as f64 * 100.0
        };

        let suggestions = vec![
            format!(
                "Reducing consumption at {} by 10% would save {:.2} kWh.",
                top.name, potential_savings_kwh
            ),
            format!(
                "That would save {}{:.2}, based on the informed cost per kWh.",
                self.currency_symbol, potential_savings_currency
            ),
            format!(
                "{} accounts for {:.2}% of total consumption.",
                top.name, top_share_pct
            ),
        ];

        Ok(AnalysisResult {
            total_kwh,
            mean_kwh,
            max_kwh,
            min_kwh,
            top_consumer_name: top.name.clone(),
            potential_savings_kwh,
            potential_savings_currency,
            suggestions,
        })
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use report_client::domain::ConsumptionRecord;

    fn table(rows: &[(String, u32)]) -> ConsumptionTable {
        ConsumptionTable::from_records(
            rows.iter()
                .map(|(name, kwh)| ConsumptionRecord {
                    name: name.clone(),
                    consumption_kwh: f64::from(*kwh),
                    date: None,
                })
                .collect(),
        )
    }

    proptest! {
        #[test]
        fn totals_and_extremes_match_the_rows(
            rows in prop::collection::vec(("[A-E]", 0u32..100_000), 1..50),
            cost in 0.0f64..5.0,
        ) {
            let res = ConsumptionAnalyzer::default().analyze(&table(&rows), cost).unwrap();

            let sum: i64 = rows.iter().map(|(_, kwh)| i64::from(*kwh)).sum();
            let max = rows.iter().map(|(_, kwh)| i64::from(*kwh)).max().unwrap();
            let min = rows.iter().map(|(_, kwh)| i64::from(*kwh)).min().unwrap();

            prop_assert_eq!(res.total_kwh, sum);
            prop_assert_eq!(res.max_kwh, max);
            prop_assert_eq!(res.min_kwh, min);
            prop_assert!((res.mean_kwh - sum as f64 / rows.len() as f64).abs() < 1e-6);
            prop_assert!((res.potential_savings_kwh - max as f64 * SAVINGS_TARGET_RATIO).abs() < 1e-9);
            prop_assert_eq!(res.suggestions.len(), 3);
        }

        #[test]
        fn top_consumer_is_first_row_at_the_maximum(
            rows in prop::collection::vec(("[A-Z]{1,3}", 0u32..20), 1..50),
        ) {
            let res = ConsumptionAnalyzer::default().analyze(&table(&rows), 0.0).unwrap();

            let max = rows.iter().map(|(_, kwh)| *kwh).max().unwrap();
            let first = rows.iter().find(|(_, kwh)| *kwh == max).unwrap();
            prop_assert_eq!(&res.top_consumer_name, &first.0);
        }
    }
}
