use std::io::Write;

use csv::StringRecord;
use rand::Rng;
use report_client::domain::{ConsumptionRecord, ConsumptionTable};
use time::{Date, Duration};

use crate::{config::AnalysisConfig, pipeline::PipelineError};

/// CSV ingestion for consumption tables.
///
/// Expected header columns (labels come from [`AnalysisConfig`]):
/// - name
/// - consumptionKwh (numeric)
/// - date (optional, passed through unparsed)
///
/// Any other column is kept verbatim so it reaches the spreadsheet export.
#[derive(Debug, Clone)]
pub struct ConsumptionCsvIngestor {
    name_column: String,
    consumption_column: String,
    date_column: String,
}

impl Default for ConsumptionCsvIngestor {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

fn parse_optional_string(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

/// Resolve the optional cost-per-kWh parameter. Absent means `0.0`.
pub fn validate_cost(cost_per_kwh: Option<f64>) -> Result<f64, PipelineError> {
    match cost_per_kwh {
        None => Ok(0.0),
        Some(c) if c.is_finite() && c >= 0.0 => Ok(c),
        Some(c) => Err(PipelineError::Validation(format!(
            "cost per kWh must be a non-negative number, got {c}"
        ))),
    }
}

impl ConsumptionCsvIngestor {
    pub fn new(cfg: &AnalysisConfig) -> Self {
        Self {
            name_column: cfg.name_column.clone(),
            consumption_column: cfg.consumption_column.clone(),
            date_column: cfg.date_column.clone(),
        }
    }

    /// Parse a whole CSV upload into a table, preserving row order.
    pub fn ingest(&self, bytes: &[u8]) -> Result<ConsumptionTable, PipelineError> {
        let mut rdr = csv::Reader::from_reader(bytes);
        let headers = rdr
            .headers()
            .map_err(|e| PipelineError::Parse(format!("failed to read CSV headers: {e}")))?
            .clone();

        if headers.is_empty() {
            return Err(PipelineError::Validation("input has no header row".to_string()));
        }

        let name_idx = column_index(&headers, &self.name_column);
        let kwh_idx = column_index(&headers, &self.consumption_column);
        let (name_idx, kwh_idx) = match (name_idx, kwh_idx) {
            (Some(n), Some(k)) => (n, k),
            _ => {
                return Err(PipelineError::Validation(format!(
                    "input must contain the columns '{}' and '{}'",
                    self.name_column, self.consumption_column
                )))
            }
        };
        let date_idx = column_index(&headers, &self.date_column);

        let mut table = ConsumptionTable::new(headers.iter().map(str::to_string).collect());

        for result in rdr.records() {
            let record = result
                .map_err(|e| PipelineError::Parse(format!("failed to read CSV record: {e}")))?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();

            // Column count is enforced by the reader, so these lookups cannot miss.
            let name = record.get(name_idx).unwrap_or_default().to_string();
            let kwh_str = record.get(kwh_idx).unwrap_or_default();
            let consumption_kwh: f64 = kwh_str.trim().parse().map_err(|e| {
                PipelineError::Parse(format!(
                    "line {line}: invalid {} '{kwh_str}': {e}",
                    self.consumption_column
                ))
            })?;
            if !consumption_kwh.is_finite() {
                return Err(PipelineError::Parse(format!(
                    "line {line}: {} must be finite, got '{kwh_str}'",
                    self.consumption_column
                )));
            }
            let date = date_idx
                .and_then(|idx| record.get(idx))
                .and_then(parse_optional_string);

            table.push_row(
                record.iter().map(str::to_string).collect(),
                ConsumptionRecord {
                    name,
                    consumption_kwh,
                    date,
                },
            );
        }

        metrics::counter!("consumption_rows_ingested_total").increment(table.len() as u64);
        Ok(table)
    }
}

/// Location names used for generated sample data.
pub const SAMPLE_LOCATIONS: [&str; 5] = ["Residence", "Store", "School", "Factory", "Regional Office"];

/// Write a random sample table: five records per location, 100..=2000 kWh,
/// dated within the 30 days before `today`.
pub fn write_sample_csv<W: Write, R: Rng>(
    writer: W,
    rng: &mut R,
    today: Date,
    cfg: &AnalysisConfig,
) -> anyhow::Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([&cfg.name_column, &cfg.consumption_column, &cfg.date_column])?;

    let mut rows = 0;
    for location in SAMPLE_LOCATIONS {
        for _ in 0..5 {
            let kwh: u32 = rng.gen_range(100..=2000);
            let date = today - Duration::days(rng.gen_range(0..=30));
            wtr.write_record([location.to_string(), kwh.to_string(), date.to_string()])?;
            rows += 1;
        }
    }

    wtr.flush()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use time::macros::date;

    #[test]
    fn ingest_preserves_order_and_extra_columns() {
        let csv = "name,consumptionKwh,date,meter\nA,100,2024-01-01,m-1\nB,300.5,,m-2\nA,50,2024-01-03,m-3\n";
        let table = ConsumptionCsvIngestor::default().ingest(csv.as_bytes()).unwrap();

        assert_eq!(table.columns(), ["name", "consumptionKwh", "date", "meter"]);
        assert_eq!(table.len(), 3);
        let names: Vec<_> = table.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "A"]);
        assert_eq!(table.records()[1].consumption_kwh, 300.5);
        assert_eq!(table.records()[0].date.as_deref(), Some("2024-01-01"));
        assert!(table.records()[1].date.is_none());
        assert_eq!(table.rows()[2], vec!["A", "50", "2024-01-03", "m-3"]);
    }

    #[test]
    fn ingest_rejects_missing_consumption_column() {
        let csv = "name,kwh\nA,100\n";
        let res = ConsumptionCsvIngestor::default().ingest(csv.as_bytes());
        assert!(matches!(res, Err(PipelineError::Validation(_))));
    }

    #[test]
    fn ingest_rejects_empty_input() {
        let res = ConsumptionCsvIngestor::default().ingest(b"");
        assert!(matches!(res, Err(PipelineError::Validation(_))));
    }

    #[test]
    fn ingest_rejects_non_numeric_consumption() {
        let csv = "name,consumptionKwh\nA,100\nB,lots\n";
        let res = ConsumptionCsvIngestor::default().ingest(csv.as_bytes());
        match res {
            Err(PipelineError::Parse(msg)) => assert!(msg.contains("lots")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn ingest_rejects_nan_consumption() {
        let csv = "name,consumptionKwh\nA,NaN\n";
        let res = ConsumptionCsvIngestor::default().ingest(csv.as_bytes());
        assert!(matches!(res, Err(PipelineError::Parse(_))));
    }

    #[test]
    fn ingest_rejects_ragged_rows() {
        let csv = "name,consumptionKwh\nA,100,extra\n";
        let res = ConsumptionCsvIngestor::default().ingest(csv.as_bytes());
        assert!(matches!(res, Err(PipelineError::Parse(_))));
    }

    #[test]
    fn ingest_header_only_yields_empty_table() {
        let table = ConsumptionCsvIngestor::default()
            .ingest(b"name,consumptionKwh\n")
            .unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn ingest_uses_configured_labels() {
        let cfg = AnalysisConfig {
            name_column: "Nome".to_string(),
            consumption_column: "Consumo (kWh)".to_string(),
            date_column: "Data".to_string(),
            ..AnalysisConfig::default()
        };
        let csv = "Nome,Consumo (kWh),Data\nLoja,1200,2024-05-02\n";
        let table = ConsumptionCsvIngestor::new(&cfg).ingest(csv.as_bytes()).unwrap();

        assert_eq!(table.records()[0].name, "Loja");
        assert_eq!(table.records()[0].consumption_kwh, 1200.0);
        assert_eq!(table.records()[0].date.as_deref(), Some("2024-05-02"));
    }

    #[test]
    fn cost_defaults_to_zero_and_rejects_negative() {
        assert_eq!(validate_cost(None).unwrap(), 0.0);
        assert_eq!(validate_cost(Some(0.75)).unwrap(), 0.75);
        assert!(matches!(validate_cost(Some(-1.0)), Err(PipelineError::Validation(_))));
        assert!(matches!(validate_cost(Some(f64::NAN)), Err(PipelineError::Validation(_))));
    }

    #[test]
    fn sample_csv_is_ingestible() {
        let mut rng = StdRng::seed_from_u64(7);
        let today = date!(2024 - 06 - 30);
        let mut buf = Vec::new();
        let rows = write_sample_csv(&mut buf, &mut rng, today, &AnalysisConfig::default()).unwrap();
        assert_eq!(rows, 25);

        let table = ConsumptionCsvIngestor::default().ingest(&buf).unwrap();
        assert_eq!(table.len(), 25);
        assert_eq!(table.records()[0].name, "Residence");
        assert_eq!(table.records()[24].name, "Regional Office");
        for r in table.records() {
            assert!((100.0..=2000.0).contains(&r.consumption_kwh));
            let d = r.date.as_deref().unwrap();
            assert!(d >= "2024-05-31" && d <= "2024-06-30", "unexpected date {d}");
        }
    }
}
