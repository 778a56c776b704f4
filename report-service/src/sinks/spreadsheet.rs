use std::path::Path;

use report_client::domain::ConsumptionTable;
use rust_xlsxwriter::{Workbook, XlsxError};

use crate::{config::AnalysisConfig, pipeline::PipelineError};

pub const SHEET_NAME: &str = "Consumption";

/// Writes the uploaded table, unmodified, to an `.xlsx` workbook.
///
/// Header first, then rows in input order; no index column. Only the
/// consumption column is stored as numbers, and only where the number reads
/// back as the exact same text. Every other cell is a string, so ids and
/// numeric-looking names survive a round trip. Blanks are left empty.
#[derive(Debug, Clone)]
pub struct SpreadsheetExporter {
    numeric_column: String,
}

impl Default for SpreadsheetExporter {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl SpreadsheetExporter {
    pub fn new(cfg: &AnalysisConfig) -> Self {
        Self {
            numeric_column: cfg.consumption_column.clone(),
        }
    }

    pub fn export(&self, table: &ConsumptionTable, output: &Path) -> Result<(), PipelineError> {
        self.write_workbook(table, output).map_err(|e| {
            PipelineError::Render(format!(
                "failed to write spreadsheet {}: {e}",
                output.display()
            ))
        })?;

        tracing::debug!(path = %output.display(), rows = table.len(), "spreadsheet written");
        Ok(())
    }

    fn write_workbook(&self, table: &ConsumptionTable, output: &Path) -> Result<(), XlsxError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;

        let numeric_col = table
            .columns()
            .iter()
            .position(|c| c.trim() == self.numeric_column);

        for (col, header) in table.columns().iter().enumerate() {
            sheet.write_string(0, col_num(col)?, header.as_str())?;
        }

        for (idx, cells) in table.rows().iter().enumerate() {
            let row = row_num(idx + 1)?;
            for (col_idx, cell) in cells.iter().enumerate() {
                let col = col_num(col_idx)?;
                if cell.is_empty() {
                    continue;
                }
                match exact_number(cell).filter(|_| Some(col_idx) == numeric_col) {
                    Some(n) => sheet.write_number(row, col, n)?,
                    None => sheet.write_string(row, col, cell.as_str())?,
                };
            }
        }

        workbook.save(output)
    }
}

/// The cell as a number, if formatting that number gives back the same text.
fn exact_number(cell: &str) -> Option<f64> {
    let n = cell.parse::<f64>().ok().filter(|n| n.is_finite())?;
    (n.to_string() == cell).then_some(n)
}

fn row_num(idx: usize) -> Result<u32, XlsxError> {
    u32::try_from(idx).map_err(|_| XlsxError::RowColumnLimitError)
}

fn col_num(idx: usize) -> Result<u16, XlsxError> {
    u16::try_from(idx).map_err(|_| XlsxError::RowColumnLimitError)
}
