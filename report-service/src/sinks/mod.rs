pub mod chart;
pub mod history;
pub mod report_pdf;
pub mod spreadsheet;

pub use chart::ChartRenderer;
pub use history::{connect_store, HistoryStore, MemoryHistoryStore, PgHistoryStore};
pub use report_pdf::ReportRenderer;
pub use spreadsheet::SpreadsheetExporter;
