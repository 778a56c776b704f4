pub mod analysis;
pub mod consumption;
pub mod history_entry;

pub use analysis::AnalysisResult;
pub use consumption::{ConsumptionRecord, ConsumptionTable};
pub use history_entry::HistoryEntry;
