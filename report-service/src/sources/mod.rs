pub mod consumption_csv;
pub mod http_upload;

pub use consumption_csv::ConsumptionCsvIngestor;
pub use http_upload::{router, serve};
