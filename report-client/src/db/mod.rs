pub mod history_queries;

pub use history_queries::{ensure_schema, fetch_history, insert_history_entry};
