use std::{sync::Arc, time::Duration};

use report_client::{
    db,
    domain::{AnalysisResult, HistoryEntry},
};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::{
    config::{HistoryConfig, HistoryStoreKind},
    pipeline::PipelineError,
};

/// Append-only store of past analyses.
///
/// `fetch_all` returns entries in insertion order and an empty vector, not an
/// error, when nothing has been stored.
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(
        &self,
        source_file_name: &str,
        analysis: &AnalysisResult,
    ) -> Result<HistoryEntry, PipelineError>;

    async fn fetch_all(&self) -> Result<Vec<HistoryEntry>, PipelineError>;
}

/// Build the configured store, or `None` when history is disabled.
pub async fn connect_store(
    cfg: &HistoryConfig,
) -> Result<Option<Arc<dyn HistoryStore>>, PipelineError> {
    if !cfg.enabled {
        return Ok(None);
    }

    let store: Arc<dyn HistoryStore> = match cfg.kind {
        HistoryStoreKind::Memory => Arc::new(MemoryHistoryStore::default()),
        HistoryStoreKind::Postgres => {
            let store = PgHistoryStore::connect_lazy(cfg);
            if cfg.ensure_schema {
                // An unreachable database must not keep the service from starting.
                if let Err(e) = store.ensure_schema().await {
                    tracing::warn!(error = %e, "could not ensure history schema");
                }
            }
            Arc::new(store)
        }
    };

    Ok(Some(store))
}

pub struct PgHistoryStore {
    pool: PgPool,
    max_retries: u32,
    retry_backoff: Duration,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool, max_retries: u32, retry_backoff: Duration) -> Self {
        Self {
            pool,
            max_retries,
            retry_backoff,
        }
    }

    /// Pool connections are opened on first use, so startup never blocks on the database.
    pub fn connect_lazy(cfg: &HistoryConfig) -> Self {
        let mut options = PgConnectOptions::new()
            .host(&cfg.host)
            .port(cfg.port)
            .database(&cfg.database)
            .username(&cfg.username)
            .ssl_mode(if cfg.encrypt {
                PgSslMode::Require
            } else {
                PgSslMode::Prefer
            });
        if let Some(password) = &cfg.password {
            options = options.password(password);
        }

        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .connect_lazy_with(options);

        Self::new(
            pool,
            cfg.max_retries,
            Duration::from_millis(cfg.retry_backoff_ms),
        )
    }

    pub async fn ensure_schema(&self) -> Result<(), PipelineError> {
        db::ensure_schema(&self.pool)
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))
    }
}

#[async_trait::async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append(
        &self,
        source_file_name: &str,
        analysis: &AnalysisResult,
    ) -> Result<HistoryEntry, PipelineError> {
        let mut attempt: u32 = 0;
        loop {
            match db::insert_history_entry(&self.pool, source_file_name, analysis).await {
                Ok(entry) => return Ok(entry),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        "history insert failed, retrying with backoff"
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "history insert failed, giving up");
                    return Err(PipelineError::Persistence(e.to_string()));
                }
            }
        }
    }

    async fn fetch_all(&self) -> Result<Vec<HistoryEntry>, PipelineError> {
        db::fetch_history(&self.pool)
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))
    }
}

/// In-process store; ids start at 1 and follow insertion order.
#[derive(Default)]
pub struct MemoryHistoryStore {
    entries: Mutex<Vec<HistoryEntry>>,
}

#[async_trait::async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(
        &self,
        source_file_name: &str,
        analysis: &AnalysisResult,
    ) -> Result<HistoryEntry, PipelineError> {
        let mut entries = self.entries.lock().await;
        let entry = HistoryEntry {
            id: entries.len() as i64 + 1,
            source_file_name: source_file_name.to_string(),
            total_kwh: analysis.total_kwh,
            mean_kwh: analysis.mean_kwh,
            max_kwh: analysis.max_kwh,
            min_kwh: analysis.min_kwh,
            top_consumer_name: analysis.top_consumer_name.clone(),
            potential_savings_kwh: analysis.potential_savings_kwh,
            potential_savings_currency: analysis.potential_savings_currency,
            inserted_at: OffsetDateTime::now_utc(),
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn fetch_all(&self) -> Result<Vec<HistoryEntry>, PipelineError> {
        Ok(self.entries.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(top: &str, total: i64) -> AnalysisResult {
        AnalysisResult {
            total_kwh: total,
            mean_kwh: total as f64 / 2.0,
            max_kwh: total,
            min_kwh: 0,
            top_consumer_name: top.to_string(),
            potential_savings_kwh: total as f64 * 0.1,
            potential_savings_currency: 0.0,
            suggestions: vec![],
        }
    }

    #[tokio::test]
    async fn empty_store_returns_empty_history() {
        let store = MemoryHistoryStore::default();
        assert!(store.fetch_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn entries_come_back_in_insertion_order() {
        let store = MemoryHistoryStore::default();
        let first = store.append("jan.csv", &analysis("Store", 100)).await.unwrap();
        let second = store.append("feb.csv", &analysis("School", 200)).await.unwrap();

        assert_eq!((first.id, second.id), (1, 2));
        let all = store.fetch_all().await.unwrap();
        assert_eq!(all, vec![first, second]);
        assert_eq!(all[1].source_file_name, "feb.csv");
        assert_eq!(all[1].top_consumer_name, "School");
        assert_eq!(all[1].total_kwh, 200);
    }

    #[tokio::test]
    async fn disabled_history_has_no_store() {
        let store = connect_store(&HistoryConfig::default()).await.unwrap();
        assert!(store.is_none());
    }

    #[tokio::test]
    async fn memory_kind_builds_memory_store() {
        let cfg = HistoryConfig {
            enabled: true,
            kind: HistoryStoreKind::Memory,
            ..HistoryConfig::default()
        };
        let store = connect_store(&cfg).await.unwrap().unwrap();
        assert!(store.fetch_all().await.unwrap().is_empty());
    }
}
