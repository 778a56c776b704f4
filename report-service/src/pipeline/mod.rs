use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use report_client::domain::{AnalysisResult, ConsumptionTable, HistoryEntry};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    sinks::{ChartRenderer, HistoryStore, ReportRenderer, SpreadsheetExporter},
    sources::consumption_csv::{validate_cost, ConsumptionCsvIngestor},
    transform::ConsumptionAnalyzer,
};

pub mod artifacts;

pub use artifacts::{prune_expired, spawn_pruner, ArtifactKind, ArtifactNamespace, ReportArtifacts};

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("table has no rows")]
    EmptyTable,
    #[error("render error: {0}")]
    Render(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl PipelineError {
    /// Stable label for responses and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Parse(_) => "parse",
            Self::EmptyTable => "empty_table",
            Self::Render(_) => "render",
            Self::NotFound(_) => "not_found",
            Self::Persistence(_) => "persistence",
        }
    }
}

/// One uploaded table and its request parameters.
#[derive(Debug, Clone)]
pub struct Upload {
    pub source_file_name: String,
    pub bytes: Vec<u8>,
    pub cost_per_kwh: Option<f64>,
}

/// Whether the history store received this analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistenceStatus {
    Persisted { id: i64 },
    /// The store rejected or could not be reached; history is incomplete.
    Skipped { reason: String },
    Disabled,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub request_id: Uuid,
    pub source_file_name: String,
    pub analysis: AnalysisResult,
    pub artifacts: ReportArtifacts,
    pub persistence: PersistenceStatus,
}

/// Result of the blocking stage: analysis plus the files written for it.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub request_id: Uuid,
    pub analysis: AnalysisResult,
    pub artifacts: ReportArtifacts,
}

/// Ingest → analyze → {chart, spreadsheet} → document, then best-effort history.
pub struct ReportPipeline {
    ingestor: ConsumptionCsvIngestor,
    analyzer: ConsumptionAnalyzer,
    chart: ChartRenderer,
    spreadsheet: SpreadsheetExporter,
    report: Option<ReportRenderer>,
    history: Option<Arc<dyn HistoryStore>>,
    artifacts_root: PathBuf,
}

impl ReportPipeline {
    pub fn new(
        cfg: &AppConfig,
        history: Option<Arc<dyn HistoryStore>>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            ingestor: ConsumptionCsvIngestor::new(&cfg.analysis),
            analyzer: ConsumptionAnalyzer::new(cfg.analysis.currency_symbol.clone()),
            chart: ChartRenderer::new()?,
            spreadsheet: SpreadsheetExporter::new(&cfg.analysis),
            report: cfg
                .report
                .enabled
                .then(|| ReportRenderer::new(cfg.report.title.clone())),
            history,
            artifacts_root: cfg.artifacts.root_dir.clone(),
        })
    }

    pub fn artifacts_root(&self) -> &Path {
        &self.artifacts_root
    }

    /// The blocking part of a request.
    ///
    /// Nothing is written to disk until the table has been parsed and
    /// analyzed; if any renderer fails the request directory is removed.
    pub fn render(&self, upload: &Upload) -> Result<RenderedReport, PipelineError> {
        let cost = validate_cost(upload.cost_per_kwh)?;
        let table = self.ingestor.ingest(&upload.bytes)?;
        let analysis = self.analyzer.analyze(&table, cost)?;

        let ns = ArtifactNamespace::create(&self.artifacts_root)?;
        let result = self.render_into(&ns, &table, &analysis, &upload.source_file_name);
        match result {
            Ok(artifacts) => Ok(RenderedReport {
                request_id: ns.request_id(),
                analysis,
                artifacts,
            }),
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(ns.dir()) {
                    tracing::warn!(error = %cleanup, dir = %ns.dir().display(), "failed to remove partial artifacts");
                }
                Err(e)
            }
        }
    }

    fn render_into(
        &self,
        ns: &ArtifactNamespace,
        table: &ConsumptionTable,
        analysis: &AnalysisResult,
        source_file_name: &str,
    ) -> Result<ReportArtifacts, PipelineError> {
        let chart_path = ns.path(ArtifactKind::Chart);
        self.chart.render(table, &chart_path)?;

        let spreadsheet_path = ns.path(ArtifactKind::Spreadsheet);
        self.spreadsheet.export(table, &spreadsheet_path)?;

        // The document embeds the chart, so it is always rendered last.
        let document_path = match &self.report {
            Some(report) => {
                let path = ns.path(ArtifactKind::Document);
                report.render(analysis, &chart_path, source_file_name, &path)?;
                Some(path)
            }
            None => None,
        };

        Ok(ReportArtifacts {
            chart_path,
            spreadsheet_path,
            document_path,
        })
    }

    /// Run a full request: rendering on the blocking pool, then persistence.
    pub async fn run(self: &Arc<Self>, upload: Upload) -> Result<AnalysisOutcome, PipelineError> {
        metrics::counter!("consumption_uploads_total").increment(1);
        let started = Instant::now();
        let source_file_name = upload.source_file_name.clone();

        let this = Arc::clone(self);
        let rendered = tokio::task::spawn_blocking(move || this.render(&upload))
            .await
            .map_err(|e| PipelineError::Render(format!("render task aborted: {e}")))
            .and_then(|res| res);

        let rendered = match rendered {
            Ok(r) => r,
            Err(e) => {
                metrics::counter!("consumption_upload_failures_total", "kind" => e.kind())
                    .increment(1);
                tracing::warn!(error = %e, kind = e.kind(), file = %source_file_name, "analysis rejected");
                return Err(e);
            }
        };
        metrics::histogram!("report_pipeline_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        let persistence = self.persist(&source_file_name, &rendered.analysis).await;

        tracing::info!(
            request_id = %rendered.request_id,
            file = %source_file_name,
            total_kwh = rendered.analysis.total_kwh,
            top_consumer = %rendered.analysis.top_consumer_name,
            "analysis completed"
        );

        Ok(AnalysisOutcome {
            request_id: rendered.request_id,
            source_file_name,
            analysis: rendered.analysis,
            artifacts: rendered.artifacts,
            persistence,
        })
    }

    async fn persist(&self, source_file_name: &str, analysis: &AnalysisResult) -> PersistenceStatus {
        let Some(store) = &self.history else {
            return PersistenceStatus::Disabled;
        };

        match store.append(source_file_name, analysis).await {
            Ok(entry) => PersistenceStatus::Persisted { id: entry.id },
            Err(e) => {
                metrics::counter!("history_persist_failures_total").increment(1);
                tracing::warn!(error = %e, file = %source_file_name, "history entry skipped");
                PersistenceStatus::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// All stored analyses; empty when history is disabled.
    pub async fn history(&self) -> Result<Vec<HistoryEntry>, PipelineError> {
        match &self.history {
            Some(store) => store.fetch_all().await,
            None => Ok(Vec::new()),
        }
    }

    /// Path of a previously generated artifact.
    pub fn artifact(&self, request_id: Uuid, kind: ArtifactKind) -> Result<PathBuf, PipelineError> {
        ArtifactNamespace::open(&self.artifacts_root, request_id).existing(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::MemoryHistoryStore;
    use tempfile::TempDir;

    struct UnreachableStore;

    #[async_trait::async_trait]
    impl HistoryStore for UnreachableStore {
        async fn append(
            &self,
            _source_file_name: &str,
            _analysis: &AnalysisResult,
        ) -> Result<HistoryEntry, PipelineError> {
            Err(PipelineError::Persistence("connection refused".to_string()))
        }

        async fn fetch_all(&self) -> Result<Vec<HistoryEntry>, PipelineError> {
            Err(PipelineError::Persistence("connection refused".to_string()))
        }
    }

    fn config(root: &Path) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.artifacts.root_dir = root.to_path_buf();
        cfg
    }

    fn upload(csv: &str, cost: Option<f64>) -> Upload {
        Upload {
            source_file_name: "consumption.csv".to_string(),
            bytes: csv.as_bytes().to_vec(),
            cost_per_kwh: cost,
        }
    }

    fn artifact_dirs(root: &Path) -> usize {
        fs::read_dir(root).map(|d| d.count()).unwrap_or(0)
    }

    const EXAMPLE: &str = "name,consumptionKwh\nA,100\nB,300\nC,300\n";

    #[tokio::test]
    async fn full_run_produces_consistent_bundle() {
        let root = TempDir::new().unwrap();
        let store = Arc::new(MemoryHistoryStore::default());
        let pipeline =
            Arc::new(ReportPipeline::new(&config(root.path()), Some(store.clone() as Arc<dyn HistoryStore>)).unwrap());

        let outcome = pipeline.run(upload(EXAMPLE, Some(0.5))).await.unwrap();

        assert_eq!(outcome.analysis.total_kwh, 700);
        assert_eq!(outcome.analysis.top_consumer_name, "B");
        assert_eq!(outcome.analysis.potential_savings_currency, 15.0);
        assert_eq!(outcome.persistence, PersistenceStatus::Persisted { id: 1 });

        let artifacts = &outcome.artifacts;
        assert!(artifacts.chart_path.is_file());
        assert!(artifacts.spreadsheet_path.is_file());
        assert!(artifacts.document_path.as_ref().unwrap().is_file());
        assert!(artifacts
            .chart_path
            .starts_with(root.path().join(outcome.request_id.to_string())));

        let history = pipeline.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].source_file_name, "consumption.csv");
        assert_eq!(history[0].total_kwh, outcome.analysis.total_kwh);
        assert_eq!(history[0].top_consumer_name, "B");
    }

    #[tokio::test]
    async fn missing_column_produces_nothing() {
        let root = TempDir::new().unwrap();
        let store = Arc::new(MemoryHistoryStore::default());
        let pipeline =
            Arc::new(ReportPipeline::new(&config(root.path()), Some(store.clone() as Arc<dyn HistoryStore>)).unwrap());

        let res = pipeline.run(upload("name,kwh\nA,100\n", None)).await;

        assert!(matches!(res, Err(PipelineError::Validation(_))));
        assert_eq!(artifact_dirs(root.path()), 0);
        assert!(store.fetch_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_table_produces_nothing() {
        let root = TempDir::new().unwrap();
        let pipeline = Arc::new(ReportPipeline::new(&config(root.path()), None).unwrap());

        let res = pipeline.run(upload("name,consumptionKwh\n", None)).await;

        assert!(matches!(res, Err(PipelineError::EmptyTable)));
        assert_eq!(artifact_dirs(root.path()), 0);
    }

    #[tokio::test]
    async fn negative_cost_is_rejected() {
        let root = TempDir::new().unwrap();
        let pipeline = Arc::new(ReportPipeline::new(&config(root.path()), None).unwrap());

        let res = pipeline.run(upload(EXAMPLE, Some(-0.1))).await;
        assert!(matches!(res, Err(PipelineError::Validation(_))));
    }

    #[tokio::test]
    async fn store_failure_is_reported_not_fatal() {
        let root = TempDir::new().unwrap();
        let pipeline = Arc::new(
            ReportPipeline::new(&config(root.path()), Some(Arc::new(UnreachableStore) as Arc<dyn HistoryStore>))
                .unwrap(),
        );

        let outcome = pipeline.run(upload(EXAMPLE, None)).await.unwrap();

        match &outcome.persistence {
            PersistenceStatus::Skipped { reason } => assert!(reason.contains("connection refused")),
            other => panic!("expected skipped persistence, got {other:?}"),
        }
        assert!(outcome.artifacts.spreadsheet_path.is_file());
        assert!(matches!(
            pipeline.history().await,
            Err(PipelineError::Persistence(_))
        ));
    }

    #[tokio::test]
    async fn disabled_collaborators_are_skipped() {
        let root = TempDir::new().unwrap();
        let mut cfg = config(root.path());
        cfg.report.enabled = false;
        let pipeline = Arc::new(ReportPipeline::new(&cfg, None).unwrap());

        let outcome = pipeline.run(upload(EXAMPLE, None)).await.unwrap();

        assert_eq!(outcome.persistence, PersistenceStatus::Disabled);
        assert!(outcome.artifacts.document_path.is_none());
        assert!(matches!(
            pipeline.artifact(outcome.request_id, ArtifactKind::Document),
            Err(PipelineError::NotFound(_))
        ));
        assert!(pipeline.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn artifacts_are_looked_up_per_request() {
        let root = TempDir::new().unwrap();
        let pipeline = Arc::new(ReportPipeline::new(&config(root.path()), None).unwrap());

        assert!(matches!(
            pipeline.artifact(Uuid::new_v4(), ArtifactKind::Spreadsheet),
            Err(PipelineError::NotFound(_))
        ));

        let outcome = pipeline.run(upload(EXAMPLE, None)).await.unwrap();
        assert_eq!(
            pipeline
                .artifact(outcome.request_id, ArtifactKind::Spreadsheet)
                .unwrap(),
            outcome.artifacts.spreadsheet_path
        );
    }

    #[tokio::test]
    async fn concurrent_requests_get_separate_namespaces() {
        let root = TempDir::new().unwrap();
        let pipeline = Arc::new(ReportPipeline::new(&config(root.path()), None).unwrap());

        let (a, b) = tokio::join!(
            pipeline.run(upload("name,consumptionKwh\nA,1\n", None)),
            pipeline.run(upload("name,consumptionKwh\nB,2\nC,3\n", None)),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.request_id, b.request_id);
        assert_ne!(a.artifacts.spreadsheet_path, b.artifacts.spreadsheet_path);
        assert_eq!(a.analysis.top_consumer_name, "A");
        assert_eq!(b.analysis.top_consumer_name, "C");
        assert_eq!(artifact_dirs(root.path()), 2);
    }

    #[test]
    fn unwritable_artifact_root_is_a_render_error() {
        let root = TempDir::new().unwrap();
        // A file where the artifact root should be makes directory creation fail.
        let blocked = root.path().join("blocked");
        fs::write(&blocked, b"").unwrap();
        let pipeline = ReportPipeline::new(&config(&blocked), None).unwrap();

        let res = pipeline.render(&upload(EXAMPLE, None));
        assert!(matches!(res, Err(PipelineError::Render(_))));
    }
}
