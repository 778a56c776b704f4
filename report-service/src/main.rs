use anyhow::Result;
use report_service::{
    config::AppConfig,
    metrics_server, observability,
    pipeline::spawn_pruner,
    sinks::connect_store,
    sources::{router, serve},
    ReportPipeline,
};
use std::{sync::Arc, time::Duration};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    // Postgres is connected lazily; an unreachable database only degrades history.
    let history = connect_store(&cfg.history).await?;
    if history.is_none() {
        tracing::info!("history store disabled");
    }

    let pipeline = Arc::new(ReportPipeline::new(&cfg, history)?);
    tracing::info!(
        artifacts = %pipeline.artifacts_root().display(),
        report = cfg.report.enabled,
        "report pipeline ready"
    );

    if let Some(secs) = cfg.artifacts.retention_secs {
        spawn_pruner(
            cfg.artifacts.root_dir.clone(),
            Duration::from_secs(secs),
            Duration::from_secs(cfg.artifacts.prune_interval_secs.max(1)),
        );
    }

    let app = router(pipeline, cfg.http.max_body_bytes);
    serve(&cfg.http.bind_addr, app).await
}
