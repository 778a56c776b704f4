use anyhow::{bail, Context, Result};
use report_service::{
    config::AppConfig, observability, sinks::connect_store, ReportPipeline, Upload,
};
use std::{env, path::Path, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: analyze_file <csv_file_path> [cost_per_kwh]");
    }
    let file_path = Path::new(&args[1]);
    let cost_per_kwh = match args.get(2) {
        Some(raw) => Some(
            raw.parse::<f64>()
                .with_context(|| format!("invalid cost per kWh '{raw}'"))?,
        ),
        None => None,
    };

    // REPORT_CONFIG may point at a file with a different artifacts root or history store.
    let cfg = AppConfig::load()?;

    let bytes = std::fs::read(file_path)
        .with_context(|| format!("failed to read {}", file_path.display()))?;
    let source_file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args[1].clone());

    let history = connect_store(&cfg.history).await?;
    let pipeline = Arc::new(ReportPipeline::new(&cfg, history)?);

    let outcome = pipeline
        .run(Upload {
            source_file_name,
            bytes,
            cost_per_kwh,
        })
        .await?;

    tracing::info!(request_id = %outcome.request_id, "artifacts written");
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}
