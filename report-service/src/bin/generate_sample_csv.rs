use anyhow::{Context, Result};
use report_service::{
    config::AppConfig, observability, sources::consumption_csv::write_sample_csv,
};
use std::{env, fs::File, io::BufWriter};
use time::OffsetDateTime;

fn main() -> Result<()> {
    observability::init_tracing();

    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "consumption_sample.csv".to_string());

    // Column labels follow the configured analysis headers.
    let cfg = AppConfig::load()?;

    let file = File::create(&path).with_context(|| format!("failed to create {path}"))?;
    let rows = write_sample_csv(
        BufWriter::new(file),
        &mut rand::thread_rng(),
        OffsetDateTime::now_utc().date(),
        &cfg.analysis,
    )?;

    tracing::info!(%path, rows, "sample table written");
    Ok(())
}
