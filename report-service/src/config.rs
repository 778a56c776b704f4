use serde::Deserialize;
use std::{fs, path::PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: String,
    /// Upper bound on an uploaded CSV body.
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Each request writes into `<root_dir>/<request_id>/`.
    pub root_dir: PathBuf,
    /// Request directories older than this are deleted. `None` keeps them forever.
    pub retention_secs: Option<u64>,
    pub prune_interval_secs: u64,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("artifacts"),
            retention_secs: None,
            prune_interval_secs: 300,
        }
    }
}

/// Header labels of the uploaded table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub name_column: String,
    pub consumption_column: String,
    pub date_column: String,
    pub currency_symbol: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            name_column: "name".to_string(),
            consumption_column: "consumptionKwh".to_string(),
            date_column: "date".to_string(),
            currency_symbol: "$".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Generate the PDF document alongside chart and spreadsheet.
    pub enabled: bool,
    pub title: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: "Energy Consumption Report".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStoreKind {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub kind: HistoryStoreKind,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: Option<String>,
    /// Require TLS on the database connection.
    pub encrypt: bool,
    pub connect_timeout_secs: u64,
    pub max_connections: u32,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Run `CREATE TABLE IF NOT EXISTS` on startup.
    pub ensure_schema: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: HistoryStoreKind::Postgres,
            host: "localhost".to_string(),
            port: 5432,
            database: "energy".to_string(),
            username: "energy".to_string(),
            password: None,
            encrypt: false,
            connect_timeout_secs: 5,
            max_connections: 5,
            max_retries: 2,
            retry_backoff_ms: 200,
            ensure_schema: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub artifacts: ArtifactsConfig,
    pub analysis: AnalysisConfig,
    pub report: ReportConfig,
    pub history: HistoryConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Load from `$REPORT_CONFIG`, or `report-config.toml` in the working directory.
    ///
    /// An explicitly configured path must exist; a missing default file yields
    /// the built-in defaults.
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        match env::var("REPORT_CONFIG") {
            Ok(path) => Self::from_file(&path),
            Err(_) => {
                let path = "report-config.toml";
                if PathBuf::from(path).exists() {
                    Self::from_file(path)
                } else {
                    tracing::info!("no report-config.toml found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config '{path}': {e}"))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }
}
