use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use serde::Serialize;
use uuid::Uuid;

use super::PipelineError;

/// The files one request can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Chart,
    Spreadsheet,
    Document,
}

impl ArtifactKind {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Chart => "consumption_chart.png",
            Self::Spreadsheet => "consumption_analysis.xlsx",
            Self::Document => "consumption_report.pdf",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Chart => "image/png",
            Self::Spreadsheet => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Document => "application/pdf",
        }
    }

    /// Route segment used by the export endpoints.
    pub fn from_route(segment: &str) -> Option<Self> {
        match segment {
            "chart" => Some(Self::Chart),
            "excel" => Some(Self::Spreadsheet),
            "pdf" => Some(Self::Document),
            _ => None,
        }
    }
}

/// Directory owned by a single request: `<root>/<request_id>/`.
///
/// Renderers only ever write inside their request's namespace, so concurrent
/// requests never share an output path.
#[derive(Debug, Clone)]
pub struct ArtifactNamespace {
    request_id: Uuid,
    dir: PathBuf,
}

impl ArtifactNamespace {
    /// Allocate a fresh request id and create its directory.
    pub fn create(root: &Path) -> Result<Self, PipelineError> {
        let ns = Self::open(root, Uuid::new_v4());
        fs::create_dir_all(&ns.dir).map_err(|e| {
            PipelineError::Render(format!(
                "failed to create artifact directory {}: {e}",
                ns.dir.display()
            ))
        })?;
        Ok(ns)
    }

    /// Refer to an existing (or not yet created) namespace without touching disk.
    pub fn open(root: &Path, request_id: Uuid) -> Self {
        Self {
            request_id,
            dir: root.join(request_id.to_string()),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Path of an artifact that has already been generated.
    pub fn existing(&self, kind: ArtifactKind) -> Result<PathBuf, PipelineError> {
        let path = self.path(kind);
        if path.is_file() {
            Ok(path)
        } else {
            Err(PipelineError::NotFound(format!(
                "{} has not been generated for request {}",
                kind.file_name(),
                self.request_id
            )))
        }
    }
}

/// Files written for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportArtifacts {
    pub chart_path: PathBuf,
    pub spreadsheet_path: PathBuf,
    /// `None` when document generation is disabled.
    pub document_path: Option<PathBuf>,
}

/// Remove request directories under `root` last modified at least `max_age` ago.
///
/// Only entries named by a request id are touched. A missing root is not an
/// error. Returns how many directories were removed.
pub fn prune_expired(root: &Path, max_age: Duration) -> Result<usize, PipelineError> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(PipelineError::Render(format!(
                "failed to list artifact root {}: {e}",
                root.display()
            )))
        }
    };

    let now = SystemTime::now();
    let mut removed = 0;
    for entry in entries.flatten() {
        let is_request_dir = entry
            .file_name()
            .to_str()
            .is_some_and(|name| Uuid::parse_str(name).is_ok());
        if !is_request_dir {
            continue;
        }

        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, dir = %entry.path().display(), "cannot stat artifact directory");
                continue;
            }
        };
        if now.duration_since(modified).unwrap_or_default() < max_age {
            continue;
        }

        match fs::remove_dir_all(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => {
                tracing::warn!(error = %e, dir = %entry.path().display(), "failed to remove expired artifacts")
            }
        }
    }

    Ok(removed)
}

/// Periodically prune `root` on the blocking pool.
pub fn spawn_pruner(
    root: PathBuf,
    max_age: Duration,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let root = root.clone();
            match tokio::task::spawn_blocking(move || prune_expired(&root, max_age)).await {
                Ok(Ok(0)) => {}
                Ok(Ok(removed)) => tracing::info!(removed, "expired artifact directories removed"),
                Ok(Err(e)) => tracing::warn!(error = %e, "artifact pruning failed"),
                Err(e) => tracing::error!(error = %e, "artifact pruning task aborted"),
            }
        }
    })
}
