use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use report_client::domain::HistoryEntry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::{AnalysisOutcome, ArtifactKind, PipelineError, ReportPipeline, Upload};

#[derive(Clone)]
struct AppState {
    pipeline: Arc<ReportPipeline>,
}

#[derive(Debug, Deserialize)]
struct UploadParams {
    cost: Option<f64>,
    file_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct ArtifactLinks {
    chart: String,
    excel: String,
    pdf: Option<String>,
}

impl ArtifactLinks {
    fn for_outcome(outcome: &AnalysisOutcome) -> Self {
        let base = format!("/export/{}", outcome.request_id);
        Self {
            chart: format!("{base}/chart"),
            excel: format!("{base}/excel"),
            pdf: outcome
                .artifacts
                .document_path
                .as_ref()
                .map(|_| format!("{base}/pdf")),
        }
    }
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    #[serde(flatten)]
    outcome: AnalysisOutcome,
    links: ArtifactLinks,
}

/// Maps the pipeline error taxonomy onto HTTP status codes.
#[derive(Debug)]
pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PipelineError::Validation(_) | PipelineError::Parse(_) | PipelineError::EmptyTable => {
                StatusCode::BAD_REQUEST
            }
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = serde_json::json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

pub fn router(pipeline: Arc<ReportPipeline>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/export/:request_id/:artifact", get(export_artifact))
        .route("/history", get(history))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(AppState { pipeline })
}

pub async fn serve(bind_addr: &str, app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid http bind addr '{bind_addr}': {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "http listener started");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// `POST /upload?cost=<f64>&file_name=<name>` with the CSV as the request body.
async fn upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    metrics::counter!("http_upload_requests_total").increment(1);

    if body.is_empty() {
        return Err(PipelineError::Validation("no file was sent".to_string()).into());
    }

    let upload = Upload {
        source_file_name: params.file_name.unwrap_or_else(|| "upload.csv".to_string()),
        bytes: body.to_vec(),
        cost_per_kwh: params.cost,
    };
    let outcome = state.pipeline.run(upload).await?;
    let links = ArtifactLinks::for_outcome(&outcome);

    Ok(Json(UploadResponse { outcome, links }))
}

async fn export_artifact(
    State(state): State<AppState>,
    Path((request_id, artifact)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let kind = ArtifactKind::from_route(&artifact)
        .ok_or_else(|| PipelineError::NotFound(format!("unknown artifact '{artifact}'")))?;
    let request_id = Uuid::parse_str(&request_id)
        .map_err(|_| PipelineError::NotFound(format!("unknown request '{request_id}'")))?;

    let path = state.pipeline.artifact(request_id, kind)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| PipelineError::Render(format!("failed to read {}: {e}", path.display())))?;

    let disposition = format!("attachment; filename=\"{}\"", kind.file_name());
    Ok((
        [
            (header::CONTENT_TYPE, kind.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

async fn history(State(state): State<AppState>) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    Ok(Json(state.pipeline.history().await?))
}
