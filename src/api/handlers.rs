use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::db::face_store::export_file_name;
use crate::error::{FaceError, FaceResult};
use crate::models::{Detection, EncodedImage, IdentitySummary, Role};
use crate::pipeline::{RecognitionOutcome, VideoFrame};
use crate::AppState;

impl IntoResponse for FaceError {
    fn into_response(self) -> Response {
        let status = match &self {
            FaceError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            FaceError::NotFound(_) => StatusCode::NOT_FOUND,
            FaceError::NoFaceDetected => StatusCode::UNPROCESSABLE_ENTITY,
            FaceError::ProcessingFailed(_) => StatusCode::BAD_GATEWAY,
            FaceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        let body = serde_json::json!({ "error": self.kind(), "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}

// Malformed bodies are the caller's fault; keep 422 for "no face".
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> FaceResult<T> {
    payload
        .map(|Json(v)| v)
        .map_err(|rej| FaceError::InvalidArgument(rej.body_text()))
}

#[derive(Debug, Deserialize)]
pub struct FrameRequest {
    pub image: EncodedImage,
    /// Overrides the configured match threshold for this call.
    #[serde(default)]
    pub threshold: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub role: Role,
    pub images: Vec<EncodedImage>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub identity: IdentitySummary,
    pub embedded: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize)]
pub struct CaptureResponse {
    pub face_image: EncodedImage,
    pub detection: Detection,
    pub face_count: usize,
    pub multiple_faces: bool,
}

#[derive(Debug, Serialize)]
pub struct RecognizeResponse {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentitySummary>,
    pub similarity: Option<f32>,
    pub face_image: EncodedImage,
}

impl From<RecognitionOutcome> for RecognizeResponse {
    fn from(outcome: RecognitionOutcome) -> Self {
        match outcome {
            RecognitionOutcome::Matched { identity, similarity, face_image } => Self {
                matched: true,
                identity: Some(identity.summary()),
                similarity: Some(similarity),
                face_image,
            },
            RecognitionOutcome::Unmatched { best_similarity, face_image } => Self {
                matched: false,
                identity: None,
                similarity: best_similarity,
                face_image,
            },
        }
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let recognizer = &state.recognizer;
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "extractor_ready": recognizer.extractor_ready(),
        "identities": recognizer.store().len(),
        "match_threshold": recognizer.settings().match_threshold,
        "detection_confidence": recognizer.settings().detection_confidence,
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

pub async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.stats.snapshot())
}

pub async fn reset_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.stats.reset_stats();
    info!("Recognition stats reset");
    StatusCode::NO_CONTENT
}

pub async fn list_identities(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let summaries: Vec<IdentitySummary> = state.recognizer.store().snapshot().iter().map(|i| i.summary()).collect();
    Json(summaries)
}

pub async fn get_identity(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> FaceResult<impl IntoResponse> {
    let identity = state.recognizer.store().get(&id).ok_or(FaceError::NotFound(id))?;
    Ok(Json(identity))
}

pub async fn register_identity(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> FaceResult<impl IntoResponse> {
    let req = body(payload)?;
    let result = state
        .recognizer
        .register(&req.name, req.role, req.images, |pct| debug!("Registration progress {:.0}%", pct))
        .await;
    state.stats.record_registration(result.is_ok());
    let registration = result?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            identity: registration.identity.summary(),
            embedded: registration.embedded,
            failed: registration.failed,
        }),
    ))
}

pub async fn delete_identity(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> FaceResult<impl IntoResponse> {
    let deleted = state.recognizer.delete(&id).await?;
    if !deleted {
        debug!("Delete of unknown identity {} ignored", id);
    }
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

pub async fn capture_face(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FrameRequest>, JsonRejection>,
) -> FaceResult<impl IntoResponse> {
    let req = body(payload)?;
    let frame = VideoFrame::from_encoded(&req.image)?;
    let face = state.recognizer.capture_face(&frame).await?;
    if face.multiple_faces() {
        warn!("{} faces in frame; captured the most confident one", face.face_count);
    }
    Ok(Json(CaptureResponse {
        multiple_faces: face.multiple_faces(),
        face_image: face.face_image,
        detection: face.detection,
        face_count: face.face_count,
    }))
}

pub async fn recognize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FrameRequest>, JsonRejection>,
) -> FaceResult<impl IntoResponse> {
    let req = body(payload)?;
    let frame = VideoFrame::from_encoded(&req.image)?;
    let threshold = req.threshold.unwrap_or(state.recognizer.settings().match_threshold);
    match state.recognizer.recognize_with_threshold(&frame, threshold).await {
        Ok(outcome) => {
            match &outcome {
                RecognitionOutcome::Matched { similarity, .. } => state.stats.record_match(*similarity),
                RecognitionOutcome::Unmatched { best_similarity, .. } => state.stats.record_unmatched(*best_similarity),
            }
            Ok(Json(RecognizeResponse::from(outcome)))
        }
        Err(e) => {
            state.stats.record_recognition_error(&e);
            Err(e)
        }
    }
}

pub async fn export_database(State(state): State<Arc<AppState>>) -> FaceResult<impl IntoResponse> {
    let json = state.recognizer.store().export_json()?;
    let file_name = export_file_name(chrono::Utc::now().date_naive());
    info!("Exporting face database ({} bytes) as {}", json.len(), file_name);
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)),
        ],
        json,
    ))
}

pub async fn save_export(State(state): State<Arc<AppState>>) -> FaceResult<impl IntoResponse> {
    let dir = state.config.exports_dir();
    let store = state.recognizer.store().clone();
    let path = tokio::task::spawn_blocking(move || store.export_to_dir(&dir))
        .await
        .map_err(|e| FaceError::storage("export task failed", e.into()))??;
    Ok(Json(serde_json::json!({ "path": path.to_string_lossy() })))
}
