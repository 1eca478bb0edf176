use std::net::SocketAddr;
use std::sync::Arc;

use homeface_backend::db::{FaceStore, SqliteBlobStore};
use homeface_backend::pipeline::recognize::{RecognitionSettings, Recognizer};
use homeface_backend::pipeline::roboflow::RoboflowDetector;
use homeface_backend::pipeline::{Detector, FeatureExtractor};
use homeface_backend::stats::Stats;
use homeface_backend::utils::config::Config;
use homeface_backend::utils::logging;
use tracing::info;

#[cfg(feature = "facial-recognition")]
async fn build_extractor(cfg: &Config) -> anyhow::Result<Arc<dyn FeatureExtractor>> {
    let mut extractor = homeface_backend::pipeline::onnx::OnnxExtractor::new(cfg);
    extractor.initialize().await?;
    if !extractor.loaded() {
        tracing::warn!("Recognition and registration are disabled until the face model is available");
    }
    Ok(Arc::new(extractor))
}

#[cfg(not(feature = "facial-recognition"))]
async fn build_extractor(_cfg: &Config) -> anyhow::Result<Arc<dyn FeatureExtractor>> {
    tracing::warn!("Built without the facial-recognition feature; recognition is disabled");
    Ok(Arc::new(homeface_backend::pipeline::embed::UnavailableExtractor {
        reason: "built without the facial-recognition feature".to_string(),
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cfg = Config::from_env();
    let db_path = cfg.db_path();
    if let Some(db_dir) = db_path.parent() {
        std::fs::create_dir_all(db_dir)?;
    }
    std::fs::create_dir_all(cfg.exports_dir())?;

    let blob = Arc::new(SqliteBlobStore::open(&db_path)?);
    let store = Arc::new(FaceStore::open(blob)?);

    let detector: Arc<dyn Detector> = Arc::new(RoboflowDetector::new(
        &cfg.detector_url,
        &cfg.detector_model,
        cfg.detector_api_key.clone(),
        cfg.detector_timeout(),
    )?);
    let extractor = build_extractor(&cfg).await?;
    let settings = RecognitionSettings {
        match_threshold: cfg.match_threshold,
        detection_confidence: cfg.detect_confidence,
    };
    let recognizer = Arc::new(Recognizer::new(detector, extractor, store, settings));
    info!(
        "Recognizer ready: {} identities, match threshold {:.2}, detection confidence {:.2}",
        recognizer.store().len(),
        settings.match_threshold,
        settings.detection_confidence
    );

    let state = Arc::new(homeface_backend::AppState::new(cfg.clone(), recognizer, Arc::new(Stats::new())));
    let app = homeface_backend::api::routes::router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening" = %addr);
    axum::serve(listener, app).await?;
    Ok(())
}
