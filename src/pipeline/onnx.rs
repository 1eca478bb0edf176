use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::pipeline::embed::{apply_pooling, l2_normalize, EmbedOptions, FeatureExtractor};
use crate::utils::config::Config;

const INPUT_SIZE: u32 = 112;

/// ArcFace-style face embedding model run through ONNX Runtime.
pub struct OnnxExtractor {
    pub models_dir: PathBuf,
    model_file: String,
    model_url: String,
    auto_download: bool,
    use_gpu: bool,
    session: Option<Arc<Mutex<Session>>>,
}

impl OnnxExtractor {
    pub fn new(cfg: &Config) -> Self {
        Self {
            models_dir: cfg.models_dir(),
            model_file: cfg.model_file.clone(),
            model_url: cfg.model_url.clone(),
            auto_download: cfg.model_auto_download,
            use_gpu: cfg.use_gpu,
            session: None,
        }
    }

    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join(&self.model_file)
    }

    pub fn loaded(&self) -> bool {
        self.session.is_some()
    }

    /// Download the model if needed, then load it. Failures are logged and
    /// leave the extractor unloaded rather than aborting startup.
    pub async fn initialize(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.models_dir).context("Failed to create models directory")?;

        if self.auto_download {
            if let Err(e) = self.download_model().await {
                warn!("Face model auto-download failed: {}", e);
            }
        } else {
            info!("Face model auto-download disabled by user.");
        }

        if let Err(e) = self.load_model() {
            warn!("Face model not loaded: {}", e);
        }
        Ok(())
    }

    async fn download_model(&self) -> Result<()> {
        let path = self.model_path();
        if path.exists() {
            return Ok(());
        }
        info!("Downloading face embedding model ({})...", self.model_file);
        let client = create_http_client()?;
        download_file(&client, &self.model_url, &path).await
    }

    fn load_model(&mut self) -> Result<()> {
        let path = self.model_path();
        if !path.exists() {
            anyhow::bail!("Face model missing; expected it at {:?}", path);
        }
        if self.use_gpu {
            warn!("GPU execution requested but not configured for this build; using CPU");
        }
        let session = Session::builder()?
            .commit_from_file(&path)
            .context("Failed to create embedding session")?;
        self.session = Some(Arc::new(Mutex::new(session)));
        info!("Face embedding model loaded: {:?}", path);
        Ok(())
    }
}

fn create_http_client() -> Result<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    if let Ok(token) = std::env::var("HF_TOKEN") {
        if !token.is_empty() {
            info!("Using Hugging Face token for model download.");
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
    }
    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .context("Failed to create HTTP client")
}

async fn download_file(client: &reqwest::Client, url: &str, path: &Path) -> Result<()> {
    let response = client
        .get(url)
        .send()
        .await
        .context(format!("Failed to download model from {}", url))?;
    if !response.status().is_success() {
        anyhow::bail!("Failed to download model: HTTP {}", response.status());
    }
    let bytes = response.bytes().await.context("Failed to read response body")?;

    // ONNX files should be at least a few KB
    if bytes.len() < 1024 {
        anyhow::bail!("Downloaded file is suspiciously small ({} bytes), may be corrupted", bytes.len());
    }
    std::fs::write(path, &bytes).context(format!("Failed to write file: {:?}", path))?;
    let metadata = std::fs::metadata(path).context(format!("Failed to read metadata for downloaded file: {:?}", path))?;
    if metadata.len() != bytes.len() as u64 {
        anyhow::bail!(
            "File integrity check failed: expected {} bytes, got {} bytes",
            bytes.len(),
            metadata.len()
        );
    }
    info!("Downloaded model to {:?} ({} bytes, verified)", path, bytes.len());
    Ok(())
}

/// Resize to the model input and lay out as normalised NCHW floats.
fn preprocess(face: &DynamicImage) -> ([i64; 4], Vec<f32>) {
    let side = INPUT_SIZE as usize;
    let resized = face.resize_exact(INPUT_SIZE, INPUT_SIZE, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();
    let mut data = Vec::with_capacity(3 * side * side);
    for c in 0..3 {
        for y in 0..INPUT_SIZE {
            for x in 0..INPUT_SIZE {
                let p = rgb.get_pixel(x, y);
                data.push((p[c] as f32 - 127.5) / 128.0);
            }
        }
    }
    ([1, 3, INPUT_SIZE as i64, INPUT_SIZE as i64], data)
}

fn run_session(session: &Mutex<Session>, face: &DynamicImage, options: EmbedOptions) -> Result<Vec<f32>> {
    let (shape, data) = preprocess(face);
    let mut session_guard = session.lock();
    let input_name = session_guard.inputs[0].name.clone();
    let input = Value::from_array((shape.to_vec(), data)).context("Failed to create input tensor")?;
    let outputs = session_guard
        .run(ort::inputs![input_name => input])
        .context("Embedding inference failed")?;

    // Prefer a conventionally named output, otherwise the first one
    let key = outputs
        .keys()
        .find(|k| matches!(*k, "output" | "embedding" | "fc1" | "features"))
        .or_else(|| outputs.keys().next())
        .map(|k| k.to_string())
        .context("Model produced no outputs")?;
    let value = outputs.get(key.as_str()).context("Model output disappeared")?;
    let (out_shape, slice) = value
        .try_extract_tensor::<f32>()
        .context(format!("Output '{}' is not an f32 tensor", key))?;
    let dims: Vec<i64> = out_shape.iter().copied().collect();
    let mut embedding = apply_pooling(&dims, slice, options.pooling)?;
    if options.normalize {
        l2_normalize(&mut embedding);
    }
    Ok(embedding)
}

#[async_trait]
impl FeatureExtractor for OnnxExtractor {
    async fn embed(&self, image: &DynamicImage, options: EmbedOptions) -> Result<Vec<f32>> {
        let session = self.session.clone().context("Recognition model not loaded")?;
        let face = image.clone();
        tokio::task::spawn_blocking(move || run_session(&session, &face, options))
            .await
            .context("Embedding task panicked")?
    }

    fn is_ready(&self) -> bool {
        self.loaded()
    }
}
