use async_trait::async_trait;
use image::DynamicImage;
use tracing::{debug, warn};

use crate::models::EncodedImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pooling {
    /// Average over the token/patch axis.
    Mean,
    /// Take the first token.
    First,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedOptions {
    pub pooling: Pooling,
    pub normalize: bool,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self { pooling: Pooling::Mean, normalize: true }
    }
}

/// In-process model turning a face image into a fixed-length vector.
///
/// Implementations are called sequentially and need not be reentrant.
#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    async fn embed(&self, image: &DynamicImage, options: EmbedOptions) -> anyhow::Result<Vec<f32>>;

    /// Whether the underlying model is loaded and usable.
    fn is_ready(&self) -> bool {
        true
    }
}

/// Stand-in used when no model is available in this build.
pub struct UnavailableExtractor {
    pub reason: String,
}

#[async_trait]
impl FeatureExtractor for UnavailableExtractor {
    async fn embed(&self, _image: &DynamicImage, _options: EmbedOptions) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("feature extraction unavailable: {}", self.reason)
    }

    fn is_ready(&self) -> bool {
        false
    }
}

/// Embed every image in order, best effort.
///
/// Images that fail to decode or embed are logged and skipped, so the result
/// can be shorter than the input. Each entry carries the index of the image
/// it came from. `on_progress` receives a percentage after every image.
pub async fn generate_embeddings_indexed<F>(
    images: &[EncodedImage],
    extractor: &dyn FeatureExtractor,
    mut on_progress: F,
) -> Vec<(usize, Vec<f32>)>
where
    F: FnMut(f32) + Send,
{
    let options = EmbedOptions::default();
    let total = images.len();
    let mut out = Vec::with_capacity(total);
    for (i, encoded) in images.iter().enumerate() {
        match embed_one(encoded, extractor, options).await {
            Ok(embedding) => {
                debug!("Embedded image {}/{} (dim={})", i + 1, total, embedding.len());
                out.push((i, embedding));
            }
            Err(e) => warn!("Failed to create embedding for image {}/{}: {:#}", i + 1, total, e),
        }
        on_progress(((i + 1) as f32 / total as f32) * 100.0);
    }
    out
}

/// Like [`generate_embeddings_indexed`] but returns only the vectors.
pub async fn generate_embeddings<F>(
    images: &[EncodedImage],
    extractor: &dyn FeatureExtractor,
    on_progress: F,
) -> Vec<Vec<f32>>
where
    F: FnMut(f32) + Send,
{
    generate_embeddings_indexed(images, extractor, on_progress)
        .await
        .into_iter()
        .map(|(_, e)| e)
        .collect()
}

/// Reduce a raw model output of shape `dims` to one vector.
///
/// `[D]` and `[1, D]` pass through; `[1, N, D]` is pooled over `N`.
pub fn apply_pooling(dims: &[i64], data: &[f32], pooling: Pooling) -> anyhow::Result<Vec<f32>> {
    match dims {
        [_] | [1, _] => Ok(data.to_vec()),
        [1, n, d] if *n > 0 && *d > 0 => {
            let (n, d) = (*n as usize, *d as usize);
            if data.len() != n * d {
                anyhow::bail!("output has {} values, expected {}x{}", data.len(), n, d);
            }
            match pooling {
                Pooling::First => Ok(data[..d].to_vec()),
                Pooling::Mean => {
                    let mut out = vec![0.0f32; d];
                    for token in data.chunks_exact(d) {
                        for (acc, v) in out.iter_mut().zip(token) {
                            *acc += v;
                        }
                    }
                    for v in &mut out {
                        *v /= n as f32;
                    }
                    Ok(out)
                }
            }
        }
        other => anyhow::bail!("unsupported model output shape {:?}", other),
    }
}

/// Scale `v` to unit length. Zero vectors are left as they are.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

pub(crate) async fn embed_one(
    encoded: &EncodedImage,
    extractor: &dyn FeatureExtractor,
    options: EmbedOptions,
) -> anyhow::Result<Vec<f32>> {
    let img = encoded.decode()?;
    let embedding = extractor.embed(&img, options).await?;
    if embedding.is_empty() {
        anyhow::bail!("model produced an empty embedding");
    }
    if !embedding.iter().all(|v| v.is_finite()) {
        anyhow::bail!("model produced a non-finite embedding");
    }
    Ok(embedding)
}
