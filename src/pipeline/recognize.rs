use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::db::FaceStore;
use crate::error::{FaceError, FaceResult};
use crate::models::{Detection, EncodedImage, Identity, Role};
use crate::pipeline::capture::{self, Detector, VideoFrame};
use crate::pipeline::embed::{self, EmbedOptions, FeatureExtractor};
use crate::pipeline::similarity::cosine_similarity;

pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.75;
pub const DEFAULT_DETECTION_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognitionSettings {
    /// A match needs a similarity strictly greater than this.
    pub match_threshold: f32,
    /// Passed to the detector with every call.
    pub detection_confidence: f32,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            detection_confidence: DEFAULT_DETECTION_CONFIDENCE,
        }
    }
}

/// Steps of a single `recognize` call, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionStage {
    Capturing,
    Detecting,
    NoFace,
    Embedding,
    Comparing,
    Matched,
    Unmatched,
}

#[derive(Debug, Clone)]
pub enum RecognitionOutcome {
    Matched {
        identity: Identity,
        similarity: f32,
        face_image: EncodedImage,
    },
    Unmatched {
        /// Highest similarity seen, if the store had any embeddings.
        best_similarity: Option<f32>,
        face_image: EncodedImage,
    },
}

impl RecognitionOutcome {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            RecognitionOutcome::Matched { identity, .. } => Some(identity),
            RecognitionOutcome::Unmatched { .. } => None,
        }
    }

    pub fn face_image(&self) -> &EncodedImage {
        match self {
            RecognitionOutcome::Matched { face_image, .. } => face_image,
            RecognitionOutcome::Unmatched { face_image, .. } => face_image,
        }
    }

    pub fn best_similarity(&self) -> Option<f32> {
        match self {
            RecognitionOutcome::Matched { similarity, .. } => Some(*similarity),
            RecognitionOutcome::Unmatched { best_similarity, .. } => *best_similarity,
        }
    }
}

/// A face cut out of a frame, ready to be added to a registration.
#[derive(Debug, Clone)]
pub struct CapturedFace {
    pub face_image: EncodedImage,
    pub detection: Detection,
    pub face_count: usize,
}

impl CapturedFace {
    pub fn multiple_faces(&self) -> bool {
        self.face_count > 1
    }
}

/// Result of a successful registration.
///
/// `identity.images` lists the embedded images first, in capture order, then
/// the ones that failed. `images[0]` (the avatar) is therefore the first
/// image that embedded, which is not the first capture when that one failed.
#[derive(Debug, Clone)]
pub struct Registration {
    pub identity: Identity,
    pub embedded: usize,
    pub failed: usize,
}

/// Highest-similarity identity over every stored embedding. Ties keep the
/// first one seen, in store order.
pub fn best_match<'a>(probe: &[f32], identities: &'a [Identity]) -> FaceResult<Option<(&'a Identity, f32)>> {
    let mut best: Option<(&Identity, f32)> = None;
    for identity in identities {
        for stored in &identity.embeddings {
            let similarity = cosine_similarity(probe, stored)?;
            if best.map_or(true, |(_, s)| similarity > s) {
                best = Some((identity, similarity));
            }
        }
    }
    Ok(best)
}

pub fn new_identity_id() -> String {
    format!("user_{}", Uuid::new_v4().simple())
}

/// Run a store mutation on the blocking pool; it serialises the whole
/// collection and writes it synchronously.
async fn with_store<T, F>(store: &Arc<FaceStore>, f: F) -> FaceResult<T>
where
    F: FnOnce(&FaceStore) -> FaceResult<T> + Send + 'static,
    T: Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| FaceError::storage("face store task failed", e.into()))?
}

fn enter(stage: RecognitionStage) {
    debug!(stage = ?stage, "recognition");
}

/// Capture, detect, embed and compare against the face store.
pub struct Recognizer {
    detector: Arc<dyn Detector>,
    extractor: Arc<dyn FeatureExtractor>,
    store: Arc<FaceStore>,
    settings: RecognitionSettings,
}

impl Recognizer {
    pub fn new(
        detector: Arc<dyn Detector>,
        extractor: Arc<dyn FeatureExtractor>,
        store: Arc<FaceStore>,
        settings: RecognitionSettings,
    ) -> Self {
        Self { detector, extractor, store, settings }
    }

    pub fn store(&self) -> &Arc<FaceStore> {
        &self.store
    }

    pub fn settings(&self) -> RecognitionSettings {
        self.settings
    }

    pub fn extractor_ready(&self) -> bool {
        self.extractor.is_ready()
    }

    fn ensure_extractor_ready(&self) -> FaceResult<()> {
        if self.extractor.is_ready() {
            Ok(())
        } else {
            Err(FaceError::ProcessingFailed("feature extraction model is not loaded".to_string()))
        }
    }

    async fn detect_best_face(&self, frame: &VideoFrame) -> FaceResult<CapturedFace> {
        enter(RecognitionStage::Detecting);
        let captured = capture::capture(frame, self.detector.as_ref(), self.settings.detection_confidence).await?;
        let face_count = captured.all_detections.len();
        let detection = match captured.best_detection {
            Some(d) => d,
            None => {
                enter(RecognitionStage::NoFace);
                return Err(FaceError::NoFaceDetected);
            }
        };
        let face_image = capture::extract_face_region(&captured.image, &detection)?;
        Ok(CapturedFace { face_image, detection, face_count })
    }

    /// Detect and crop the best face in `frame` without touching the store.
    pub async fn capture_face(&self, frame: &VideoFrame) -> FaceResult<CapturedFace> {
        let face = self.detect_best_face(frame).await?;
        info!(
            "Face captured (confidence {:.0}%, {} in frame)",
            face.detection.confidence * 100.0,
            face.face_count
        );
        Ok(face)
    }

    pub async fn recognize(&self, frame: &VideoFrame) -> FaceResult<RecognitionOutcome> {
        self.recognize_with_threshold(frame, self.settings.match_threshold).await
    }

    /// Identify the most confident face in `frame`.
    ///
    /// `Err(NoFaceDetected)` when the detector finds nothing; the model is
    /// not called in that case. A match requires similarity `> threshold`.
    pub async fn recognize_with_threshold(&self, frame: &VideoFrame, threshold: f32) -> FaceResult<RecognitionOutcome> {
        if !threshold.is_finite() {
            return Err(FaceError::InvalidArgument(format!("invalid match threshold {}", threshold)));
        }
        self.ensure_extractor_ready()?;
        enter(RecognitionStage::Capturing);
        let face = self.detect_best_face(frame).await?;

        enter(RecognitionStage::Embedding);
        let probe = embed::embed_one(&face.face_image, self.extractor.as_ref(), EmbedOptions::default())
            .await
            .map_err(|e| FaceError::processing("failed to embed captured face", e))?;

        enter(RecognitionStage::Comparing);
        let identities = self.store.snapshot();
        let best = best_match(&probe, &identities)?;
        match best {
            Some((identity, similarity)) if similarity > threshold => {
                enter(RecognitionStage::Matched);
                info!("Recognized {} ({}) with similarity {:.3}", identity.name, identity.role, similarity);
                Ok(RecognitionOutcome::Matched {
                    identity: identity.clone(),
                    similarity,
                    face_image: face.face_image,
                })
            }
            other => {
                enter(RecognitionStage::Unmatched);
                let best_similarity = other.map(|(_, s)| s);
                info!("No match above {:.2} (best {:?})", threshold, best_similarity);
                Ok(RecognitionOutcome::Unmatched { best_similarity, face_image: face.face_image })
            }
        }
    }

    /// Embed `images` and add a new identity to the store.
    ///
    /// Succeeds as long as at least one image embedded; images that failed
    /// are kept after the embedded ones. The store write starts only after
    /// every embedding is done, so dropping this future while embedding adds
    /// nothing. Once started, the write runs to completion.
    pub async fn register<F>(&self, name: &str, role: Role, images: Vec<EncodedImage>, on_progress: F) -> FaceResult<Registration>
    where
        F: FnMut(f32) + Send,
    {
        let name = name.trim();
        if name.is_empty() {
            return Err(FaceError::InvalidArgument("name must not be empty".to_string()));
        }
        if images.is_empty() {
            return Err(FaceError::InvalidArgument("at least one image is required".to_string()));
        }
        self.ensure_extractor_ready()?;

        let total = images.len();
        let embedded = embed::generate_embeddings_indexed(&images, self.extractor.as_ref(), on_progress).await;
        if embedded.is_empty() {
            return Err(FaceError::ProcessingFailed(format!(
                "none of the {} images could be embedded",
                total
            )));
        }

        let mut slots: Vec<Option<EncodedImage>> = images.into_iter().map(Some).collect();
        let mut ordered = Vec::with_capacity(total);
        let mut embeddings = Vec::with_capacity(embedded.len());
        for (idx, embedding) in embedded {
            if let Some(img) = slots[idx].take() {
                ordered.push(img);
                embeddings.push(embedding);
            }
        }
        ordered.extend(slots.into_iter().flatten());

        let identity = Identity {
            id: new_identity_id(),
            name: name.to_string(),
            role,
            images: ordered,
            embeddings,
        };
        let registration = Registration {
            embedded: identity.embeddings.len(),
            failed: total - identity.embeddings.len(),
            identity,
        };
        let identity = registration.identity.clone();
        with_store(&self.store, move |store| store.insert(identity)).await?;
        info!(
            "Registered {} ({}) as {}: {} of {} images embedded",
            registration.identity.name,
            registration.identity.role,
            registration.identity.id,
            registration.embedded,
            total
        );
        Ok(registration)
    }

    /// Remove an identity; unknown ids are a no-op.
    pub async fn delete(&self, id: &str) -> FaceResult<bool> {
        let id = id.to_string();
        with_store(&self.store, move |store| store.delete(&id)).await
    }
}
