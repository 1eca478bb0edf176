#![allow(dead_code)]

pub mod fixtures;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use homeface_backend::db::{FaceStore, MemoryBlobStore};
use homeface_backend::models::{Detection, EncodedImage};
use homeface_backend::pipeline::embed::{EmbedOptions, FeatureExtractor};
use homeface_backend::pipeline::recognize::{RecognitionSettings, Recognizer};
use homeface_backend::pipeline::Detector;
use image::DynamicImage;
use parking_lot::Mutex;

/// Detector that always reports the same boxes, filtered by threshold.
#[derive(Default)]
pub struct FixedDetector {
    pub detections: Mutex<Vec<Detection>>,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl FixedDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections: Mutex::new(detections), ..Default::default() }
    }

    pub fn set(&self, detections: Vec<Detection>) {
        *self.detections.lock() = detections;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Detector for FixedDetector {
    async fn detect(&self, _image: &EncodedImage, confidence_threshold: f32) -> anyhow::Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("detector unreachable");
        }
        Ok(self
            .detections
            .lock()
            .iter()
            .filter(|d| d.confidence >= confidence_threshold)
            .cloned()
            .collect())
    }
}

/// Extractor that hands out queued results in call order.
pub struct ScriptedExtractor {
    script: Mutex<VecDeque<anyhow::Result<Vec<f32>>>>,
    pub calls: AtomicUsize,
    pub ready: AtomicBool,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            ready: AtomicBool::new(true),
        }
    }

    pub fn push(&self, embedding: Vec<f32>) {
        self.script.lock().push_back(Ok(embedding));
    }

    pub fn push_err(&self, msg: &str) {
        self.script.lock().push_back(Err(anyhow::anyhow!(msg.to_string())));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeatureExtractor for ScriptedExtractor {
    async fn embed(&self, _image: &DynamicImage, _options: EmbedOptions) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")))
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

pub struct Harness {
    pub detector: Arc<FixedDetector>,
    pub extractor: Arc<ScriptedExtractor>,
    pub blob: Arc<MemoryBlobStore>,
    pub store: Arc<FaceStore>,
    pub recognizer: Recognizer,
}

/// Recognizer over in-memory storage with one confident face in frame.
pub fn harness() -> Harness {
    let detector = Arc::new(FixedDetector::new(vec![fixtures::centred_face(0.9)]));
    let extractor = Arc::new(ScriptedExtractor::new());
    let blob = Arc::new(MemoryBlobStore::new());
    let store = Arc::new(FaceStore::open(blob.clone()).unwrap());
    let recognizer = Recognizer::new(
        detector.clone(),
        extractor.clone(),
        store.clone(),
        RecognitionSettings::default(),
    );
    Harness { detector, extractor, blob, store, recognizer }
}
