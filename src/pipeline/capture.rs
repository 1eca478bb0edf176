use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use tracing::{debug, info};

use crate::error::{FaceError, FaceResult};
use crate::models::{Detection, EncodedImage};

// Crop padding: 20% of each box dimension, split evenly between both sides.
const REGION_PADDING: f32 = 0.2;

/// External face detector.
///
/// Only detections with `confidence >= confidence_threshold` may be returned;
/// callers do not filter again.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, image: &EncodedImage, confidence_threshold: f32) -> anyhow::Result<Vec<Detection>>;
}

/// A decoded camera frame.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    image: DynamicImage,
}

impl VideoFrame {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn from_encoded(encoded: &EncodedImage) -> FaceResult<Self> {
        let image = encoded
            .decode()
            .map_err(|e| FaceError::InvalidArgument(format!("frame is not a readable image: {:#}", e)))?;
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Render the frame to a JPEG still.
    pub fn still(&self) -> anyhow::Result<EncodedImage> {
        EncodedImage::encode(&self.image, ImageFormat::Jpeg)
    }
}

#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub image: EncodedImage,
    pub best_detection: Option<Detection>,
    /// All detections, highest confidence first.
    pub all_detections: Vec<Detection>,
}

impl CaptureResult {
    /// More than one face was in frame; the best one is used. Advisory only.
    pub fn multiple_faces(&self) -> bool {
        self.all_detections.len() > 1
    }
}

/// Render `frame` to a still, run the detector on it and pick the most
/// confident face.
pub async fn capture(
    frame: &VideoFrame,
    detector: &dyn Detector,
    confidence_threshold: f32,
) -> FaceResult<CaptureResult> {
    let image = frame
        .still()
        .map_err(|e| FaceError::processing("failed to render frame", e))?;
    let mut detections = detector
        .detect(&image, confidence_threshold)
        .await
        .map_err(|e| FaceError::processing("face detection failed", e))?;

    if detections.is_empty() {
        debug!(
            "No faces detected in {}x{} frame (threshold={:.2})",
            frame.width(),
            frame.height(),
            confidence_threshold
        );
        return Ok(CaptureResult { image, best_detection: None, all_detections: Vec::new() });
    }

    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if detections.len() > 1 {
        info!("Multiple faces detected ({}), using the highest-confidence one", detections.len());
    }
    let best_detection = detections.first().cloned();
    Ok(CaptureResult { image, best_detection, all_detections: detections })
}

/// Pixel rectangle `(x, y, width, height)` to crop for `det`: the box grown
/// by 10% per side, clamped to the image. `None` if nothing is left.
pub fn face_region(img_w: u32, img_h: u32, det: &Detection) -> Option<(u32, u32, u32, u32)> {
    if ![det.x, det.y, det.width, det.height].iter().all(|v| v.is_finite()) {
        return None;
    }
    let pad_w = det.width * REGION_PADDING / 2.0;
    let pad_h = det.height * REGION_PADDING / 2.0;
    let x0 = (det.left() - pad_w).floor().max(0.0);
    let y0 = (det.top() - pad_h).floor().max(0.0);
    let x1 = (det.right() + pad_w).ceil().min(img_w as f32);
    let y1 = (det.bottom() + pad_h).ceil().min(img_h as f32);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
}

/// Crop the face described by `det` out of `image`, re-encoded in the
/// input's format.
pub fn extract_face_region(image: &EncodedImage, det: &Detection) -> FaceResult<EncodedImage> {
    let format = image.format().unwrap_or(ImageFormat::Jpeg);
    let img = image
        .decode()
        .map_err(|e| FaceError::processing("failed to decode captured image", e))?;
    let (x, y, w, h) = face_region(img.width(), img.height(), det).ok_or_else(|| {
        FaceError::InvalidArgument(format!(
            "detection at ({:.0}, {:.0}) lies outside the {}x{} image",
            det.x,
            det.y,
            img.width(),
            img.height()
        ))
    })?;
    let crop = img.crop_imm(x, y, w, h);
    EncodedImage::encode(&crop, format).map_err(|e| FaceError::processing("failed to encode face crop", e))
}
