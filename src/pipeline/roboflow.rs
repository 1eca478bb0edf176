use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::{Detection, EncodedImage};
use crate::pipeline::capture::Detector;

pub const DEFAULT_API_URL: &str = "https://detect.roboflow.com";
pub const DEFAULT_MODEL: &str = "face-detection-mik1i/27";

#[derive(Debug, Deserialize)]
struct DetectionResponse {
    #[serde(default)]
    predictions: Vec<Detection>,
}

/// Face detection through Roboflow's hosted inference API.
pub struct RoboflowDetector {
    client: reqwest::Client,
    api_url: String,
    model: String,
    api_key: Option<String>,
}

impl RoboflowDetector {
    pub fn new(api_url: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        if api_key.is_none() {
            warn!("No detector API key configured; detection requests will likely be rejected");
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            model: model.trim_matches('/').to_string(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/{}", self.api_url, self.model)
    }
}

#[async_trait]
impl Detector for RoboflowDetector {
    async fn detect(&self, image: &EncodedImage, confidence_threshold: f32) -> Result<Vec<Detection>> {
        let url = self.endpoint();
        let confidence = (confidence_threshold.clamp(0.0, 1.0) * 100.0).round() as u32;
        let mut query: Vec<(&str, String)> = vec![("confidence", confidence.to_string())];
        if let Some(key) = &self.api_key {
            query.push(("api_key", key.clone()));
        }
        let response = self
            .client
            .post(&url)
            .query(&query)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(image.to_base64())
            .send()
            .await
            .context(format!("Detection request to {} failed", url))?;
        if !response.status().is_success() {
            anyhow::bail!("Detection request failed: HTTP {}", response.status());
        }
        let parsed: DetectionResponse = response.json().await.context("Failed to parse detection response")?;
        let total = parsed.predictions.len();
        let detections: Vec<Detection> = parsed
            .predictions
            .into_iter()
            .filter(|d| d.confidence >= confidence_threshold)
            .collect();
        debug!("Detector returned {} predictions, {} above {:.2}", total, detections.len(), confidence_threshold);
        Ok(detections)
    }
}
