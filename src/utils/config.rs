use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::roboflow;

pub const DEFAULT_MODEL_FILE: &str = "w600k_r50.onnx";
pub const DEFAULT_MODEL_URL: &str = "https://huggingface.co/maze/faceX/resolve/e010b5098c3685fd00b22dd2aec6f37320e3d850/w600k_r50.onnx";

#[derive(Clone, Debug)]
pub struct Config {
    pub data: PathBuf,
    pub port: u16,
    pub match_threshold: f32,
    pub detect_confidence: f32,
    pub detector_url: String,
    pub detector_model: String,
    pub detector_api_key: Option<String>,
    pub detector_timeout_secs: u64,
    pub model_file: String,
    pub model_url: String,
    pub model_auto_download: bool,
    pub use_gpu: bool,
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn unit_interval(key: &str, default: f32) -> f32 {
    parse_var::<f32>(key)
        .filter(|v| (0.0..=1.0).contains(v))
        .unwrap_or(default)
}

fn flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| match v.as_str() {
            "1" | "true" | "TRUE" => true,
            "0" | "false" | "FALSE" => false,
            _ => default,
        })
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let data = env::var("HOMEFACE_DATA").unwrap_or_else(|_| "/homeface-data".to_string());
        let port = parse_var::<u16>("HOMEFACE_PORT").unwrap_or(9170);
        let match_threshold = unit_interval("HOMEFACE_MATCH_THRESHOLD", 0.75);
        let detect_confidence = unit_interval("HOMEFACE_DETECT_CONFIDENCE", 0.5);
        let detector_url = env::var("HOMEFACE_DETECTOR_URL").unwrap_or_else(|_| roboflow::DEFAULT_API_URL.to_string());
        let detector_model = env::var("HOMEFACE_DETECTOR_MODEL").unwrap_or_else(|_| roboflow::DEFAULT_MODEL.to_string());
        let detector_api_key = env::var("HOMEFACE_DETECTOR_API_KEY").ok().filter(|k| !k.is_empty());
        let detector_timeout_secs = parse_var::<u64>("HOMEFACE_DETECTOR_TIMEOUT_SECS").filter(|v| *v > 0).unwrap_or(10);
        let model_file = env::var("HOMEFACE_MODEL_FILE").unwrap_or_else(|_| DEFAULT_MODEL_FILE.to_string());
        let model_url = env::var("HOMEFACE_MODEL_URL").unwrap_or_else(|_| DEFAULT_MODEL_URL.to_string());
        Self {
            data: PathBuf::from(data),
            port,
            match_threshold,
            detect_confidence,
            detector_url,
            detector_model,
            detector_api_key,
            detector_timeout_secs,
            model_file,
            model_url,
            model_auto_download: flag("HOMEFACE_MODEL_AUTO_DOWNLOAD", true),
            use_gpu: flag("HOMEFACE_USE_GPU", false),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data.join("db").join("homeface.db")
    }

    pub fn models_dir(&self) -> PathBuf {
        self.data.join("models")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.data.join("exports")
    }

    pub fn detector_timeout(&self) -> Duration {
        Duration::from_secs(self.detector_timeout_secs)
    }
}
