pub mod similarity;
pub mod embed;
pub mod capture;
pub mod recognize;
pub mod roboflow;
#[cfg(feature = "facial-recognition")]
pub mod onnx;

pub use capture::{Detector, VideoFrame};
pub use embed::FeatureExtractor;
pub use recognize::{RecognitionOutcome, RecognitionSettings, Recognizer};
