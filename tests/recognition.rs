mod common;

use std::sync::atomic::Ordering;

use common::{fixtures, harness};
use homeface_backend::error::FaceError;
use homeface_backend::models::Role;
use homeface_backend::pipeline::RecognitionOutcome;

#[tokio::test]
async fn test_no_face_skips_the_model() {
    let h = harness();
    h.detector.set(Vec::new());
    let err = h.recognizer.recognize(&fixtures::frame()).await.unwrap_err();
    assert!(matches!(err, FaceError::NoFaceDetected));
    assert_eq!(h.detector.calls(), 1);
    assert_eq!(h.extractor.calls(), 0);
}

#[tokio::test]
async fn test_low_confidence_faces_are_ignored() {
    let h = harness();
    h.detector.set(vec![fixtures::centred_face(0.3)]);
    let err = h.recognizer.recognize(&fixtures::frame()).await.unwrap_err();
    assert!(matches!(err, FaceError::NoFaceDetected));
}

#[tokio::test]
async fn test_identical_embedding_matches() {
    let h = harness();
    h.extractor.push(vec![0.2, 0.4, 0.6]);
    let reg = h.recognizer.register("Alice", Role::Owner, vec![fixtures::png(8, 8)], |_| {}).await.unwrap();

    h.extractor.push(vec![0.2, 0.4, 0.6]);
    let outcome = h.recognizer.recognize(&fixtures::frame()).await.unwrap();
    match outcome {
        RecognitionOutcome::Matched { identity, similarity, face_image } => {
            assert_eq!(identity.id, reg.identity.id);
            assert!(similarity > 0.999);
            assert!(!face_image.is_empty());
        }
        other => panic!("expected a match, got {:?}", other),
    }
}

#[tokio::test]
async fn test_similarity_equal_to_threshold_is_not_a_match() {
    let h = harness();
    h.extractor.push(vec![1.0, 0.0, 0.0, 0.0, 0.0]);
    h.recognizer.register("Bob", Role::Guest, vec![fixtures::png(8, 8)], |_| {}).await.unwrap();

    // cos = 3 / (1 * 4) = 0.75 exactly
    h.extractor.push(vec![3.0, 2.0, 1.0, 1.0, 1.0]);
    let outcome = h.recognizer.recognize(&fixtures::frame()).await.unwrap();
    assert!(outcome.identity().is_none());
    assert_eq!(outcome.best_similarity(), Some(0.75));
}

#[tokio::test]
async fn test_empty_store_is_unmatched() {
    let h = harness();
    h.extractor.push(vec![1.0, 0.0]);
    let outcome = h.recognizer.recognize(&fixtures::frame()).await.unwrap();
    assert!(matches!(outcome, RecognitionOutcome::Unmatched { best_similarity: None, .. }));
}

#[tokio::test]
async fn test_best_identity_wins() {
    let h = harness();
    h.extractor.push(vec![1.0, 0.0]);
    h.recognizer.register("East", Role::Guest, vec![fixtures::png(8, 8)], |_| {}).await.unwrap();
    h.extractor.push(vec![0.0, 1.0]);
    let north = h.recognizer.register("North", Role::Guest, vec![fixtures::png(8, 8)], |_| {}).await.unwrap();

    h.extractor.push(vec![0.1, 1.0]);
    let outcome = h.recognizer.recognize(&fixtures::frame()).await.unwrap();
    assert_eq!(outcome.identity().map(|i| i.id.as_str()), Some(north.identity.id.as_str()));
}

#[tokio::test]
async fn test_threshold_override() {
    let h = harness();
    h.extractor.push(vec![1.0, 0.0]);
    h.recognizer.register("Carol", Role::Owner, vec![fixtures::png(8, 8)], |_| {}).await.unwrap();

    // cos ~ 0.707
    h.extractor.push(vec![1.0, 1.0]);
    let outcome = h.recognizer.recognize_with_threshold(&fixtures::frame(), 0.5).await.unwrap();
    assert!(outcome.identity().is_some());

    let err = h.recognizer.recognize_with_threshold(&fixtures::frame(), f32::NAN).await.unwrap_err();
    assert!(matches!(err, FaceError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_detector_failure_is_processing_error() {
    let h = harness();
    h.detector.fail.store(true, Ordering::SeqCst);
    let err = h.recognizer.recognize(&fixtures::frame()).await.unwrap_err();
    assert!(matches!(err, FaceError::ProcessingFailed(_)));
    assert_eq!(h.extractor.calls(), 0);
}

#[tokio::test]
async fn test_extractor_failure_is_processing_error() {
    let h = harness();
    h.extractor.push_err("inference crashed");
    let err = h.recognizer.recognize(&fixtures::frame()).await.unwrap_err();
    assert!(matches!(err, FaceError::ProcessingFailed(_)));
}

#[tokio::test]
async fn test_model_not_ready() {
    let h = harness();
    h.extractor.ready.store(false, Ordering::SeqCst);
    let err = h.recognizer.recognize(&fixtures::frame()).await.unwrap_err();
    assert!(matches!(err, FaceError::ProcessingFailed(_)));
    assert_eq!(h.detector.calls(), 0);
}

#[tokio::test]
async fn test_capture_uses_most_confident_face() {
    let h = harness();
    h.detector.set(vec![
        fixtures::face(16.0, 16.0, 10.0, 0.6),
        fixtures::face(44.0, 40.0, 16.0, 0.95),
    ]);
    let face = h.recognizer.capture_face(&fixtures::frame()).await.unwrap();
    assert_eq!(face.face_count, 2);
    assert!(face.multiple_faces());
    assert_eq!(face.detection.confidence, 0.95);

    // 16px box padded 10% per side
    let crop = face.face_image.decode().unwrap();
    assert!(crop.width() >= 19 && crop.width() <= 21);
    assert!(h.store.is_empty());
    assert_eq!(h.extractor.calls(), 0);
}

#[tokio::test]
async fn test_face_outside_frame_is_rejected() {
    let h = harness();
    h.detector.set(vec![fixtures::face(500.0, 500.0, 20.0, 0.9)]);
    let err = h.recognizer.capture_face(&fixtures::frame()).await.unwrap_err();
    assert!(matches!(err, FaceError::InvalidArgument(_)));
}
