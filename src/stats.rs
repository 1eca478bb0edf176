use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

use crate::error::FaceError;

/// Process-wide recognition and registration counters.
pub struct Stats {
    recognitions: AtomicU64,
    matched: AtomicU64,
    unmatched: AtomicU64,
    no_face: AtomicU64,
    failed: AtomicU64,
    registrations: AtomicU64,
    registration_failures: AtomicU64,
    started: Instant,
    last_similarity: parking_lot::Mutex<Option<f32>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub recognitions: u64,
    pub matched: u64,
    pub unmatched: u64,
    pub no_face: u64,
    pub failed: u64,
    pub registrations: u64,
    pub registration_failures: u64,
    pub last_similarity: Option<f32>,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            recognitions: AtomicU64::new(0),
            matched: AtomicU64::new(0),
            unmatched: AtomicU64::new(0),
            no_face: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            registrations: AtomicU64::new(0),
            registration_failures: AtomicU64::new(0),
            started: Instant::now(),
            last_similarity: parking_lot::Mutex::new(None),
        }
    }

    pub fn record_match(&self, similarity: f32) {
        self.recognitions.fetch_add(1, Ordering::Relaxed);
        self.matched.fetch_add(1, Ordering::Relaxed);
        *self.last_similarity.lock() = Some(similarity);
    }

    pub fn record_unmatched(&self, best_similarity: Option<f32>) {
        self.recognitions.fetch_add(1, Ordering::Relaxed);
        self.unmatched.fetch_add(1, Ordering::Relaxed);
        *self.last_similarity.lock() = best_similarity;
    }

    /// Count a recognition that ended in an error. "No face" is tracked on
    /// its own since it is an expected outcome rather than a failure.
    pub fn record_recognition_error(&self, err: &FaceError) {
        self.recognitions.fetch_add(1, Ordering::Relaxed);
        match err {
            FaceError::NoFaceDetected => self.no_face.fetch_add(1, Ordering::Relaxed),
            _ => self.failed.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_registration(&self, ok: bool) {
        if ok {
            self.registrations.fetch_add(1, Ordering::Relaxed);
        } else {
            self.registration_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn uptime_secs(&self) -> u64 { self.started.elapsed().as_secs() }
    pub fn recognitions(&self) -> u64 { self.recognitions.load(Ordering::Relaxed) }
    pub fn last_similarity(&self) -> Option<f32> { *self.last_similarity.lock() }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.uptime_secs(),
            recognitions: self.recognitions(),
            matched: self.matched.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            no_face: self.no_face.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            registration_failures: self.registration_failures.load(Ordering::Relaxed),
            last_similarity: self.last_similarity(),
        }
    }

    // Counters only; uptime keeps running from process start
    pub fn reset_stats(&self) {
        for counter in [
            &self.recognitions,
            &self.matched,
            &self.unmatched,
            &self.no_face,
            &self.failed,
            &self.registrations,
            &self.registration_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self.last_similarity.lock() = None;
    }
}
