//! Test helpers and fixtures for parlo integration tests
//!
//! Everything runs without audio hardware: engines are fixed, vocoders record
//! what they receive, and the audio side is driven sample by sample.

#![allow(dead_code)]

use parlo::prelude::*;
use parlo_core::testing::{FixedEngine, RecordingVocoder, VocoderRecord};
use std::time::{Duration, Instant};

/// Frames per label with the default [`FixedEngine`] (5 states x 3 frames).
pub const FRAMES_PER_LABEL: usize = 15;

/// Small hop so sample-driven tests stay short.
pub const TEST_HOP_LENGTH: f64 = 4.0;

/// Longest wait for the control thread in threaded tests.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default config with a short hop.
pub fn test_config() -> SynthesisConfig {
    SynthesisConfig {
        default_hop_length: TEST_HOP_LENGTH,
        ..Default::default()
    }
}

pub fn fixed_engine() -> Box<dyn AcousticEngine> {
    Box::new(FixedEngine::default())
}

/// Single-threaded controller with one engine named "slt".
pub fn test_controller() -> (SynthesisController, VocoderRecord) {
    let (vocoder, record) = RecordingVocoder::new(1000.0);
    let controller = Synthesizer::builder()
        .config(test_config())
        .vocoder(Box::new(vocoder))
        .engine("slt", fixed_engine())
        .build_controller()
        .expect("Failed to create test controller");
    (controller, record)
}

/// Threaded synthesizer; no engine registered.
pub fn test_synthesizer() -> (Synthesizer, SampleDriver, VocoderRecord) {
    let (vocoder, record) = RecordingVocoder::new(1000.0);
    let (synth, driver) = Synthesizer::builder()
        .config(test_config())
        .vocoder(Box::new(vocoder))
        .build()
        .expect("Failed to start test synthesizer");
    (synth, driver, record)
}

/// Labels `l0`, `l1`, ...
pub fn labels(count: usize) -> Vec<Label> {
    (0..count).map(|i| Label::new(format!("l{i}"))).collect()
}

/// Poll `condition` until it holds or [`WAIT_TIMEOUT`] passes.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Install a tracing subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
