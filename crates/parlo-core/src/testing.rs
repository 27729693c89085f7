//! Deterministic engines and vocoders for tests.
//!
//! Available to other crates with the `test-util` feature.

use crate::engine::{AcousticEngine, DeltaWindows, Gaussian, GvPdf, StatePdf};
use crate::label::Label;
use crate::queue::Frame;
use crate::stream::{StreamKind, NUM_STATES, NUM_STREAMS};
use crate::vocoder::{Vocoder, VocoderControls};
use parking_lot::Mutex;
use std::sync::Arc;

/// Engine returning the same pdfs for every label.
#[derive(Debug, Clone)]
pub struct FixedEngine {
    duration: Gaussian,
    orders: [usize; NUM_STREAMS],
    means: [f64; NUM_STREAMS],
    variance: f64,
    voiced_weight: f64,
    gv: Option<f64>,
    windows: DeltaWindows,
}

impl Default for FixedEngine {
    fn default() -> Self {
        Self {
            duration: Gaussian::new(3.0, 1.0),
            orders: [4, 1, 2],
            means: [0.5, 5.0, 0.1],
            variance: 0.1,
            voiced_weight: 1.0,
            gv: None,
            windows: DeltaWindows::standard(),
        }
    }
}

impl FixedEngine {
    /// Mean duration of every state, in frames.
    pub fn with_duration_mean(mut self, mean: f64) -> Self {
        self.duration.mean = mean;
        self
    }

    pub fn with_order(mut self, stream: StreamKind, order: usize) -> Self {
        self.orders[stream.index()] = order;
        self
    }

    /// Static mean of every dimension of `stream`.
    pub fn with_stream_mean(mut self, stream: StreamKind, mean: f64) -> Self {
        self.means[stream.index()] = mean;
        self
    }

    /// Voiced weight of the lf0 pdfs.
    pub fn with_voiced_weight(mut self, weight: f64) -> Self {
        self.voiced_weight = weight;
        self
    }

    /// Global variance of every dimension of every stream.
    pub fn with_global_variance(mut self, gv: f64) -> Self {
        self.gv = Some(gv);
        self
    }
}

impl AcousticEngine for FixedEngine {
    fn duration(&self, _label: &Label) -> [Gaussian; NUM_STATES] {
        [self.duration; NUM_STATES]
    }

    fn parameters(&self, _label: &Label, stream: StreamKind) -> Vec<StatePdf> {
        let order = self.order(stream);
        let windows = self.windows.len();
        let mut mean = vec![0.0; order * windows];
        mean[..order].fill(self.means[stream.index()]);
        let variance = vec![self.variance; order * windows];

        let voiced_weight = if stream.is_msd() { self.voiced_weight } else { 1.0 };
        vec![StatePdf::new(mean, variance).with_voiced_weight(voiced_weight); NUM_STATES]
    }

    fn global_variance(&self, _label: &Label, stream: StreamKind) -> Option<GvPdf> {
        self.gv.map(|gv| GvPdf {
            mean: vec![gv; self.order(stream)],
            variance: vec![1.0; self.order(stream)],
        })
    }

    fn order(&self, stream: StreamKind) -> usize {
        self.orders[stream.index()]
    }

    fn windows(&self) -> &DeltaWindows {
        &self.windows
    }
}

#[derive(Debug, Default)]
struct VocoderLog {
    frames: Vec<Frame>,
    resets: usize,
}

/// Read-only view of what a [`RecordingVocoder`] received.
#[derive(Clone)]
pub struct VocoderRecord {
    log: Arc<Mutex<VocoderLog>>,
}

impl VocoderRecord {
    pub fn frames_pushed(&self) -> usize {
        self.log.lock().frames.len()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.log.lock().frames.clone()
    }

    pub fn resets(&self) -> usize {
        self.log.lock().resets
    }
}

/// Vocoder that records pushed frames and pops a constant raw sample.
pub struct RecordingVocoder {
    raw: f64,
    always_ready: bool,
    has_frame: bool,
    controls: VocoderControls,
    log: Arc<Mutex<VocoderLog>>,
}

impl RecordingVocoder {
    /// Ready once a frame has been pushed.
    pub fn new(raw: f64) -> (Self, VocoderRecord) {
        Self::build(raw, false)
    }

    /// Ready from the start.
    pub fn always_ready(raw: f64) -> (Self, VocoderRecord) {
        Self::build(raw, true)
    }

    fn build(raw: f64, always_ready: bool) -> (Self, VocoderRecord) {
        let log = Arc::new(Mutex::new(VocoderLog::default()));
        let vocoder = Self {
            raw,
            always_ready,
            has_frame: false,
            controls: VocoderControls::default(),
            log: Arc::clone(&log),
        };
        (vocoder, VocoderRecord { log })
    }
}

impl Vocoder for RecordingVocoder {
    fn ready(&self) -> bool {
        self.always_ready || self.has_frame
    }

    fn pop(&mut self) -> f64 {
        self.raw
    }

    fn push(&mut self, frame: Frame) {
        self.has_frame = true;
        self.log.lock().frames.push(frame);
    }

    fn reset(&mut self) {
        self.has_frame = false;
        self.controls = VocoderControls::default();
        self.log.lock().resets += 1;
    }

    fn controls(&self) -> &VocoderControls {
        &self.controls
    }

    fn controls_mut(&mut self) -> &mut VocoderControls {
        &mut self.controls
    }
}
