//! Acoustic engine boundary.
//!
//! An engine is a loaded acoustic model: given a full-context [`Label`] it
//! returns per-state duration and parameter distributions. The model file
//! format and the decision-tree lookup live behind [`AcousticEngine`]; this
//! crate only blends and smooths what engines return.

use crate::label::Label;
use crate::stream::{InterpolationWeights, StreamKind, NUM_STATES};

/// Scalar Gaussian (duration pdf of one state).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Gaussian {
    pub mean: f64,
    pub variance: f64,
}

impl Gaussian {
    pub fn new(mean: f64, variance: f64) -> Self {
        Self { mean, variance }
    }
}

/// Output distribution of one HMM state for one stream.
///
/// `mean` and `variance` hold `order * windows` entries, window-major:
/// static features first, then each dynamic window in turn.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatePdf {
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
    /// Voiced-space weight for multi-space streams; `1.0` elsewhere.
    pub voiced_weight: f64,
}

impl StatePdf {
    pub fn new(mean: Vec<f64>, variance: Vec<f64>) -> Self {
        Self {
            mean,
            variance,
            voiced_weight: 1.0,
        }
    }

    pub fn with_voiced_weight(mut self, weight: f64) -> Self {
        self.voiced_weight = weight;
        self
    }

    /// Zeroed accumulator of the given width.
    pub(crate) fn zeros(len: usize) -> Self {
        Self {
            mean: vec![0.0; len],
            variance: vec![0.0; len],
            voiced_weight: 0.0,
        }
    }
}

/// Global variance distribution of the static features of one stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GvPdf {
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
}

/// A regression window used to compute one dynamic feature.
///
/// `coefficients[k]` multiplies the frame at offset `k - half_width()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    coefficients: Vec<f64>,
}

impl Window {
    /// Coefficients centered on the current frame; the length must be odd.
    pub fn new(coefficients: Vec<f64>) -> Self {
        debug_assert!(coefficients.len() % 2 == 1, "window length must be odd");
        Self { coefficients }
    }

    #[inline]
    pub fn half_width(&self) -> usize {
        self.coefficients.len() / 2
    }

    /// `(offset, coefficient)` pairs with zero coefficients skipped.
    pub fn taps(&self) -> impl Iterator<Item = (isize, f64)> + '_ {
        let half = self.half_width() as isize;
        self.coefficients
            .iter()
            .enumerate()
            .filter(|(_, c)| **c != 0.0)
            .map(move |(k, c)| (k as isize - half, *c))
    }
}

/// The static window followed by the dynamic windows of an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaWindows {
    windows: Vec<Window>,
}

impl DeltaWindows {
    pub fn new(windows: Vec<Window>) -> Self {
        Self { windows }
    }

    /// Static, delta `[-0.5, 0, 0.5]` and delta-delta `[1, -2, 1]`.
    pub fn standard() -> Self {
        Self::new(vec![
            Window::new(vec![1.0]),
            Window::new(vec![-0.5, 0.0, 0.5]),
            Window::new(vec![1.0, -2.0, 1.0]),
        ])
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Window> {
        self.windows.iter()
    }

    /// Widest half-width over all windows.
    pub fn max_half_width(&self) -> usize {
        self.windows.iter().map(Window::half_width).max().unwrap_or(0)
    }
}

impl Default for DeltaWindows {
    fn default() -> Self {
        Self::standard()
    }
}

/// A loaded acoustic model.
///
/// Engines are owned by the registry and only borrowed for the duration of a
/// single computation pass.
pub trait AcousticEngine: Send {
    /// Duration pdf (in frames) of each emitting state.
    fn duration(&self, label: &Label) -> [Gaussian; NUM_STATES];

    /// One output pdf per emitting state for `stream`.
    fn parameters(&self, label: &Label, stream: StreamKind) -> Vec<StatePdf>;

    /// Global variance of `stream`, if the model carries one.
    fn global_variance(&self, label: &Label, stream: StreamKind) -> Option<GvPdf>;

    /// Static feature order of `stream`.
    fn order(&self, stream: StreamKind) -> usize;

    /// Regression windows used to build the dynamic features.
    fn windows(&self) -> &DeltaWindows;

    /// Repair weights this engine cannot use. The default clears entries that
    /// are negative or not finite.
    fn check_interpolation_weights(&self, weights: &mut InterpolationWeights) {
        for i in 0..crate::stream::NUM_WEIGHTS {
            if !weights[i].is_finite() || weights[i] < 0.0 {
                weights[i] = 0.0;
            }
        }
    }
}

/// One `(engine, weights)` pair taking part in a blend.
#[derive(Clone, Copy)]
pub struct BlendSource<'a> {
    pub engine: &'a dyn AcousticEngine,
    pub weights: &'a InterpolationWeights,
}

impl<'a> BlendSource<'a> {
    pub fn new(engine: &'a dyn AcousticEngine, weights: &'a InterpolationWeights) -> Self {
        Self { engine, weights }
    }
}

impl core::fmt::Debug for BlendSource<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlendSource")
            .field("weights", self.weights)
            .finish_non_exhaustive()
    }
}
