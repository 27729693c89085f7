//! Parameter stream layout and interpolation weight vectors.

use core::ops::{Index, IndexMut};

/// Number of emitting HMM states per label.
pub const NUM_STATES: usize = 5;

/// Number of acoustic parameter streams (mgc, lf0, lpf).
pub const NUM_STREAMS: usize = 3;

/// One weight per stream plus one for duration.
pub const NUM_WEIGHTS: usize = NUM_STREAMS + 1;

/// Index of the duration entry in an [`InterpolationWeights`] vector.
pub const DURATION_WEIGHT: usize = NUM_STREAMS;

/// Acoustic parameter stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamKind {
    /// Mel-generalized cepstrum (spectral envelope).
    Mgc,
    /// Log fundamental frequency. Multi-space: frames may be unvoiced.
    Lf0,
    /// Low-pass filter coefficients for the excitation.
    Lpf,
}

impl StreamKind {
    pub const ALL: [StreamKind; NUM_STREAMS] = [StreamKind::Mgc, StreamKind::Lf0, StreamKind::Lpf];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            StreamKind::Mgc => 0,
            StreamKind::Lf0 => 1,
            StreamKind::Lpf => 2,
        }
    }

    /// Whether frames of this stream carry a voiced/unvoiced decision.
    #[inline]
    pub fn is_msd(self) -> bool {
        matches!(self, StreamKind::Lf0)
    }

    pub fn name(self) -> &'static str {
        match self {
            StreamKind::Mgc => "mgc",
            StreamKind::Lf0 => "lf0",
            StreamKind::Lpf => "lpf",
        }
    }
}

/// Full weight on every stream; what a lone engine contributes.
pub const FULL_WEIGHTS: InterpolationWeights = InterpolationWeights::uniform(1.0);

/// Per-stream interpolation weights of one engine, plus the duration weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationWeights([f64; NUM_WEIGHTS]);

impl InterpolationWeights {
    /// Every entry set to `value`.
    pub const fn uniform(value: f64) -> Self {
        Self([value; NUM_WEIGHTS])
    }

    /// Full weight on every stream; the non-interpolated case.
    pub fn full() -> Self {
        FULL_WEIGHTS
    }

    pub fn zero() -> Self {
        Self::uniform(0.0)
    }

    pub fn from_array(weights: [f64; NUM_WEIGHTS]) -> Self {
        Self(weights)
    }

    #[inline]
    pub fn stream(&self, stream: StreamKind) -> f64 {
        self.0[stream.index()]
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.0[DURATION_WEIGHT]
    }

    pub fn set_stream(&mut self, stream: StreamKind, value: f64) {
        self.0[stream.index()] = value;
    }

    pub fn set_duration(&mut self, value: f64) {
        self.0[DURATION_WEIGHT] = value;
    }

    pub fn as_array(&self) -> &[f64; NUM_WEIGHTS] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().copied()
    }
}

impl Default for InterpolationWeights {
    fn default() -> Self {
        Self::full()
    }
}

impl Index<usize> for InterpolationWeights {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl IndexMut<usize> for InterpolationWeights {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.0[index]
    }
}

impl From<[f64; NUM_WEIGHTS]> for InterpolationWeights {
    fn from(weights: [f64; NUM_WEIGHTS]) -> Self {
        Self(weights)
    }
}
