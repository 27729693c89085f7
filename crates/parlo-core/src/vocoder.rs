//! Vocoder boundary and a pulse/noise reference vocoder.

use crate::action::Action;
use crate::queue::Frame;

/// User-facing vocoder controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VocoderControls {
    /// Pitch control value (Hz for overwrite and shift, a factor for scale).
    pub pitch: f64,
    pub pitch_action: Action,
    /// All-pass constant of the frequency warping.
    pub alpha: f64,
    pub gamma: f64,
    /// Order of the Pade approximation of the exponential filter.
    pub pade_order: usize,
    /// Linear output gain.
    pub volume: f64,
}

impl Default for VocoderControls {
    fn default() -> Self {
        Self {
            pitch: 0.0,
            pitch_action: Action::Synthetic,
            alpha: 0.55,
            gamma: 0.0,
            pade_order: 5,
            volume: 1.0,
        }
    }
}

impl VocoderControls {
    /// F0 to synthesize for a frame whose generated F0 is `generated` Hz.
    pub fn effective_f0(&self, generated: f64) -> f64 {
        self.pitch_action
            .apply(generated, self.pitch)
            .unwrap_or(generated)
            .max(0.0)
    }
}

/// Turns frames into raw samples.
///
/// Samples are in 16-bit range; the sample driver scales them down. Control
/// accessors have default implementations over [`Vocoder::controls`].
pub trait Vocoder: Send {
    /// Whether a sample can be produced.
    fn ready(&self) -> bool;

    /// Next raw sample.
    fn pop(&mut self) -> f64;

    /// Hand over the next frame.
    fn push(&mut self, frame: Frame);

    /// Drop all DSP state and restore default controls.
    fn reset(&mut self);

    fn controls(&self) -> &VocoderControls;

    fn controls_mut(&mut self) -> &mut VocoderControls;

    fn pitch(&self) -> f64 {
        self.controls().pitch
    }

    fn set_pitch(&mut self, pitch: f64, action: Action) {
        let controls = self.controls_mut();
        controls.pitch = pitch;
        controls.pitch_action = action;
    }

    fn alpha(&self) -> f64 {
        self.controls().alpha
    }

    fn set_alpha(&mut self, alpha: f64) {
        self.controls_mut().alpha = alpha;
    }

    fn gamma(&self) -> f64 {
        self.controls().gamma
    }

    fn set_gamma(&mut self, gamma: f64) {
        self.controls_mut().gamma = gamma;
    }

    fn pade_order(&self) -> usize {
        self.controls().pade_order
    }

    fn set_pade_order(&mut self, order: usize) {
        self.controls_mut().pade_order = order;
    }

    fn volume(&self) -> f64 {
        self.controls().volume
    }

    fn set_volume(&mut self, volume: f64) {
        self.controls_mut().volume = volume;
    }
}

/// Peak raw amplitude of the reference vocoder.
const FULL_SCALE: f64 = 16384.0;

/// Reference vocoder: pulse train or white noise, shaped by a gain from the
/// 0th cepstral coefficient and a one-pole tilt filter driven by alpha.
///
/// No spectral envelope filter is applied.
pub struct PulseVocoder {
    sample_rate: f64,
    controls: VocoderControls,
    frame: Option<Frame>,
    phase: f64,
    tilt_state: f64,
    noise: u32,
}

impl PulseVocoder {
    const NOISE_SEED: u32 = 0x9E37_79B9;

    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            controls: VocoderControls::default(),
            frame: None,
            phase: 0.0,
            tilt_state: 0.0,
            noise: Self::NOISE_SEED,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Current frame, if any has been pushed since the last reset.
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Uniform noise in [-1, 1) from a xorshift generator.
    fn next_noise(&mut self) -> f64 {
        let mut x = self.noise;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.noise = x;
        (x as f64 / u32::MAX as f64) * 2.0 - 1.0
    }

    fn excitation(&mut self, f0: f64) -> f64 {
        if f0 <= 0.0 {
            return self.next_noise();
        }
        self.phase += f0 / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
            (self.sample_rate / f0).sqrt()
        } else {
            0.0
        }
    }
}

impl Vocoder for PulseVocoder {
    fn ready(&self) -> bool {
        self.frame.is_some()
    }

    fn pop(&mut self) -> f64 {
        let (gain, f0) = match self.frame.as_ref() {
            Some(frame) => (
                frame.mgc.first().copied().unwrap_or(0.0).exp(),
                self.controls.effective_f0(frame.f0()),
            ),
            None => return 0.0,
        };

        let x = gain * self.excitation(f0);
        let alpha = self.controls.alpha.clamp(-0.99, 0.99);
        self.tilt_state = x + alpha * self.tilt_state;
        let y = self.tilt_state * (1.0 - alpha.abs());

        self.controls.volume * y * FULL_SCALE
    }

    fn push(&mut self, frame: Frame) {
        self.frame = Some(frame);
    }

    fn reset(&mut self) {
        self.controls = VocoderControls::default();
        self.frame = None;
        self.phase = 0.0;
        self.tilt_state = 0.0;
        self.noise = Self::NOISE_SEED;
    }

    fn controls(&self) -> &VocoderControls {
        &self.controls
    }

    fn controls_mut(&mut self) -> &mut VocoderControls {
        &mut self.controls
    }
}
