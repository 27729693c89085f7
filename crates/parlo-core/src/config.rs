//! Synthesis controller configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Upper bound of the hop length, as a multiple of the default.
pub const MAX_HOP_FACTOR: f64 = 20.0;

/// Configuration for the synthesis controller.
///
/// Every field has a default, so a TOML file only needs the values it changes:
///
/// ```toml
/// lookahead = 2
/// default_hop_length = 80.0
///
/// [args]
/// max_arguments = 64
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Pending labels held before pushes are rejected (default: 512)
    pub label_queue_capacity: usize,
    /// In-flight models; must exceed `lookahead + backup` (default: 8)
    pub model_queue_capacity: usize,
    /// Finalized frames waiting for the vocoder (default: 8192)
    pub frame_queue_capacity: usize,
    /// Models buffered ahead of the one being generated (default: 1)
    pub lookahead: usize,
    /// Already-generated models kept as smoothing context (default: 2)
    pub backup: usize,
    /// Samples between frame pulls (default: 240, 5ms @ 48kHz)
    pub default_hop_length: f64,
    /// Initial per-stream weight of a newly registered engine (default: 1.0)
    pub default_interpolation_weight: f64,
    /// Upper bound of one state's duration, in frames (default: 2000, 10s @ 5ms)
    pub max_state_frames: usize,
    /// Longest wait for a label on an empty queue, in microseconds (default: 100)
    pub label_poll_timeout_us: u64,
    /// Apply global variance scaling after parameter generation (default: true)
    pub use_global_variance: bool,
    /// Output sample rate handed to the reference vocoder (default: 48000)
    pub sample_rate: f64,
    /// Limits of the engine argument list
    pub args: ArgLimits,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            label_queue_capacity: 512,
            model_queue_capacity: 8,
            frame_queue_capacity: 8192,
            lookahead: 1,
            backup: 2,
            default_hop_length: 240.0,
            default_interpolation_weight: 1.0,
            max_state_frames: 2000,
            label_poll_timeout_us: 100,
            use_global_variance: true,
            sample_rate: 48000.0,
            args: ArgLimits::default(),
        }
    }
}

impl SynthesisConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.label_queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "label_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.model_queue_capacity <= self.lookahead + self.backup {
            return Err(Error::InvalidConfig(format!(
                "model_queue_capacity {} must exceed lookahead + backup ({})",
                self.model_queue_capacity,
                self.lookahead + self.backup
            )));
        }
        if self.frame_queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "frame_queue_capacity must be at least 1".to_string(),
            ));
        }
        if !self.default_hop_length.is_finite() || self.default_hop_length < 1.0 {
            return Err(Error::InvalidConfig(format!(
                "default_hop_length {} must be finite and >= 1",
                self.default_hop_length
            )));
        }
        if !self.default_interpolation_weight.is_finite() || self.default_interpolation_weight < 0.0
        {
            return Err(Error::InvalidConfig(format!(
                "default_interpolation_weight {} must be finite and non-negative",
                self.default_interpolation_weight
            )));
        }
        if self.max_state_frames == 0 {
            return Err(Error::InvalidConfig(
                "max_state_frames must be at least 1".to_string(),
            ));
        }
        if self.sample_rate < 8000.0 || self.sample_rate > 384000.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        self.args.validate()
    }

    /// Largest hop length `set_speed` will accept.
    pub fn max_hop_length(&self) -> f64 {
        self.default_hop_length * MAX_HOP_FACTOR
    }

    pub fn label_poll_timeout(&self) -> Duration {
        Duration::from_micros(self.label_poll_timeout_us)
    }
}

/// Bounds of the whitespace-tokenized engine argument list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArgLimits {
    /// Maximum number of tokens (default: 100)
    pub max_arguments: usize,
    /// Maximum token length in bytes (default: 1024)
    pub max_argument_len: usize,
}

impl Default for ArgLimits {
    fn default() -> Self {
        Self {
            max_arguments: 100,
            max_argument_len: 1024,
        }
    }
}

impl ArgLimits {
    pub fn validate(&self) -> Result<()> {
        if self.max_arguments == 0 || self.max_argument_len == 0 {
            return Err(Error::InvalidConfig(
                "argument limits must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
