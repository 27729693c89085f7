//! Reactive HMM speech synthesis core.
//!
//! Turns a stream of full-context labels into vocoder frames and audio
//! samples, one label at a time, with acoustic engines that can be blended
//! and swapped while synthesis runs.
//!
//! # Primary API
//!
//! - [`SynthesisController`]: label queue, model window and sample delivery
//! - [`Pipeline`] / [`SampleDriver`]: the same, split across control and audio threads
//! - [`RegistryHandle`] / [`EngineRegistry`]: named engines and interpolation weights
//! - [`AcousticEngine`], [`Vocoder`], [`EngineLoader`]: collaborator boundaries
//! - [`SynthesisConfig`]: queue sizes, window shape, hop length
//!
//! # Example
//!
//! ```ignore
//! use parlo_core::prelude::*;
//!
//! let mut controller = SynthesisController::new(
//!     SynthesisConfig::default(),
//!     Box::new(PulseVocoder::new(48000.0)),
//! )?;
//! controller.add_engine("slt", load_voice("voices/slt")?);
//!
//! controller.push_label(Label::parse("x^sil-a+b=c")?)?;
//! controller.tick()?;
//!
//! let mut buffer = [0.0f32; 256];
//! controller.fill(&mut buffer);
//! ```

pub mod error;
pub use error::{Error, Result};

mod action;
pub use action::Action;

pub mod args;
pub use args::{EngineArgs, EngineLoader};

pub mod config;
pub use config::{ArgLimits, SynthesisConfig, MAX_HOP_FACTOR};

mod controller;
pub use controller::{ControllerState, Pipeline, SynthesisController, TeardownReport, TickOutcome};

pub mod engine;
pub use engine::{AcousticEngine, BlendSource, DeltaWindows, Gaussian, GvPdf, StatePdf, Window};

mod label;
pub use label::Label;

pub(crate) mod lockfree;
pub use lockfree::{AtomicDouble, AtomicFlag};

pub mod mlpg;

mod model;
pub use model::{DurationOverride, Model, StreamModel};

pub mod queue;
pub use queue::{Frame, FrameConsumer, FrameProducer, LabelQueue, LabelSender, ModelQueue};

pub mod registry;
pub use registry::{AddOutcome, EngineEntry, EngineRegistry, RegistryHandle};

mod sample;
pub use sample::{AudioCommand, AudioLink, SampleDriver};

pub mod stream;
pub use stream::{
    InterpolationWeights, StreamKind, DURATION_WEIGHT, FULL_WEIGHTS, NUM_STATES, NUM_STREAMS,
    NUM_WEIGHTS,
};

mod vocoder;
pub use vocoder::{PulseVocoder, Vocoder, VocoderControls};

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub mod prelude {
    pub use crate::{
        AcousticEngine, Action, AddOutcome, EngineArgs, EngineLoader, Error, Frame,
        InterpolationWeights, Label, Pipeline, PulseVocoder, RegistryHandle, Result,
        SampleDriver, StreamKind, SynthesisConfig, SynthesisController, TickOutcome, Vocoder,
    };
}
