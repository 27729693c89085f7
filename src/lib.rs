//! # Parlo - Reactive HMM Speech Synthesis
//!
//! Turns a stream of full-context labels into speech while the voice, speed,
//! pitch and timing are changed live.
//!
//! ## Architecture
//!
//! Parlo is an umbrella crate over:
//! - **parlo-core** - Label, model and frame queues, engine registry with
//!   interpolation weights, windowed parameter generation, sample delivery
//!
//! and adds a [`Synthesizer`] that runs the pipeline on its own control
//! thread while the [`SampleDriver`] feeds an audio callback.
//!
//! ## Quick Start
//!
//! ```ignore
//! use parlo::prelude::*;
//!
//! let (synth, mut driver) = Synthesizer::builder()
//!     .engine("slt", load_voice("voices/slt")?)
//!     .build()?;
//!
//! for line in front_end.labels() {
//!     synth.push_label(Label::parse(&line)?)?;
//! }
//!
//! // Audio callback
//! driver.fill(&mut buffer);
//!
//! // Live control
//! synth.set_speed(1.5 * synth.hop_length(), Action::Overwrite)?;
//! synth.set_pitch(2.0, Action::Shift)?;
//! ```

/// Re-export of parlo-core for direct access
pub use parlo_core as core;

pub use parlo_core::{
    AcousticEngine, Action, AddOutcome, ArgLimits, AudioCommand, AudioLink, DeltaWindows,
    DurationOverride, EngineArgs, EngineLoader, Frame, Gaussian, GvPdf, InterpolationWeights,
    Label, LabelSender, Pipeline, PulseVocoder, RegistryHandle, SampleDriver, StatePdf,
    StreamKind, SynthesisConfig, SynthesisController, TeardownReport, TickOutcome, Vocoder,
    VocoderControls, Window, NUM_STATES,
};

mod error;
pub use error::{Error, Result};

mod builder;
pub use builder::SynthesizerBuilder;

mod synthesizer;
pub use synthesizer::Synthesizer;

#[cfg(feature = "test-util")]
pub use parlo_core::testing;

pub mod prelude {
    pub use crate::{
        AcousticEngine, Action, AddOutcome, EngineArgs, EngineLoader, Error, Frame,
        InterpolationWeights, Label, PulseVocoder, RegistryHandle, Result, SampleDriver,
        StreamKind, SynthesisConfig, SynthesisController, Synthesizer, SynthesizerBuilder,
        TickOutcome, Vocoder,
    };
}
