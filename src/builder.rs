//! Builder for configuring and constructing a [`Synthesizer`].

use crate::{Result, Synthesizer};
use parlo_core::{
    AcousticEngine, PulseVocoder, RegistryHandle, SampleDriver, SynthesisConfig,
    SynthesisController, Vocoder,
};
use std::path::Path;
use std::time::Duration;

/// Without a vocoder, the builder uses [`PulseVocoder`] at the configured
/// sample rate. Engines given here are registered in order before the control
/// thread starts; the first becomes the default.
///
/// # Example
///
/// ```ignore
/// use parlo::prelude::*;
///
/// let (synth, mut driver) = Synthesizer::builder()
///     .config_file("parlo.toml")?
///     .engine("slt", load_voice("voices/slt")?)
///     .build()?;
///
/// synth.push_label(Label::parse("x^sil-a+b=c")?)?;
///
/// // On the audio thread
/// driver.fill(&mut buffer);
/// ```
pub struct SynthesizerBuilder {
    config: SynthesisConfig,
    vocoder: Option<Box<dyn Vocoder>>,
    registry: Option<RegistryHandle>,
    engines: Vec<(String, Box<dyn AcousticEngine>)>,
    idle_wait: Duration,
}

impl Default for SynthesizerBuilder {
    fn default() -> Self {
        Self {
            config: SynthesisConfig::default(),
            vocoder: None,
            registry: None,
            engines: Vec::new(),
            idle_wait: Duration::from_millis(1),
        }
    }
}

impl SynthesizerBuilder {
    pub fn config(mut self, config: SynthesisConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the configuration from a TOML file.
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.config = SynthesisConfig::from_file(path)?;
        Ok(self)
    }

    pub fn vocoder(mut self, vocoder: Box<dyn Vocoder>) -> Self {
        self.vocoder = Some(vocoder);
        self
    }

    /// Share an existing registry, e.g. with an engine loader thread.
    pub fn registry(mut self, registry: RegistryHandle) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn engine(mut self, name: impl Into<String>, engine: Box<dyn AcousticEngine>) -> Self {
        self.engines.push((name.into(), engine));
        self
    }

    /// How long the control thread sleeps between ticks while no engine is
    /// registered.
    pub fn idle_wait(mut self, idle_wait: Duration) -> Self {
        self.idle_wait = idle_wait;
        self
    }

    /// Build a single-threaded controller instead of starting a thread.
    pub fn build_controller(self) -> Result<SynthesisController> {
        let SynthesizerBuilder {
            config,
            vocoder,
            registry,
            engines,
            ..
        } = self;

        let vocoder =
            vocoder.unwrap_or_else(|| Box::new(PulseVocoder::new(config.sample_rate)));
        let registry =
            registry.unwrap_or_else(|| RegistryHandle::new(config.default_interpolation_weight));
        let controller = SynthesisController::with_registry(config, vocoder, registry)?;
        for (name, engine) in engines {
            controller.add_engine(name, engine);
        }
        Ok(controller)
    }

    /// Start the control thread. The returned driver belongs on the audio
    /// thread.
    pub fn build(self) -> Result<(Synthesizer, SampleDriver)> {
        let idle_wait = self.idle_wait;
        let (pipeline, driver) = self.build_controller()?.into_split();
        let synth = Synthesizer::start(pipeline, idle_wait)?;
        Ok((synth, driver))
    }
}
