//! Synthesis controller: label → model → window → frames → samples.
//!
//! The controller is two halves. [`Pipeline`] is the control side: it owns
//! the label and model queues and the producer end of the frame queue, and
//! runs one [`tick`](Pipeline::tick) per control period. [`SampleDriver`] is
//! the audio side. [`SynthesisController`] holds both for single-threaded
//! use; [`SynthesisController::into_split`] hands them to separate threads.

use crate::action::Action;
use crate::args::{EngineArgs, EngineLoader};
use crate::config::SynthesisConfig;
use crate::engine::{AcousticEngine, DeltaWindows};
use crate::label::Label;
use crate::model::{DurationOverride, Model};
use crate::queue::{frame_channel, FrameProducer, LabelQueue, LabelSender, ModelQueue};
use crate::registry::{AddOutcome, RegistryHandle};
use crate::sample::{audio_link, AudioCommand, AudioLink, SampleDriver};
use crate::stream::{InterpolationWeights, NUM_STATES};
use crate::vocoder::Vocoder;
use crate::Result;
use std::collections::HashMap;
use std::path::Path;

/// What one [`Pipeline::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No label arrived within the poll timeout.
    Idle,
    /// No engine is registered. The label queue was not touched.
    NotReady,
    /// A model was queued but the window is not full yet.
    Buffered,
    /// A window was optimized and the frames of the model at offset
    /// `window` were generated.
    Processed { frames_emitted: usize, window: usize },
    /// The frame queue has no room for the frames this tick would emit.
    /// Nothing was generated; the next tick retries the same model.
    FrameQueueFull,
}

/// Mutable control state of the pipeline.
#[derive(Debug, Clone)]
pub struct ControllerState {
    label: Label,
    label_speed: f64,
    duration_override: DurationOverride,
    interpolate: bool,
    startup: bool,
    current_duration: usize,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            label: Label::default(),
            label_speed: 1.0,
            duration_override: DurationOverride::none(),
            interpolate: false,
            startup: true,
            current_duration: 0,
        }
    }

    fn reset(&mut self) {
        self.label_speed = 1.0;
        self.duration_override = DurationOverride::none();
        self.interpolate = false;
        self.startup = true;
    }

    /// Last dequeued label, with its effective speed.
    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn label_speed(&self) -> f64 {
        self.label_speed
    }

    pub fn duration_override(&self) -> &DurationOverride {
        &self.duration_override
    }

    pub fn is_interpolating(&self) -> bool {
        self.interpolate
    }

    /// Whether the startup window has yet to run.
    pub fn startup_pending(&self) -> bool {
        self.startup
    }
}

/// What [`Pipeline::teardown`] and [`SynthesisController::teardown`] released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TeardownReport {
    pub labels_dropped: usize,
    pub models_dropped: usize,
    pub frames_dropped: usize,
    pub engines_released: usize,
}

/// Control side of the controller.
pub struct Pipeline {
    config: SynthesisConfig,
    labels: LabelQueue,
    models: ModelQueue,
    frames: FrameProducer,
    registry: RegistryHandle,
    state: ControllerState,
    held: Option<Model>,
    audio: AudioLink,
}

impl Pipeline {
    /// Run the pipeline once: dequeue a label, compute its model, queue it and
    /// generate frames if the window allows.
    ///
    /// The registry lock is held from model computation to the end of the
    /// window, so engines cannot change under the computation. When the frame
    /// queue cannot take the model this tick would emit, the computed model is
    /// held back and retried on the next tick before any new label.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if !self.registry.is_ready() {
            tracing::trace!("tick: no engine registered");
            return Ok(TickOutcome::NotReady);
        }
        let label = match self.held {
            Some(_) => None,
            None => match self.labels.pop() {
                Some(label) => Some(label),
                None => return Ok(TickOutcome::Idle),
            },
        };

        let registry_handle = self.registry.clone();
        let registry = registry_handle.lock();
        let model = match (self.held.take(), label) {
            (Some(model), _) => model,
            (None, Some(mut label)) => {
                label.set_speed(label.speed() * self.state.label_speed);
                self.state.label = label.clone();

                let Some(sources) = registry.blend_sources(self.state.interpolate) else {
                    tracing::warn!(
                        "Registry emptied before {} could be computed, label dropped",
                        label.query()
                    );
                    return Ok(TickOutcome::NotReady);
                };

                let ovr = std::mem::take(&mut self.state.duration_override);
                let mut model = Model::new(label);
                model.compute_duration(
                    &sources,
                    &ovr,
                    self.frame_period(),
                    self.config.max_state_frames,
                );
                model.compute_parameters(&sources);
                self.state.current_duration = model.total_frames();
                tracing::trace!(
                    "tick: {} -> {} frames",
                    model.label().query(),
                    model.total_frames()
                );
                model
            }
            (None, None) => return Ok(TickOutcome::Idle),
        };

        let needed = self.frames_to_emit(&model);
        if needed > self.frames.free_len() {
            tracing::trace!(
                "tick: frame queue has {} free, {} needed",
                self.frames.free_len(),
                needed
            );
            self.held = Some(model);
            return Ok(TickOutcome::FrameQueueFull);
        }
        self.models.push(model)?;

        let outcome = match registry.default_engine() {
            Some(engine) => self.run_window(engine.windows()),
            None => TickOutcome::Buffered,
        };
        drop(registry);
        Ok(outcome)
    }

    /// Offset of the model to emit once `len` models are queued.
    ///
    /// Steady state once more than `lookahead + backup` models are queued;
    /// before that, a single startup pass once more than `lookahead` are.
    fn window_offset(&self, len: usize) -> Option<usize> {
        let lookahead = self.config.lookahead;
        let backup = self.config.backup;
        if len > lookahead + backup {
            Some(backup)
        } else if len > lookahead && self.state.startup {
            Some(len - lookahead - 1)
        } else {
            None
        }
    }

    /// Frame queue room needed to queue `model` and run the window, capped at
    /// the queue capacity so an oversized model is not held forever.
    fn frames_to_emit(&self, model: &Model) -> usize {
        let len = self.models.len() + 1;
        let frames = match self.window_offset(len) {
            Some(offset) if offset + 1 == len => model.total_frames(),
            Some(offset) => self.models.get(offset).map_or(0, Model::total_frames),
            None => 0,
        };
        frames.min(self.frames.capacity())
    }

    fn run_window(&mut self, windows: &DeltaWindows) -> TickOutcome {
        let len = self.models.len();
        let Some(window) = self.window_offset(len) else {
            return TickOutcome::Buffered;
        };
        if len > self.config.lookahead + self.config.backup {
            self.state.startup = false;
        }

        self.models
            .optimize(windows, self.config.use_global_variance);
        let frames_emitted = self.models.generate(window, &mut self.frames);
        tracing::debug!(
            "window: {} models, emitted {} frames at offset {}",
            len,
            frames_emitted,
            window
        );
        if !self.state.startup {
            self.models.pop();
        }

        TickOutcome::Processed {
            frames_emitted,
            window,
        }
    }

    /// Seconds per frame at the default hop length.
    fn frame_period(&self) -> f64 {
        self.config.default_hop_length / self.config.sample_rate
    }

    pub fn push_label(&self, label: Label) -> Result<()> {
        self.labels.push(label)
    }

    /// Producer handle for a front-end thread.
    pub fn label_sender(&self) -> LabelSender {
        self.labels.sender()
    }

    pub fn pending_labels(&self) -> usize {
        self.labels.len()
    }

    pub fn queued_models(&self) -> usize {
        self.models.len()
    }

    /// Whether a computed model is waiting for room in the frame queue.
    pub fn has_held_model(&self) -> bool {
        self.held.is_some()
    }

    pub fn models(&self) -> &ModelQueue {
        &self.models
    }

    /// Change the hop length, clamped to `[1, 20 × default]`.
    ///
    /// [`Action::Synthetic`] and [`Action::NoAction`] restore the default.
    /// Returns the hop length now in effect.
    pub fn set_speed(&self, speed: f64, action: Action) -> f64 {
        let default = self.config.default_hop_length;
        let hop = action
            .apply(self.audio.hop_length(), speed)
            .filter(|hop| !hop.is_nan())
            .unwrap_or(default)
            .clamp(1.0, self.config.max_hop_length());
        self.audio.store_hop_length(hop);
        hop
    }

    pub fn hop_length(&self) -> f64 {
        self.audio.hop_length()
    }

    /// Change the state durations of the next model, once.
    pub fn set_duration(&mut self, values: [f64; NUM_STATES], action: Action) {
        self.state.duration_override = DurationOverride::new(action, values);
    }

    /// Length in frames of the most recently computed model.
    pub fn duration(&self) -> usize {
        self.state.current_duration
    }

    /// Multiplier applied to the speed of every dequeued label.
    pub fn set_label_speed(&mut self, speed: f64) {
        self.state.label_speed = speed;
    }

    pub fn label_speed(&self) -> f64 {
        self.state.label_speed
    }

    /// Blend every registered engine instead of using the default alone.
    pub fn set_interpolation(&mut self, enabled: bool) {
        self.state.interpolate = enabled;
    }

    pub fn is_interpolating(&self) -> bool {
        self.state.interpolate
    }

    /// Replace the weights of the named engines. Returns how many changed.
    pub fn set_interpolation_weights(
        &self,
        weights: &HashMap<String, InterpolationWeights>,
    ) -> usize {
        self.registry.set_weights(weights)
    }

    /// Set every interpolation weight to zero.
    pub fn clear_interpolation_weights(&self) {
        self.registry.zero_weights();
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    pub fn is_ready(&self) -> bool {
        self.registry.is_ready()
    }

    pub fn add_engine(&self, name: impl Into<String>, engine: Box<dyn AcousticEngine>) -> AddOutcome {
        self.registry.add(name, engine)
    }

    /// Load an engine from a configuration file. On failure the registry is
    /// unchanged and the controller stays usable.
    pub fn add_engine_from_file(
        &self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
        loader: &dyn EngineLoader,
    ) -> Result<AddOutcome> {
        self.registry
            .add_from_file(name, path, &self.config.args, loader)
    }

    pub fn add_engine_from_args(
        &self,
        name: impl Into<String>,
        args: &EngineArgs,
        loader: &dyn EngineLoader,
    ) -> Result<AddOutcome> {
        self.registry.add_from_args(name, args, loader)
    }

    pub fn remove_engine(&self, name: &str) -> bool {
        self.registry.remove(name)
    }

    pub fn set_default_engine(&self, name: &str) -> bool {
        self.registry.set_default(name)
    }

    pub fn default_engine(&self) -> Option<String> {
        self.registry.default_name()
    }

    /// Control-side handle to the audio side.
    pub fn audio(&self) -> &AudioLink {
        &self.audio
    }

    pub fn set_pitch(&self, pitch: f64, action: Action) -> Result<()> {
        self.audio.send(AudioCommand::SetPitch(pitch, action))
    }

    pub fn set_alpha(&self, alpha: f64) -> Result<()> {
        self.audio.send(AudioCommand::SetAlpha(alpha))
    }

    pub fn set_gamma(&self, gamma: f64) -> Result<()> {
        self.audio.send(AudioCommand::SetGamma(gamma))
    }

    pub fn set_pade_order(&self, order: usize) -> Result<()> {
        self.audio.send(AudioCommand::SetPadeOrder(order))
    }

    pub fn set_volume(&self, volume: f64) -> Result<()> {
        self.audio.send(AudioCommand::SetVolume(volume))
    }

    /// Discard user controls.
    ///
    /// Readiness is untouched. Weights go back to the default on every stream
    /// that carried weight. The audio side resets its counter and vocoder
    /// before its next sample.
    pub fn reset(&mut self) {
        self.state.reset();
        self.audio.store_hop_length(self.config.default_hop_length);
        self.registry.reset_weights();
        // A full command queue is logged by `send`; the reset still applies
        // here and the hop length is already restored.
        let _ = self.audio.send(AudioCommand::Reset);
        tracing::debug!("Controller reset");
    }

    pub fn reset_vocoder(&self) {
        let _ = self.audio.send(AudioCommand::ResetVocoder);
    }

    /// Release every queued label, model and engine.
    pub fn teardown(mut self) -> TeardownReport {
        let engines_released = self.registry.clear();
        let labels_dropped = self.labels.drain();
        let models_dropped = self.models.clear() + usize::from(self.held.take().is_some());
        let _ = self.audio.send(AudioCommand::Reset);
        self.state.reset();
        tracing::info!(
            "Pipeline torn down: {} labels, {} models, {} engines released",
            labels_dropped,
            models_dropped,
            engines_released
        );
        TeardownReport {
            labels_dropped,
            models_dropped,
            frames_dropped: 0,
            engines_released,
        }
    }
}

/// Control and audio sides of the synthesizer, driven from one thread.
pub struct SynthesisController {
    pipeline: Pipeline,
    driver: SampleDriver,
}

impl SynthesisController {
    /// Controller with its own, empty engine registry.
    pub fn new(config: SynthesisConfig, vocoder: Box<dyn Vocoder>) -> Result<Self> {
        let registry = RegistryHandle::new(config.default_interpolation_weight);
        Self::with_registry(config, vocoder, registry)
    }

    /// Controller over an existing registry, e.g. one shared with a loader
    /// thread.
    pub fn with_registry(
        config: SynthesisConfig,
        vocoder: Box<dyn Vocoder>,
        registry: RegistryHandle,
    ) -> Result<Self> {
        config.validate()?;

        let (producer, consumer) = frame_channel(config.frame_queue_capacity);
        let (audio, hop_length, commands) = audio_link(config.default_hop_length);

        let pipeline = Pipeline {
            labels: LabelQueue::new(config.label_queue_capacity, config.label_poll_timeout()),
            models: ModelQueue::new(config.model_queue_capacity),
            frames: producer,
            registry,
            state: ControllerState::new(),
            held: None,
            audio,
            config,
        };
        let driver = SampleDriver::new(consumer, vocoder, hop_length, commands);

        Ok(Self { pipeline, driver })
    }

    /// Separate the control side from the audio side.
    pub fn into_split(self) -> (Pipeline, SampleDriver) {
        (self.pipeline, self.driver)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    pub fn driver(&self) -> &SampleDriver {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut SampleDriver {
        &mut self.driver
    }

    pub fn tick(&mut self) -> Result<TickOutcome> {
        self.pipeline.tick()
    }

    pub fn push_label(&self, label: Label) -> Result<()> {
        self.pipeline.push_label(label)
    }

    pub fn update_samples(&mut self) {
        self.driver.update_samples();
    }

    pub fn pop_sample(&mut self) -> f64 {
        self.driver.pop_sample()
    }

    pub fn next_sample(&mut self) -> f64 {
        self.driver.next_sample()
    }

    pub fn fill(&mut self, buffer: &mut [f32]) {
        self.driver.fill(buffer);
    }

    pub fn set_speed(&self, speed: f64, action: Action) -> f64 {
        self.pipeline.set_speed(speed, action)
    }

    pub fn hop_length(&self) -> f64 {
        self.pipeline.hop_length()
    }

    pub fn set_duration(&mut self, values: [f64; NUM_STATES], action: Action) {
        self.pipeline.set_duration(values, action);
    }

    pub fn duration(&self) -> usize {
        self.pipeline.duration()
    }

    pub fn set_label_speed(&mut self, speed: f64) {
        self.pipeline.set_label_speed(speed);
    }

    pub fn set_interpolation(&mut self, enabled: bool) {
        self.pipeline.set_interpolation(enabled);
    }

    pub fn set_interpolation_weights(
        &self,
        weights: &HashMap<String, InterpolationWeights>,
    ) -> usize {
        self.pipeline.set_interpolation_weights(weights)
    }

    pub fn is_ready(&self) -> bool {
        self.pipeline.is_ready()
    }

    pub fn add_engine(&self, name: impl Into<String>, engine: Box<dyn AcousticEngine>) -> AddOutcome {
        self.pipeline.add_engine(name, engine)
    }

    pub fn add_engine_from_file(
        &self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
        loader: &dyn EngineLoader,
    ) -> Result<AddOutcome> {
        self.pipeline.add_engine_from_file(name, path, loader)
    }

    pub fn remove_engine(&self, name: &str) -> bool {
        self.pipeline.remove_engine(name)
    }

    pub fn set_default_engine(&self, name: &str) -> bool {
        self.pipeline.set_default_engine(name)
    }

    pub fn default_engine(&self) -> Option<String> {
        self.pipeline.default_engine()
    }

    pub fn pitch(&self) -> f64 {
        self.driver.vocoder().pitch()
    }

    pub fn set_pitch(&mut self, pitch: f64, action: Action) {
        self.driver.vocoder_mut().set_pitch(pitch, action);
    }

    pub fn alpha(&self) -> f64 {
        self.driver.vocoder().alpha()
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        self.driver.vocoder_mut().set_alpha(alpha);
    }

    pub fn gamma(&self) -> f64 {
        self.driver.vocoder().gamma()
    }

    pub fn set_gamma(&mut self, gamma: f64) {
        self.driver.vocoder_mut().set_gamma(gamma);
    }

    pub fn pade_order(&self) -> usize {
        self.driver.vocoder().pade_order()
    }

    pub fn set_pade_order(&mut self, order: usize) {
        self.driver.vocoder_mut().set_pade_order(order);
    }

    pub fn volume(&self) -> f64 {
        self.driver.vocoder().volume()
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.driver.vocoder_mut().set_volume(volume);
    }

    /// Full reset of both sides, applied immediately.
    pub fn reset(&mut self) {
        self.pipeline.reset();
        self.driver.apply_commands();
    }

    pub fn reset_vocoder(&mut self) {
        self.driver.vocoder_mut().reset();
    }

    /// Release every queue, engine and the vocoder state, in that order.
    pub fn teardown(self) -> TeardownReport {
        let Self { pipeline, mut driver } = self;
        let mut report = pipeline.teardown();
        report.frames_dropped = driver.drain_frames();
        driver.apply_commands();
        report
    }
}
