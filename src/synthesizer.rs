//! Threaded synthesizer: the pipeline runs on its own control thread.
//!
//! The control thread owns the [`Pipeline`] and ticks it in a loop. The
//! caller keeps cheap handles to everything that is shared (label sender,
//! engine registry, audio link) and reaches the pipeline state through a
//! bounded command channel. The [`SampleDriver`] returned next to the
//! synthesizer belongs on the audio thread.

use crate::{Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parlo_core::{
    AcousticEngine, Action, AddOutcome, AtomicFlag, AudioCommand, AudioLink,
    InterpolationWeights, Label, LabelSender, Pipeline, RegistryHandle, TeardownReport,
    TickOutcome, NUM_STATES,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Pending control commands.
const CONTROL_COMMAND_CAPACITY: usize = 64;

enum ControlCommand {
    SetSpeed {
        speed: f64,
        action: Action,
        response_tx: Sender<f64>,
    },
    SetDuration([f64; NUM_STATES], Action),
    SetLabelSpeed(f64),
    SetInterpolation(bool),
    Duration {
        response_tx: Sender<usize>,
    },
    Reset,
    Shutdown {
        response_tx: Sender<TeardownReport>,
    },
}

enum Step {
    Continue,
    Stop(Option<Sender<TeardownReport>>),
}

/// Handle to a pipeline running on a background control thread.
///
/// Dropping the handle shuts the thread down and tears the pipeline down.
pub struct Synthesizer {
    cmd_tx: Sender<ControlCommand>,
    labels: LabelSender,
    registry: RegistryHandle,
    audio: AudioLink,
    running: Arc<AtomicFlag>,
    thread: Option<JoinHandle<()>>,
}

impl Synthesizer {
    pub fn builder() -> crate::SynthesizerBuilder {
        crate::SynthesizerBuilder::default()
    }

    /// Move `pipeline` onto a new control thread.
    ///
    /// While no engine is registered, or the frame queue is full, the thread
    /// sleeps up to `idle_wait` between ticks, waking early for commands.
    pub fn start(pipeline: Pipeline, idle_wait: Duration) -> Result<Self> {
        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(CONTROL_COMMAND_CAPACITY);
        let labels = pipeline.label_sender();
        let registry = pipeline.registry().clone();
        let audio = pipeline.audio().clone();
        let running = Arc::new(AtomicFlag::new(true));
        let running_clone = Arc::clone(&running);

        let thread = std::thread::Builder::new()
            .name("parlo-control".into())
            .spawn(move || {
                control_loop(pipeline, cmd_rx, idle_wait);
                running_clone.set(false);
            })
            .map_err(|e| Error::ControlThreadSpawn(e.to_string()))?;

        tracing::info!("Control thread started");
        Ok(Self {
            cmd_tx,
            labels,
            registry,
            audio,
            running,
            thread: Some(thread),
        })
    }

    pub fn push_label(&self, label: Label) -> Result<()> {
        Ok(self.labels.push(label)?)
    }

    /// Producer handle for a front-end thread.
    pub fn label_sender(&self) -> LabelSender {
        self.labels.clone()
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    pub fn add_engine(&self, name: impl Into<String>, engine: Box<dyn AcousticEngine>) -> AddOutcome {
        self.registry.add(name, engine)
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

    pub fn is_ready(&self) -> bool {
        self.registry.is_ready()
    }

    /// Replace the weights of the named engines. Returns how many changed.
    pub fn set_interpolation_weights(
        &self,
        weights: &HashMap<String, InterpolationWeights>,
    ) -> usize {
        self.registry.set_weights(weights)
    }

    pub fn clear_interpolation_weights(&self) {
        self.registry.zero_weights();
    }

    /// Change the hop length. Returns the clamped value now in effect.
    pub fn set_speed(&self, speed: f64, action: Action) -> Result<f64> {
        let (response_tx, response_rx) = crossbeam_channel::bounded(1);
        self.send(ControlCommand::SetSpeed {
            speed,
            action,
            response_tx,
        })?;
        response_rx
            .recv()
            .map_err(|_| Error::ControlThreadDisconnected)
    }

    pub fn hop_length(&self) -> f64 {
        self.audio.hop_length()
    }

    /// Change the state durations of the next model, once.
    pub fn set_duration(&self, values: [f64; NUM_STATES], action: Action) -> Result<()> {
        self.send(ControlCommand::SetDuration(values, action))
    }

    /// Length in frames of the most recently computed model.
    pub fn duration(&self) -> Result<usize> {
        let (response_tx, response_rx) = crossbeam_channel::bounded(1);
        self.send(ControlCommand::Duration { response_tx })?;
        response_rx
            .recv()
            .map_err(|_| Error::ControlThreadDisconnected)
    }

    pub fn set_label_speed(&self, speed: f64) -> Result<()> {
        self.send(ControlCommand::SetLabelSpeed(speed))
    }

    pub fn set_interpolation(&self, enabled: bool) -> Result<()> {
        self.send(ControlCommand::SetInterpolation(enabled))
    }

    /// Control-side handle to the audio side.
    pub fn audio(&self) -> &AudioLink {
        &self.audio
    }

    pub fn set_pitch(&self, pitch: f64, action: Action) -> Result<()> {
        Ok(self.audio.send(AudioCommand::SetPitch(pitch, action))?)
    }

    pub fn set_alpha(&self, alpha: f64) -> Result<()> {
        Ok(self.audio.send(AudioCommand::SetAlpha(alpha))?)
    }

    pub fn set_gamma(&self, gamma: f64) -> Result<()> {
        Ok(self.audio.send(AudioCommand::SetGamma(gamma))?)
    }

    pub fn set_pade_order(&self, order: usize) -> Result<()> {
        Ok(self.audio.send(AudioCommand::SetPadeOrder(order))?)
    }

    pub fn set_volume(&self, volume: f64) -> Result<()> {
        Ok(self.audio.send(AudioCommand::SetVolume(volume))?)
    }

    pub fn reset_vocoder(&self) -> Result<()> {
        Ok(self.audio.send(AudioCommand::ResetVocoder)?)
    }

    /// Discard user controls on the control thread and the audio side.
    pub fn reset(&self) -> Result<()> {
        self.send(ControlCommand::Reset)
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Stop the control thread and tear the pipeline down on it.
    ///
    /// Frames already in the frame queue stay with the [`SampleDriver`];
    /// drain them there.
    ///
    /// [`SampleDriver`]: parlo_core::SampleDriver
    pub fn shutdown(&mut self) -> Result<TeardownReport> {
        let Some(handle) = self.thread.take() else {
            return Err(Error::ControlThreadDisconnected);
        };
        let (response_tx, response_rx) = crossbeam_channel::bounded(1);
        let sent = self
            .cmd_tx
            .send(ControlCommand::Shutdown { response_tx })
            .is_ok();
        let report = if sent { response_rx.recv().ok() } else { None };
        let _ = handle.join();
        tracing::info!("Control thread stopped");
        report.ok_or(Error::ControlThreadDisconnected)
    }

    fn send(&self, command: ControlCommand) -> Result<()> {
        self.cmd_tx
            .send(command)
            .map_err(|_| Error::ControlThreadDisconnected)
    }
}

impl Drop for Synthesizer {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.shutdown();
        }
    }
}

fn control_loop(mut pipeline: Pipeline, cmd_rx: Receiver<ControlCommand>, idle_wait: Duration) {
    let stop = loop {
        let step = loop {
            match cmd_rx.try_recv() {
                Ok(command) => match apply(&mut pipeline, command) {
                    Step::Continue => {}
                    stop => break stop,
                },
                Err(TryRecvError::Empty) => break Step::Continue,
                Err(TryRecvError::Disconnected) => break Step::Stop(None),
            }
        };
        if let Step::Stop(response_tx) = step {
            break response_tx;
        }

        match pipeline.tick() {
            Ok(TickOutcome::NotReady | TickOutcome::FrameQueueFull) => {
                match cmd_rx.recv_timeout(idle_wait) {
                    Ok(command) => {
                        if let Step::Stop(response_tx) = apply(&mut pipeline, command) {
                            break response_tx;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break None,
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Control tick failed: {}", e),
        }
    };

    let report = pipeline.teardown();
    if let Some(response_tx) = stop {
        let _ = response_tx.send(report);
    }
}

fn apply(pipeline: &mut Pipeline, command: ControlCommand) -> Step {
    match command {
        ControlCommand::SetSpeed {
            speed,
            action,
            response_tx,
        } => {
            let _ = response_tx.send(pipeline.set_speed(speed, action));
        }
        ControlCommand::SetDuration(values, action) => pipeline.set_duration(values, action),
        ControlCommand::SetLabelSpeed(speed) => pipeline.set_label_speed(speed),
        ControlCommand::SetInterpolation(enabled) => pipeline.set_interpolation(enabled),
        ControlCommand::Duration { response_tx } => {
            let _ = response_tx.send(pipeline.duration());
        }
        ControlCommand::Reset => pipeline.reset(),
        ControlCommand::Shutdown { response_tx } => return Step::Stop(Some(response_tx)),
    }
    Step::Continue
}
