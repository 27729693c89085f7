//! Audio side: frame pulls at the hop rate and sample delivery.
//!
//! The control side talks to the audio side through two lock-free channels:
//! the hop length ([`AtomicDouble`]) and a bounded command queue drained at
//! the start of every sample advance.

use crate::action::Action;
use crate::lockfree::AtomicDouble;
use crate::queue::FrameConsumer;
use crate::vocoder::Vocoder;
use crate::{Error, Result};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::Arc;

/// Raw vocoder samples are in 16-bit range.
const RAW_SCALE: f64 = 0.5 / 32768.0;

/// Pending audio-side commands.
const AUDIO_COMMAND_CAPACITY: usize = 64;

/// A change applied on the audio side before the next sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioCommand {
    SetPitch(f64, Action),
    SetAlpha(f64),
    SetGamma(f64),
    SetPadeOrder(usize),
    SetVolume(f64),
    ResetVocoder,
    /// Vocoder reset plus sample counter reset.
    Reset,
}

/// Control-side handle to the audio side.
#[derive(Clone)]
pub struct AudioLink {
    hop_length: Arc<AtomicDouble>,
    commands: Sender<AudioCommand>,
}

impl AudioLink {
    pub fn hop_length(&self) -> f64 {
        self.hop_length.get()
    }

    pub(crate) fn store_hop_length(&self, hop_length: f64) {
        self.hop_length.set(hop_length);
    }

    /// Queue a command without blocking.
    pub fn send(&self, command: AudioCommand) -> Result<()> {
        match self.commands.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(command)) | Err(TrySendError::Disconnected(command)) => {
                tracing::warn!("Audio command queue is full, dropping {:?}", command);
                Err(Error::CommandQueueFull)
            }
        }
    }
}

/// Create a linked control handle and audio-side command receiver.
pub(crate) fn audio_link(default_hop_length: f64) -> (AudioLink, Arc<AtomicDouble>, Receiver<AudioCommand>) {
    let hop_length = Arc::new(AtomicDouble::new(default_hop_length));
    let (tx, rx) = crossbeam_channel::bounded(AUDIO_COMMAND_CAPACITY);
    (
        AudioLink {
            hop_length: Arc::clone(&hop_length),
            commands: tx,
        },
        hop_length,
        rx,
    )
}

/// Pulls frames into the vocoder and emits samples.
///
/// Lives on the audio thread and never locks. Frames arrive already
/// allocated; the vocoder frees each one when the next replaces it.
pub struct SampleDriver {
    frames: FrameConsumer,
    vocoder: Box<dyn Vocoder>,
    sample_count: u64,
    hop_length: Arc<AtomicDouble>,
    commands: Receiver<AudioCommand>,
}

impl SampleDriver {
    pub(crate) fn new(
        frames: FrameConsumer,
        vocoder: Box<dyn Vocoder>,
        hop_length: Arc<AtomicDouble>,
        commands: Receiver<AudioCommand>,
    ) -> Self {
        Self {
            frames,
            vocoder,
            sample_count: 0,
            hop_length,
            commands,
        }
    }

    /// Advance one sample: every hop, move the oldest frame into the vocoder.
    pub fn update_samples(&mut self) {
        self.apply_commands();

        if self.sample_count as f64 >= self.hop_length.get() - 1.0 {
            if let Some(frame) = self.frames.pop() {
                self.vocoder.push(frame);
            }
            self.sample_count = 0;
        } else {
            self.sample_count += 1;
        }
    }

    /// One output sample in `[-1, 1]`, or silence if the vocoder has nothing.
    pub fn pop_sample(&mut self) -> f64 {
        if !self.vocoder.ready() {
            return 0.0;
        }
        let sample = RAW_SCALE * self.vocoder.pop();
        if sample.is_nan() {
            return 0.0;
        }
        sample.clamp(-1.0, 1.0)
    }

    /// `update_samples` then `pop_sample`.
    #[inline]
    pub fn next_sample(&mut self) -> f64 {
        self.update_samples();
        self.pop_sample()
    }

    /// Fill an audio buffer.
    pub fn fill(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample() as f32;
        }
    }

    /// Apply pending control-side commands.
    pub fn apply_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                AudioCommand::SetPitch(pitch, action) => self.vocoder.set_pitch(pitch, action),
                AudioCommand::SetAlpha(alpha) => self.vocoder.set_alpha(alpha),
                AudioCommand::SetGamma(gamma) => self.vocoder.set_gamma(gamma),
                AudioCommand::SetPadeOrder(order) => self.vocoder.set_pade_order(order),
                AudioCommand::SetVolume(volume) => self.vocoder.set_volume(volume),
                AudioCommand::ResetVocoder => self.vocoder.reset(),
                AudioCommand::Reset => self.reset(),
            }
        }
    }

    /// Zero the sample counter and reset the vocoder.
    pub fn reset(&mut self) {
        self.sample_count = 0;
        self.vocoder.reset();
    }

    /// Drop every pending frame. Returns how many were dropped.
    pub fn drain_frames(&mut self) -> usize {
        self.frames.drain()
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn hop_length(&self) -> f64 {
        self.hop_length.get()
    }

    pub fn vocoder(&self) -> &dyn Vocoder {
        self.vocoder.as_ref()
    }

    pub fn vocoder_mut(&mut self) -> &mut dyn Vocoder {
        self.vocoder.as_mut()
    }
}
