//! Bounded ring of in-flight models, the smoothing window.

use super::frame::FrameProducer;
use crate::engine::DeltaWindows;
use crate::mlpg::{self, Trajectory};
use crate::model::Model;
use crate::stream::StreamKind;
use crate::{Error, Result};
use std::collections::VecDeque;

/// Models waiting to be generated, oldest first.
pub struct ModelQueue {
    models: VecDeque<Model>,
    capacity: usize,
}

impl ModelQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            models: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, model: Model) -> Result<()> {
        if self.is_full() {
            tracing::warn!("Model queue is full, dropping {}", model.label().query());
            return Err(Error::ModelQueueFull);
        }
        self.models.push_back(model);
        Ok(())
    }

    /// Remove the oldest model.
    pub fn pop(&mut self) -> Option<Model> {
        self.models.pop_front()
    }

    pub fn get(&self, index: usize) -> Option<&Model> {
        self.models.get(index)
    }

    /// Most recently pushed model.
    pub fn back(&self) -> Option<&Model> {
        self.models.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Model> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.models.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every model. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.models.len();
        self.models.clear();
        dropped
    }

    /// Generate the trajectories of every queued model as one utterance.
    ///
    /// Each stream is solved over the concatenated frames of the whole queue,
    /// so a model is smoothed against its neighbors on both sides. With
    /// `use_gv`, each trajectory is then scaled toward the mean global
    /// variance of the window.
    pub fn optimize(&mut self, windows: &DeltaWindows, use_gv: bool) {
        if self.models.is_empty() || windows.is_empty() {
            return;
        }

        for stream in StreamKind::ALL {
            let width = self
                .models
                .iter()
                .map(|model| model.stream(stream).width())
                .max()
                .unwrap_or(0);
            let order = width / windows.len();

            let mut trajectory = {
                let pdfs: Vec<_> = self
                    .models
                    .iter()
                    .flat_map(|model| model.frame_pdfs(stream))
                    .collect();
                mlpg::generate(&pdfs, windows, order, stream.is_msd())
            };

            if use_gv {
                if let Some(gv_mean) = self.window_gv_mean(stream, order) {
                    mlpg::apply_global_variance(&mut trajectory, &gv_mean);
                }
            }

            let mut frames = trajectory.frames.into_iter();
            let mut voiced = trajectory.voiced.into_iter();
            for model in self.models.iter_mut() {
                let len = model.total_frames();
                model.set_trajectory(
                    stream,
                    Trajectory {
                        frames: frames.by_ref().take(len).collect(),
                        voiced: voiced.by_ref().take(len).collect(),
                    },
                );
            }
        }
    }

    /// Push the frames of the model at `index` to the frame queue.
    ///
    /// Returns the number of frames pushed. Frames that do not fit are dropped.
    pub fn generate(&self, index: usize, frames: &mut FrameProducer) -> usize {
        let Some(model) = self.models.get(index) else {
            return 0;
        };

        let total = model.total_frames();
        let mut pushed = 0;
        for t in 0..total {
            if frames.push(model.frame(t)).is_ok() {
                pushed += 1;
            }
        }
        if pushed < total {
            tracing::warn!(
                "Frame queue is full, dropped {} of {} frames of {}",
                total - pushed,
                total,
                model.label().query()
            );
        }
        pushed
    }

    /// Average of the global variance means of the models that carry one.
    fn window_gv_mean(&self, stream: StreamKind, order: usize) -> Option<Vec<f64>> {
        let mut sum = vec![0.0; order];
        let mut count = 0usize;
        for gv in self
            .models
            .iter()
            .filter_map(|model| model.stream(stream).global_variance())
        {
            for (acc, v) in sum.iter_mut().zip(&gv.mean) {
                *acc += v;
            }
            count += 1;
        }
        (count > 0).then(|| sum.into_iter().map(|s| s / count as f64).collect())
    }
}
