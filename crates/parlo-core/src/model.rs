//! Per-label model: blended durations, output pdfs and generated trajectories.
//!
//! Every computation takes a list of [`BlendSource`]s. The non-interpolated
//! case is a single source (the default engine) at full weight, so there is
//! exactly one blend path.

use crate::action::Action;
use crate::engine::{BlendSource, Gaussian, GvPdf, StatePdf};
use crate::label::Label;
use crate::mlpg::Trajectory;
use crate::queue::Frame;
use crate::stream::{StreamKind, NUM_STATES, NUM_STREAMS};

/// A user change to the state durations of the next model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationOverride {
    pub action: Action,
    /// One value per state, in frames.
    pub values: [f64; NUM_STATES],
}

impl DurationOverride {
    pub fn new(action: Action, values: [f64; NUM_STATES]) -> Self {
        Self { action, values }
    }

    /// No change.
    pub fn none() -> Self {
        Self::new(Action::NoAction, [0.0; NUM_STATES])
    }

    pub fn is_none(&self) -> bool {
        matches!(self.action, Action::NoAction | Action::Synthetic)
    }
}

impl Default for DurationOverride {
    fn default() -> Self {
        Self::none()
    }
}

/// Blended pdfs and generated trajectory of one stream.
#[derive(Debug, Clone, Default)]
pub struct StreamModel {
    states: Vec<StatePdf>,
    gv: Option<GvPdf>,
    trajectory: Trajectory,
}

impl StreamModel {
    /// One blended pdf per state.
    pub fn states(&self) -> &[StatePdf] {
        &self.states
    }

    pub fn global_variance(&self) -> Option<&GvPdf> {
        self.gv.as_ref()
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    /// Width of the blended pdfs (static plus dynamic features).
    pub fn width(&self) -> usize {
        self.states.first().map_or(0, |pdf| pdf.mean.len())
    }
}

/// Working state of one label on its way from the label queue to frames.
#[derive(Debug, Clone)]
pub struct Model {
    label: Label,
    duration_pdfs: [Gaussian; NUM_STATES],
    durations: [usize; NUM_STATES],
    streams: [StreamModel; NUM_STREAMS],
}

impl Model {
    pub fn new(label: Label) -> Self {
        Self {
            label,
            duration_pdfs: [Gaussian::default(); NUM_STATES],
            durations: [1; NUM_STATES],
            streams: Default::default(),
        }
    }

    /// Blend the state durations, fit them to the label, then apply `ovr`.
    ///
    /// Frames are rounded with the remainder carried from state to state, so
    /// the total tracks the sum of the blended means. A label with begin and
    /// end times is stretched to that length (`frame_period` seconds per
    /// frame); otherwise means are divided by the label speed. Every state
    /// ends up in `[1, max_state_frames]`.
    pub fn compute_duration(
        &mut self,
        sources: &[BlendSource<'_>],
        ovr: &DurationOverride,
        frame_period: f64,
        max_state_frames: usize,
    ) {
        let max = max_state_frames.max(1) as f64;
        let mut pdfs = [Gaussian::default(); NUM_STATES];
        for source in sources {
            let w = source.weights.duration();
            if w == 0.0 {
                continue;
            }
            for (acc, g) in pdfs.iter_mut().zip(source.engine.duration(&self.label)) {
                acc.mean += w * g.mean;
                acc.variance += w * g.variance;
            }
        }
        self.duration_pdfs = pdfs;

        let means = pdfs.map(|g| g.mean.max(0.0));
        let targets = match self.label.forced_duration_secs() {
            Some(secs) if frame_period > 0.0 => {
                let frames = (secs / frame_period).round().max(NUM_STATES as f64);
                let total: f64 = means.iter().sum();
                if total > 0.0 {
                    means.map(|m| m * frames / total)
                } else {
                    [frames / NUM_STATES as f64; NUM_STATES]
                }
            }
            _ => {
                let speed = self.label.speed();
                let speed = if speed.is_finite() && speed > 0.0 { speed } else { 1.0 };
                means.map(|m| m / speed)
            }
        };

        let mut remainder = 0.0;
        for (duration, target) in self.durations.iter_mut().zip(targets) {
            let target = if target.is_finite() { target.min(max) } else { max };
            let frames = (target + remainder).round().clamp(1.0, max);
            remainder = (remainder + target - frames).clamp(-max, max);
            *duration = frames as usize;
        }

        for (duration, value) in self.durations.iter_mut().zip(ovr.values) {
            if let Some(updated) = ovr.action.apply(*duration as f64, value) {
                if updated.is_finite() {
                    *duration = updated.round().clamp(1.0, max) as usize;
                }
            }
        }
    }

    /// Blend the output pdfs and global variances of every stream.
    pub fn compute_parameters(&mut self, sources: &[BlendSource<'_>]) {
        for stream in StreamKind::ALL {
            let mut states: Vec<StatePdf> = Vec::new();
            let mut gv: Option<GvPdf> = None;

            for source in sources {
                let w = source.weights.stream(stream);
                if w == 0.0 {
                    continue;
                }

                let pdfs = source.engine.parameters(&self.label, stream);
                if states.is_empty() {
                    let width = pdfs.first().map_or(0, |pdf| pdf.mean.len());
                    states = vec![StatePdf::zeros(width); NUM_STATES];
                }
                for (acc, pdf) in states.iter_mut().zip(&pdfs) {
                    accumulate(&mut acc.mean, &pdf.mean, w);
                    accumulate(&mut acc.variance, &pdf.variance, w);
                    acc.voiced_weight += w * pdf.voiced_weight;
                }

                if let Some(engine_gv) = source.engine.global_variance(&self.label, stream) {
                    let acc = gv.get_or_insert_with(|| GvPdf {
                        mean: vec![0.0; engine_gv.mean.len()],
                        variance: vec![0.0; engine_gv.variance.len()],
                    });
                    accumulate(&mut acc.mean, &engine_gv.mean, w);
                    accumulate(&mut acc.variance, &engine_gv.variance, w);
                }
            }

            if states.is_empty() {
                // Nobody carries weight on this stream: an empty pdf of the
                // right width generates zeros.
                let width = sources.first().map_or(0, |source| {
                    source.engine.order(stream) * source.engine.windows().len()
                });
                states = vec![StatePdf::zeros(width); NUM_STATES];
            }

            let model = &mut self.streams[stream.index()];
            model.states = states;
            model.gv = gv;
            model.trajectory = Trajectory::default();
        }
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    /// Frames per state.
    pub fn durations(&self) -> &[usize; NUM_STATES] {
        &self.durations
    }

    /// Blended duration pdf of each state.
    pub fn duration_pdfs(&self) -> &[Gaussian; NUM_STATES] {
        &self.duration_pdfs
    }

    /// Total length in frames.
    pub fn total_frames(&self) -> usize {
        self.durations
            .iter()
            .fold(0usize, |total, &frames| total.saturating_add(frames))
    }

    pub fn stream(&self, stream: StreamKind) -> &StreamModel {
        &self.streams[stream.index()]
    }

    /// Output pdf of every frame of `stream`, state by state.
    pub fn frame_pdfs(&self, stream: StreamKind) -> impl Iterator<Item = &StatePdf> {
        self.streams[stream.index()]
            .states
            .iter()
            .zip(self.durations)
            .flat_map(|(pdf, frames)| std::iter::repeat(pdf).take(frames))
    }

    pub(crate) fn set_trajectory(&mut self, stream: StreamKind, trajectory: Trajectory) {
        self.streams[stream.index()].trajectory = trajectory;
    }

    /// Frame `t` of the generated trajectories.
    pub fn frame(&self, t: usize) -> Frame {
        let mgc = &self.streams[StreamKind::Mgc.index()].trajectory;
        let lf0 = &self.streams[StreamKind::Lf0.index()].trajectory;
        let lpf = &self.streams[StreamKind::Lpf.index()].trajectory;

        Frame {
            mgc: mgc.frames.get(t).cloned().unwrap_or_default(),
            lf0: lf0
                .frames
                .get(t)
                .and_then(|f| f.first())
                .copied()
                .unwrap_or(0.0),
            voiced: lf0.voiced.get(t).copied().unwrap_or(false),
            lpf: lpf.frames.get(t).cloned().unwrap_or_default(),
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new(Label::default())
    }
}

fn accumulate(acc: &mut [f64], values: &[f64], weight: f64) {
    for (a, v) in acc.iter_mut().zip(values) {
        *a += weight * v;
    }
}
