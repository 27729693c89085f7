//! Maximum-likelihood parameter generation.
//!
//! Given one output pdf per frame (static and dynamic features), finds the
//! static trajectory `c` maximizing the likelihood under the delta windows:
//! `WᵀΣ⁻¹W c = WᵀΣ⁻¹μ`, solved per dimension with a banded LDLᵀ
//! decomposition. Dynamic terms whose window reaches past the trajectory, or
//! onto an unvoiced frame of a multi-space stream, are left out.

use crate::engine::{DeltaWindows, StatePdf};

/// Frames whose voiced weight exceeds this are voiced.
pub const VOICED_THRESHOLD: f64 = 0.5;

/// Pivots below this are treated as rows without observations.
const MIN_PIVOT: f64 = 1e-12;

/// Generated static trajectory of one stream over a window.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trajectory {
    /// `frames[t][m]`: dimension `m` of frame `t`.
    pub frames: Vec<Vec<f64>>,
    /// Voicing decision per frame (always true on regular streams).
    pub voiced: Vec<bool>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Solve for the static trajectory of one stream.
///
/// `pdfs[t]` is the output pdf of frame `t`, with `order * windows.len()`
/// entries laid out window-major. `msd` restricts generation to voiced frames.
pub fn generate(pdfs: &[&StatePdf], windows: &DeltaWindows, order: usize, msd: bool) -> Trajectory {
    let len = pdfs.len();
    let voiced: Vec<bool> = pdfs
        .iter()
        .map(|pdf| !msd || pdf.voiced_weight > VOICED_THRESHOLD)
        .collect();

    let mut frames = vec![vec![0.0; order]; len];
    if len == 0 || order == 0 {
        return Trajectory { frames, voiced };
    }

    let width = 2 * windows.max_half_width() + 1;
    let mut system = BandSystem::new(len, width);

    for m in 0..order {
        system.clear();
        for (t, pdf) in pdfs.iter().enumerate() {
            if !voiced[t] {
                continue;
            }
            for (j, window) in windows.iter().enumerate() {
                let index = j * order + m;
                let (Some(&mean), Some(&variance)) = (pdf.mean.get(index), pdf.variance.get(index))
                else {
                    continue;
                };
                if !(variance > 0.0 && variance.is_finite()) {
                    continue;
                }
                let taps: Vec<(usize, f64)> = match window
                    .taps()
                    .map(|(offset, coef)| {
                        let at = t as isize + offset;
                        (at >= 0 && (at as usize) < len && voiced[at as usize])
                            .then_some((at as usize, coef))
                    })
                    .collect::<Option<Vec<_>>>()
                {
                    Some(taps) => taps,
                    None => continue,
                };
                system.add_term(&taps, 1.0 / variance, mean);
            }
        }

        let solution = system.solve();
        for (frame, value) in frames.iter_mut().zip(solution) {
            frame[m] = value;
        }
    }

    for (frame, &is_voiced) in frames.iter_mut().zip(&voiced) {
        if !is_voiced {
            frame.iter_mut().for_each(|c| *c = 0.0);
        }
    }

    Trajectory { frames, voiced }
}

/// Scale each dimension of the voiced frames so its variance over the window
/// matches `gv_mean`, keeping the mean.
pub fn apply_global_variance(trajectory: &mut Trajectory, gv_mean: &[f64]) {
    let voiced: Vec<usize> = (0..trajectory.len())
        .filter(|&t| trajectory.voiced[t])
        .collect();
    if voiced.len() < 2 {
        return;
    }
    let n = voiced.len() as f64;

    for (m, &target) in gv_mean.iter().enumerate() {
        if !(target > 0.0 && target.is_finite()) {
            continue;
        }
        let mean = voiced
            .iter()
            .filter_map(|&t| trajectory.frames[t].get(m))
            .sum::<f64>()
            / n;
        let variance = voiced
            .iter()
            .filter_map(|&t| trajectory.frames[t].get(m))
            .map(|c| (c - mean).powi(2))
            .sum::<f64>()
            / n;
        if variance <= MIN_PIVOT {
            continue;
        }

        let ratio = (target / variance).sqrt();
        for &t in &voiced {
            if let Some(c) = trajectory.frames[t].get_mut(m) {
                *c = (*c - mean) * ratio + mean;
            }
        }
    }
}

/// Symmetric band matrix `WᵀΣ⁻¹W` (upper band stored) and `WᵀΣ⁻¹μ`.
struct BandSystem {
    len: usize,
    width: usize,
    /// `band[t * width + d]` holds `A[t][t + d]`.
    band: Vec<f64>,
    rhs: Vec<f64>,
}

impl BandSystem {
    fn new(len: usize, width: usize) -> Self {
        Self {
            len,
            width,
            band: vec![0.0; len * width],
            rhs: vec![0.0; len],
        }
    }

    fn clear(&mut self) {
        self.band.iter_mut().for_each(|x| *x = 0.0);
        self.rhs.iter_mut().for_each(|x| *x = 0.0);
    }

    /// Accumulate one observation of `mean` with precision `precision` through
    /// the window `taps` (`(frame, coefficient)` pairs, ascending frames).
    fn add_term(&mut self, taps: &[(usize, f64)], precision: f64, mean: f64) {
        for (a, &(ta, ca)) in taps.iter().enumerate() {
            self.rhs[ta] += precision * mean * ca;
            for &(tb, cb) in &taps[a..] {
                let d = tb - ta;
                if d < self.width {
                    self.band[ta * self.width + d] += precision * ca * cb;
                }
            }
        }
    }

    /// LDLᵀ decomposition in place, then forward and back substitution.
    fn solve(&mut self) -> Vec<f64> {
        let (len, w) = (self.len, self.width);
        let band = &mut self.band;

        for t in 0..len {
            for i in 1..w.min(t + 1) {
                let u = band[(t - i) * w + i];
                band[t * w] -= u * u * band[(t - i) * w];
            }
            if band[t * w].abs() < MIN_PIVOT || !band[t * w].is_finite() {
                band[t * w] = 1.0;
            }
            for i in 1..w {
                for j in 1..(w - i).min(t + 1) {
                    band[t * w + i] -=
                        band[(t - j) * w + j] * band[(t - j) * w + i + j] * band[(t - j) * w];
                }
                band[t * w + i] /= band[t * w];
            }
        }

        let mut g = vec![0.0; len];
        for t in 0..len {
            g[t] = self.rhs[t];
            for i in 1..w.min(t + 1) {
                g[t] -= band[(t - i) * w + i] * g[t - i];
            }
        }

        let mut c = vec![0.0; len];
        for t in (0..len).rev() {
            c[t] = g[t] / band[t * w];
            for i in 1..w {
                if t + i < len {
                    c[t] -= band[t * w + i] * c[t + i];
                }
            }
        }
        c
    }
}
