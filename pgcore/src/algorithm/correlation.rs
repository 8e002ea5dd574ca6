use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::data::sample::Sample;

/// Pearson correlation of two equally long vectors.
///
/// Returns 0 for mismatched lengths, fewer than two points, zero variance on
/// either side, or any non-finite intermediate.
pub fn pearson(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.len() < 2 {
        return 0.0;
    }
    let x: Vec<f64> = a.iter().map(|v| *v as f64).collect();
    let y: Vec<f64> = b.iter().map(|v| *v as f64).collect();

    let var_x = x.iter().variance();
    let var_y = y.iter().variance();
    if var_x.is_nan() || var_y.is_nan() || var_x <= 0.0 || var_y <= 0.0 {
        return 0.0;
    }
    let cov = x.iter().covariance(y.iter());
    let r = cov / (var_x.sqrt() * var_y.sqrt());
    if r.is_finite() {
        r.clamp(-1.0, 1.0) as f32
    } else {
        0.0
    }
}

/// Overlap of two closed rt intervals as intersection over union.
///
/// Disjoint or non-finite intervals give 0. Two identical zero-width
/// intervals overlap fully.
pub fn rt_overlap(a_lo: f32, a_hi: f32, b_lo: f32, b_hi: f32) -> f32 {
    let (a_lo, a_hi, b_lo, b_hi) = (a_lo as f64, a_hi as f64, b_lo as f64, b_hi as f64);
    if !a_lo.is_finite() || !a_hi.is_finite() || !b_lo.is_finite() || !b_hi.is_finite() {
        return 0.0;
    }
    if a_hi < b_lo || b_hi < a_lo {
        return 0.0;
    }
    let inter = (a_hi.min(b_hi) - a_lo.max(b_lo)).max(0.0);
    let union = (a_hi.max(b_hi) - a_lo.min(b_lo)).max(0.0);
    if union <= 0.0 {
        // both intervals collapse onto the same point
        1.0
    } else {
        (inter / union) as f32
    }
}

/// Mass tolerance around an m/z value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum MassCutoff {
    Ppm(f32),
    MilliDa(f32),
}

impl Default for MassCutoff {
    fn default() -> Self {
        MassCutoff::Ppm(5.0)
    }
}

impl MassCutoff {
    /// Half-width of the tolerance window around `mz`, in Da.
    pub fn window(&self, mz: f32) -> f32 {
        match *self {
            MassCutoff::Ppm(v) => v * mz / 1e6,
            MassCutoff::MilliDa(v) => v / 1000.0,
        }
    }

    pub fn contains(&self, center: f32, mz: f32) -> bool {
        (mz - center).abs() <= self.window(center)
    }
}

/// One peak-shape comparison: the traces at `mz1` and `mz2` inside
/// `[rtmin, rtmax]` of a single sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EicQuery {
    pub mz1: f32,
    pub mz2: f32,
    pub cutoff: MassCutoff,
    pub rtmin: f32,
    pub rtmax: f32,
}

/// Peak-shape correlation source used by the clustering gate.
pub trait EicCorrelator {
    fn correlation(&self, sample: &Sample, query: &EicQuery) -> f32;
}

impl<F> EicCorrelator for F
where
    F: Fn(&Sample, &EicQuery) -> f32,
{
    fn correlation(&self, sample: &Sample, query: &EicQuery) -> f32 {
        self(sample, query)
    }
}

/// Extracted ion chromatogram of one m/z in one sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EicTrace {
    pub sample_id: u32,
    pub mz: f32,
    pub rt: Vec<f32>,
    pub intensity: Vec<f32>,
}

impl EicTrace {
    /// Linear interpolation at `rt`; `None` outside the trace.
    fn intensity_at(&self, rt: f32) -> Option<f32> {
        let n = self.rt.len().min(self.intensity.len());
        if n == 0 || rt < self.rt[0] || rt > self.rt[n - 1] {
            return None;
        }
        let idx = self.rt[..n].partition_point(|t| *t < rt);
        if idx < n && self.rt[idx] == rt {
            return Some(self.intensity[idx]);
        }
        if idx == 0 {
            return Some(self.intensity[0]);
        }
        let (t0, t1) = (self.rt[idx - 1], self.rt[idx]);
        let (y0, y1) = (self.intensity[idx - 1], self.intensity[idx]);
        let span = t1 - t0;
        if span <= 0.0 {
            return Some(y0);
        }
        Some(y0 + (y1 - y0) * (rt - t0) / span)
    }
}

/// In-memory trace store answering `EicQuery`s by Pearson correlation of the
/// two closest traces, resampled onto the scan times of the first.
#[derive(Clone, Debug)]
pub struct TraceCorrelator {
    traces: HashMap<u32, Vec<EicTrace>>,
    min_points: usize,
}

impl Default for TraceCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceCorrelator {
    pub fn new() -> Self {
        TraceCorrelator { traces: HashMap::new(), min_points: 3 }
    }

    pub fn from_traces(traces: Vec<EicTrace>) -> Self {
        let mut store = Self::new();
        for t in traces {
            store.insert(t);
        }
        store
    }

    pub fn insert(&mut self, trace: EicTrace) {
        self.traces.entry(trace.sample_id).or_default().push(trace);
    }

    pub fn len(&self) -> usize {
        self.traces.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn closest(&self, sample_id: u32, mz: f32, cutoff: MassCutoff) -> Option<&EicTrace> {
        self.traces
            .get(&sample_id)?
            .iter()
            .filter(|t| cutoff.contains(mz, t.mz))
            .min_by(|a, b| (a.mz - mz).abs().total_cmp(&(b.mz - mz).abs()))
    }
}

impl EicCorrelator for TraceCorrelator {
    fn correlation(&self, sample: &Sample, query: &EicQuery) -> f32 {
        let (a, b) = match (
            self.closest(sample.id, query.mz1, query.cutoff),
            self.closest(sample.id, query.mz2, query.cutoff),
        ) {
            (Some(a), Some(b)) => (a, b),
            _ => return 0.0,
        };

        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for (rt, y) in a.rt.iter().zip(a.intensity.iter()) {
            if *rt < query.rtmin || *rt > query.rtmax {
                continue;
            }
            if let Some(other) = b.intensity_at(*rt) {
                xs.push(*y);
                ys.push(other);
            }
        }
        if xs.len() < self.min_points {
            return 0.0;
        }
        pearson(&xs, &ys)
    }
}
