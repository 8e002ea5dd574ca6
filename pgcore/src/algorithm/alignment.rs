//! Retention-time alignment across samples.
//!
//! For every sample the deviation `peak rt - group median rt` is modelled as a
//! polynomial in `peak rt`, fitted on groups seen in most samples. Outliers
//! are dropped iteratively; the fitted deviation is then subtracted from every
//! peak of that sample and group statistics are recomputed.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics};

use crate::data::peak_group::PeakGroup;
use crate::error::{PgError, Result};

// residuals below this (minutes) are f32 rounding noise, not outliers
const MIN_OUTLIER_CUTOFF: f64 = 1e-4;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentParams {
    pub polynomial_degree: usize, // degree of the rt deviation model
    pub max_iterations: usize,    // outlier-removal rounds per sample
    /// A group takes part in fitting when it has peaks in at least this
    /// fraction of all samples
    pub min_sample_fraction: f32,
    pub outlier_quantile: f32, // quantile of |residual| ...
    pub outlier_scale: f32,    // ... times this is the outlier cutoff
}

impl Default for AlignmentParams {
    fn default() -> Self {
        Self {
            polynomial_degree: 3,
            max_iterations: 10,
            min_sample_fraction: 0.9,
            outlier_quantile: 0.9,
            outlier_scale: 2.0,
        }
    }
}

impl AlignmentParams {
    pub fn validate(&self) -> Result<()> {
        if self.polynomial_degree > 10 {
            return Err(PgError::invalid("polynomial_degree", "must be <= 10"));
        }
        if !(0.0..=1.0).contains(&self.min_sample_fraction) {
            return Err(PgError::invalid("min_sample_fraction", "must lie in [0, 1]"));
        }
        if self.outlier_quantile.is_nan() || self.outlier_quantile <= 0.0 || self.outlier_quantile > 1.0 {
            return Err(PgError::invalid("outlier_quantile", "must lie in (0, 1]"));
        }
        if !self.outlier_scale.is_finite() || self.outlier_scale <= 0.0 {
            return Err(PgError::invalid("outlier_scale", "must be finite and > 0"));
        }
        Ok(())
    }
}

/// Fitted deviation model of one sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleFit {
    pub sample_id: u32,
    /// Coefficients in the centred and scaled variable `(rt - center) / scale`,
    /// lowest degree first
    pub coefficients: Vec<f64>,
    pub center: f64,
    pub scale: f64,
    pub points: usize,
    pub iterations: usize,
    pub rmse: f64,
}

impl SampleFit {
    /// Predicted deviation at `rt`.
    pub fn eval(&self, rt: f32) -> f64 {
        horner(&self.coefficients, (rt as f64 - self.center) / self.scale)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub groups_used: usize,
    pub fits: Vec<SampleFit>,
    pub skipped_samples: Vec<u32>,
}

pub trait Aligner {
    /// Shift peak retention times of `groups` in place.
    fn align(&self, groups: &mut [&mut PeakGroup]) -> AlignmentReport;
}

#[derive(Clone, Debug, Default)]
pub struct PolynomialAligner {
    pub params: AlignmentParams,
}

impl PolynomialAligner {
    pub fn new(params: AlignmentParams) -> Self {
        PolynomialAligner { params }
    }

    fn fit_sample(&self, sample_id: u32, xs: &[f64], ys: &[f64]) -> Option<SampleFit> {
        let n_coef = self.params.polynomial_degree + 1;
        if xs.len() < n_coef + 1 {
            return None;
        }

        let center = xs.iter().sum::<f64>() / xs.len() as f64;
        let spread = xs.iter().map(|x| (x - center).abs()).fold(0.0f64, f64::max);
        let scale = if spread > 0.0 { spread } else { 1.0 };

        let mut keep: Vec<usize> = (0..xs.len()).collect();
        let mut coefficients = solve_polynomial(xs, ys, &keep, center, scale, n_coef)?;
        let mut iterations = 1;

        while iterations < self.params.max_iterations {
            let residuals: Vec<f64> = keep
                .iter()
                .map(|&k| (ys[k] - horner(&coefficients, (xs[k] - center) / scale)).abs())
                .collect();
            let mut data = Data::new(residuals.clone());
            let cutoff = self.params.outlier_scale as f64 * data.quantile(self.params.outlier_quantile as f64);
            if cutoff.is_nan() || cutoff <= MIN_OUTLIER_CUTOFF {
                break;
            }

            let next: Vec<usize> = keep
                .iter()
                .zip(residuals.iter())
                .filter(|(_, r)| **r <= cutoff)
                .map(|(k, _)| *k)
                .collect();
            if next.len() == keep.len() || next.len() < n_coef + 1 {
                break;
            }
            log::trace!(
                "sample {}: dropped {} outliers (cutoff {:.4})",
                sample_id,
                keep.len() - next.len(),
                cutoff
            );
            keep = next;
            coefficients = solve_polynomial(xs, ys, &keep, center, scale, n_coef)?;
            iterations += 1;
        }

        let sse: f64 = keep
            .iter()
            .map(|&k| (ys[k] - horner(&coefficients, (xs[k] - center) / scale)).powi(2))
            .sum();
        Some(SampleFit {
            sample_id,
            coefficients,
            center,
            scale,
            points: keep.len(),
            iterations,
            rmse: (sse / keep.len() as f64).sqrt(),
        })
    }
}

#[inline]
fn horner(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Least-squares polynomial through the rows `keep` of `(xs, ys)`.
fn solve_polynomial(
    xs: &[f64],
    ys: &[f64],
    keep: &[usize],
    center: f64,
    scale: f64,
    n_coef: usize,
) -> Option<Vec<f64>> {
    let a = DMatrix::from_fn(keep.len(), n_coef, |r, c| ((xs[keep[r]] - center) / scale).powi(c as i32));
    let b = DVector::from_iterator(keep.len(), keep.iter().map(|&k| ys[k]));
    let solution = a.svd(true, true).solve(&b, 1e-12).ok()?;
    let coefficients: Vec<f64> = solution.iter().copied().collect();
    if coefficients.iter().all(|c| c.is_finite()) {
        Some(coefficients)
    } else {
        None
    }
}

impl Aligner for PolynomialAligner {
    fn align(&self, groups: &mut [&mut PeakGroup]) -> AlignmentReport {
        let sample_ids: Vec<u32> = groups
            .iter()
            .flat_map(|g| g.peaks().iter().map(|p| p.sample_id()))
            .collect::<BTreeSet<u32>>()
            .into_iter()
            .collect();
        if sample_ids.is_empty() {
            return AlignmentReport::default();
        }

        let (groups_used, results) = {
            let min_peaks = self.params.min_sample_fraction * sample_ids.len() as f32;
            let anchors: Vec<(&PeakGroup, f64)> = groups
                .iter()
                .map(|g| &**g)
                .filter(|g| !g.is_empty() && g.peak_count() as f32 >= min_peaks)
                .map(|g| (g, g.median_rt() as f64))
                .collect();
            log::debug!(
                "aligning {} samples using {} of {} groups",
                sample_ids.len(),
                anchors.len(),
                groups.len()
            );

            let results: Vec<(u32, Option<SampleFit>)> = sample_ids
                .par_iter()
                .map(|&sid| {
                    let mut xs = Vec::new();
                    let mut ys = Vec::new();
                    for (g, median) in &anchors {
                        if let Some(p) = g.get_peak(sid) {
                            xs.push(p.rt as f64);
                            ys.push(p.rt as f64 - median);
                        }
                    }
                    (sid, self.fit_sample(sid, &xs, &ys))
                })
                .collect();
            (anchors.len(), results)
        };

        let mut report = AlignmentReport { groups_used, ..Default::default() };
        for (sid, fit) in results {
            match fit {
                Some(fit) => {
                    log::debug!(
                        "sample {}: {} points, {} iterations, rmse {:.5}",
                        sid,
                        fit.points,
                        fit.iterations,
                        fit.rmse
                    );
                    report.fits.push(fit);
                }
                None => {
                    log::warn!("sample {}: not enough anchor groups to fit, left unaligned", sid);
                    report.skipped_samples.push(sid);
                }
            }
        }

        let fits: BTreeMap<u32, &SampleFit> = report.fits.iter().map(|f| (f.sample_id, f)).collect();
        for g in groups.iter_mut() {
            g.visit_mut(&mut |member: &mut PeakGroup| {
                for p in member.peaks_mut() {
                    if let Some(fit) = fits.get(&p.sample_id()) {
                        let delta = fit.eval(p.rt);
                        p.shift_rt(delta as f32);
                    }
                }
                member.group_statistics();
            });
        }
        report
    }
}
