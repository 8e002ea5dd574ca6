//! Group-level aggregates: geometry, intensity maxima, blank contrast,
//! quality and rank.
//!
//! Nothing in here runs implicitly. Callers mutate a group's peaks freely and
//! then call `group_statistics()` and `update_quality()` once.

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median};

use crate::data::peak::{Peak, QuantType};
use crate::data::peak_group::PeakGroup;
use crate::error::{PgError, Result};

/// Weights for `cal_group_rank`. Integers act as relative multipliers; they
/// are scaled by 1/10 and need not sum to anything in particular.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankParams {
    pub delta_rt_check: bool,  // penalize distance to the compound's expected rt
    pub quality_weight: i32,   // exponent weight of (1.1 - max quality)
    pub intensity_weight: i32, // exponent weight of ln(max intensity + 1)
    pub delta_rt_weight: i32,  // exponent weight of |expected rt diff|
}

impl Default for RankParams {
    fn default() -> Self {
        Self {
            delta_rt_check: false,
            quality_weight: 10,
            intensity_weight: 10,
            delta_rt_weight: 10,
        }
    }
}

impl RankParams {
    pub fn validate(&self) -> Result<()> {
        if self.quality_weight < 0 {
            return Err(PgError::invalid("quality_weight", "must be >= 0"));
        }
        if self.intensity_weight < 0 {
            return Err(PgError::invalid("intensity_weight", "must be >= 0"));
        }
        if self.delta_rt_weight < 0 {
            return Err(PgError::invalid("delta_rt_weight", "must be >= 0"));
        }
        Ok(())
    }
}

/// Intensity-weighted mean of `value(p)`; arithmetic mean when every weight is
/// zero. `None` for an empty slice.
fn weighted_mean<F>(peaks: &[Peak], value: F) -> Option<f64>
where
    F: Fn(&Peak) -> f32,
{
    if peaks.is_empty() {
        return None;
    }
    let (mut num, mut den) = (0.0f64, 0.0f64);
    for p in peaks {
        let w = p.peak_intensity.max(0.0) as f64;
        num += w * value(p) as f64;
        den += w;
    }
    if den > 0.0 {
        Some(num / den)
    } else {
        let sum: f64 = peaks.iter().map(|p| value(p) as f64).sum();
        Some(sum / peaks.len() as f64)
    }
}

#[inline]
fn max_of<F: Fn(&Peak) -> f32>(peaks: &[Peak], f: F) -> f32 {
    peaks.iter().map(f).fold(0.0f32, f32::max)
}

impl PeakGroup {
    /// Recompute geometry, intensity maxima, sample counts and the blank
    /// contrast from the current peaks.
    ///
    /// The rt and m/z envelopes cover both the apex values and the peak
    /// bounds, so `min <= mean <= max` holds in both dimensions.
    pub fn group_statistics(&mut self) {
        self.invalidate_intensity_cache();

        if self.is_empty() {
            self.mean_rt = 0.0;
            self.mean_mz = 0.0;
            self.min_rt = 0.0;
            self.max_rt = 0.0;
            self.min_mz = 0.0;
            self.max_mz = 0.0;
            self.max_intensity = 0.0;
            self.max_area_top_intensity = 0.0;
            self.max_area_intensity = 0.0;
            self.max_height_intensity = 0.0;
            self.max_area_not_corrected_intensity = 0.0;
            self.max_area_top_not_corrected_intensity = 0.0;
            self.sample_count = 0;
            self.total_sample_count = 0;
            self.blank_sample_count = 0;
            self.blank_mean = 0.0;
            self.blank_max = 0.0;
            self.sample_mean = 0.0;
            self.sample_max = 0.0;
            self.expected_rt_diff = -1.0;
            return;
        }

        let peaks = self.peaks();

        let (mut min_rt, mut max_rt) = (f32::INFINITY, f32::NEG_INFINITY);
        let (mut min_mz, mut max_mz) = (f32::INFINITY, f32::NEG_INFINITY);
        for p in peaks {
            min_rt = min_rt.min(p.rt).min(p.rtmin);
            max_rt = max_rt.max(p.rt).max(p.rtmax);
            min_mz = min_mz.min(p.peak_mz).min(p.mzmin);
            max_mz = max_mz.max(p.peak_mz).max(p.mzmax);
        }

        let mean_rt = weighted_mean(peaks, |p| p.rt).unwrap_or(0.0) as f32;
        let mean_mz = weighted_mean(peaks, |p| p.peak_mz).unwrap_or(0.0) as f32;

        let max_height = max_of(peaks, |p| p.peak_intensity);
        let max_area_top = max_of(peaks, |p| p.peak_area_top);
        let max_area = max_of(peaks, |p| p.peak_area_corrected);
        let max_area_nc = max_of(peaks, |p| p.peak_area);
        let max_area_top_nc = max_of(peaks, |p| p.peak_area_top_not_corrected);
        let max_sbr = max_of(peaks, |p| p.signal_baseline_ratio);
        let max_frac = max_of(peaks, |p| p.peak_area_fractional);

        let (mut blank_n, mut blank_sum, mut blank_max) = (0u32, 0.0f64, 0.0f32);
        let (mut sample_n, mut sample_sum, mut sample_max) = (0u32, 0.0f64, 0.0f32);
        let mut detected = 0u32;
        for p in peaks {
            if p.sample.is_blank {
                blank_n += 1;
                blank_sum += p.peak_area_top as f64;
                blank_max = blank_max.max(p.peak_area_top);
            } else {
                sample_n += 1;
                sample_sum += p.peak_area_top as f64;
                sample_max = sample_max.max(p.peak_area_top);
                if p.peak_intensity > 0.0 {
                    detected += 1;
                }
            }
        }

        self.min_rt = min_rt;
        self.max_rt = max_rt;
        self.min_mz = min_mz;
        self.max_mz = max_mz;
        self.mean_rt = mean_rt.clamp(min_rt, max_rt);
        self.mean_mz = mean_mz.clamp(min_mz, max_mz);

        self.max_intensity = max_height;
        self.max_height_intensity = max_height;
        self.max_area_top_intensity = max_area_top;
        self.max_area_intensity = max_area;
        self.max_area_not_corrected_intensity = max_area_nc;
        self.max_area_top_not_corrected_intensity = max_area_top_nc;
        self.max_signal_baseline_ratio = max_sbr;
        self.max_peak_fractional_area = max_frac;

        self.sample_count = detected;
        self.total_sample_count = sample_n;
        self.blank_sample_count = blank_n;
        self.blank_max = blank_max;
        self.blank_mean = if blank_n > 0 { (blank_sum / blank_n as f64) as f32 } else { 0.0 };
        self.sample_max = sample_max;
        self.sample_mean = if sample_n > 0 { (sample_sum / sample_n as f64) as f32 } else { 0.0 };

        self.expected_rt_diff = match self.compound.as_ref().and_then(|c| c.expected_rt) {
            Some(expected) if expected > 0.0 => (expected - self.mean_rt).abs(),
            _ => -1.0,
        };
    }

    /// Recompute `max_quality`, `avg_peak_quality`, `good_peak_count` (peaks
    /// with quality strictly above `min_quality`) and `max_no_noise_obs`.
    pub fn update_quality(&mut self, min_quality: f32) {
        self.min_quality = min_quality;

        let peaks = self.peaks();
        if peaks.is_empty() {
            self.max_quality = 0.0;
            self.avg_peak_quality = 0.0;
            self.good_peak_count = 0;
            self.max_no_noise_obs = 0;
            return;
        }

        let mut max_quality = 0.0f32;
        let mut sum = 0.0f64;
        let mut good = 0u32;
        let mut max_obs = 0u32;
        for p in peaks {
            max_quality = max_quality.max(p.quality);
            sum += p.quality as f64;
            if p.quality > min_quality {
                good += 1;
            }
            max_obs = max_obs.max(p.no_noise_obs);
        }
        let avg = (sum / peaks.len() as f64) as f32;

        self.max_quality = max_quality;
        self.avg_peak_quality = avg;
        self.good_peak_count = good;
        self.max_no_noise_obs = max_obs;
    }

    /// Median apex rt over peaks; 0 for an empty group.
    pub fn median_rt(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let rts: Vec<f64> = self.peaks().iter().map(|p| p.rt as f64).collect();
        Data::new(rts).median() as f32
    }

    /// Intensity-weighted mean apex rt; 0 for an empty group.
    pub fn mean_rt_w(&self) -> f32 {
        weighted_mean(self.peaks(), |p| p.rt).unwrap_or(0.0) as f32
    }

    /// Composite rank, lower is better:
    ///
    /// `|rt diff|^(2C) * (1.1 - max_quality)^A / ln(I + 1)^B`
    ///
    /// with `A, B, C` the quality, intensity and rt weights divided by 10 and
    /// `I` the maximum under the current quantitation type. The rt term only
    /// applies with `delta_rt_check` and a compound carrying an expected rt.
    /// A non-finite result is stored as `f32::MAX`.
    pub fn cal_group_rank(&mut self, params: &RankParams) -> f32 {
        let a = params.quality_weight as f64 / 10.0;
        let b = params.intensity_weight as f64 / 10.0;
        let c = params.delta_rt_weight as f64 / 10.0;

        let intensity = self.current_intensity() as f64;
        let quality_term = (1.1 - self.max_quality as f64).powf(a);
        let intensity_term = (intensity + 1.0).ln().powf(b);

        let has_expected_rt = self
            .compound
            .as_ref()
            .and_then(|c| c.expected_rt)
            .map_or(false, |rt| rt > 0.0);

        let mut rank = quality_term / intensity_term;
        if params.delta_rt_check && has_expected_rt && self.expected_rt_diff >= 0.0 {
            rank *= (self.expected_rt_diff as f64).powf(2.0 * c);
        }

        self.group_rank = if rank.is_finite() { rank as f32 } else { f32::MAX };
        self.group_rank
    }

    /// Largest sample area-top over largest blank area-top. `None` without
    /// blank peaks; `f32::MAX` when every blank is zero.
    pub fn sample_to_blank_ratio(&self) -> Option<f32> {
        if self.blank_sample_count == 0 {
            return None;
        }
        if self.blank_max <= 0.0 {
            return Some(f32::MAX);
        }
        Some(self.sample_max / self.blank_max)
    }

    /// Maximum of `qtype` over peaks whose sample is a blank.
    pub fn blank_max_for(&self, qtype: QuantType) -> f32 {
        self.peaks()
            .iter()
            .filter(|p| p.sample.is_blank)
            .map(|p| p.quantity(qtype))
            .fold(0.0f32, f32::max)
    }
}
