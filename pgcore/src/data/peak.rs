use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use serde::{Deserialize, Serialize};

use crate::data::label::UserLabel;
use crate::data::sample::Sample;

/// Which intensity measure is used for ranking, vectors and export.
///
/// # Description
///
/// The integer values are fixed; they are what external reporters and saved
/// settings refer to.
///
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum QuantType {
    #[default]
    AreaTop,
    Area,
    Height,
    AreaNotCorrected,
    RetentionTime,
    Quality,
    SNRatio,
    AreaTopNotCorrected,
}

impl QuantType {
    /// Returns the `QuantType` corresponding to the given integer value.
    /// Unknown values fall back to `AreaTop`.
    pub fn new(value: i32) -> QuantType {
        match value {
            0 => QuantType::AreaTop,
            1 => QuantType::Area,
            2 => QuantType::Height,
            3 => QuantType::AreaNotCorrected,
            4 => QuantType::RetentionTime,
            5 => QuantType::Quality,
            6 => QuantType::SNRatio,
            7 => QuantType::AreaTopNotCorrected,
            _ => QuantType::AreaTop,
        }
    }

    pub fn numeric(&self) -> i32 {
        match self {
            QuantType::AreaTop => 0,
            QuantType::Area => 1,
            QuantType::Height => 2,
            QuantType::AreaNotCorrected => 3,
            QuantType::RetentionTime => 4,
            QuantType::Quality => 5,
            QuantType::SNRatio => 6,
            QuantType::AreaTopNotCorrected => 7,
        }
    }
}

impl Display for QuantType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            QuantType::AreaTop => write!(f, "AreaTop"),
            QuantType::Area => write!(f, "Area"),
            QuantType::Height => write!(f, "Height"),
            QuantType::AreaNotCorrected => write!(f, "AreaNotCorrected"),
            QuantType::RetentionTime => write!(f, "RetentionTime"),
            QuantType::Quality => write!(f, "Quality"),
            QuantType::SNRatio => write!(f, "SNRatio"),
            QuantType::AreaTopNotCorrected => write!(f, "AreaTopNotCorrected"),
        }
    }
}

/// One detected chromatographic peak in one sample.
///
/// Produced by an upstream detection stage; a `PeakGroup` keeps its own copy.
/// Retention times are in minutes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Peak {
    pub sample: Arc<Sample>,

    pub rt: f32,
    pub rtmin: f32,
    pub rtmax: f32,

    pub peak_mz: f32,
    pub mzmin: f32,
    pub mzmax: f32,

    // height at apex
    pub peak_intensity: f32,
    #[serde(default)]
    pub peak_area: f32,
    #[serde(default)]
    pub peak_area_corrected: f32,
    #[serde(default)]
    pub peak_area_top: f32,
    #[serde(default)]
    pub peak_area_top_not_corrected: f32,
    #[serde(default)]
    pub peak_area_fractional: f32,

    #[serde(default)]
    pub quality: f32,
    #[serde(default)]
    pub signal_baseline_ratio: f32,
    #[serde(default)]
    pub no_noise_obs: u32,

    /// Per-peak curation label, used for classifier accuracy scoring.
    #[serde(default)]
    pub label: Option<UserLabel>,
}

impl Peak {
    /// A point-like peak: bounds collapse onto the apex and every area
    /// measure equals `intensity`.
    pub fn new(sample: Arc<Sample>, rt: f32, mz: f32, intensity: f32) -> Self {
        Peak {
            sample,
            rt,
            rtmin: rt,
            rtmax: rt,
            peak_mz: mz,
            mzmin: mz,
            mzmax: mz,
            peak_intensity: intensity,
            peak_area: intensity,
            peak_area_corrected: intensity,
            peak_area_top: intensity,
            peak_area_top_not_corrected: intensity,
            peak_area_fractional: 0.0,
            quality: 0.0,
            signal_baseline_ratio: 0.0,
            no_noise_obs: 0,
            label: None,
        }
    }

    pub fn with_rt_bounds(mut self, rtmin: f32, rtmax: f32) -> Self {
        self.rtmin = rtmin;
        self.rtmax = rtmax;
        self
    }

    pub fn with_mz_bounds(mut self, mzmin: f32, mzmax: f32) -> Self {
        self.mzmin = mzmin;
        self.mzmax = mzmax;
        self
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    #[inline]
    pub fn sample_id(&self) -> u32 {
        self.sample.id
    }

    /// Value of this peak under the given quantitation type.
    #[inline]
    pub fn quantity(&self, qtype: QuantType) -> f32 {
        match qtype {
            QuantType::AreaTop => self.peak_area_top,
            QuantType::Area => self.peak_area_corrected,
            QuantType::Height => self.peak_intensity,
            QuantType::AreaNotCorrected => self.peak_area,
            QuantType::RetentionTime => self.rt,
            QuantType::Quality => self.quality,
            QuantType::SNRatio => self.signal_baseline_ratio,
            QuantType::AreaTopNotCorrected => self.peak_area_top_not_corrected,
        }
    }

    /// Shift the apex and both bounds by `-delta` minutes.
    #[inline]
    pub fn shift_rt(&mut self, delta: f32) {
        self.rt -= delta;
        self.rtmin -= delta;
        self.rtmax -= delta;
    }
}
