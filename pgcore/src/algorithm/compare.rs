//! Total orders over peak groups.
//!
//! The direction of each comparator is fixed: `comp_mz`, `comp_intensity`,
//! `comp_area` and `comp_quality` sort descending, everything else ascending.
//! Equal keys fall back to `group_id` ascending.

use std::cmp::Ordering;
use std::fmt;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::data::peak_group::PeakGroup;

#[inline]
fn by_id(a: &PeakGroup, b: &PeakGroup) -> Ordering {
    a.group_id.cmp(&b.group_id)
}

pub fn comp_rt(a: &PeakGroup, b: &PeakGroup) -> Ordering {
    a.mean_rt.total_cmp(&b.mean_rt).then_with(|| by_id(a, b))
}

/// Descending by mean m/z.
pub fn comp_mz(a: &PeakGroup, b: &PeakGroup) -> Ordering {
    b.mean_mz.total_cmp(&a.mean_mz).then_with(|| by_id(a, b))
}

/// Descending by max intensity.
pub fn comp_intensity(a: &PeakGroup, b: &PeakGroup) -> Ordering {
    b.max_intensity.total_cmp(&a.max_intensity).then_with(|| by_id(a, b))
}

/// Descending by the largest fractional peak area.
pub fn comp_area(a: &PeakGroup, b: &PeakGroup) -> Ordering {
    b.max_peak_fractional_area
        .total_cmp(&a.max_peak_fractional_area)
        .then_with(|| by_id(a, b))
}

/// Descending by max peak quality.
pub fn comp_quality(a: &PeakGroup, b: &PeakGroup) -> Ordering {
    b.max_quality.total_cmp(&a.max_quality).then_with(|| by_id(a, b))
}

pub fn comp_rank(a: &PeakGroup, b: &PeakGroup) -> Ordering {
    a.group_rank.total_cmp(&b.group_rank).then_with(|| by_id(a, b))
}

pub fn comp_ratio(a: &PeakGroup, b: &PeakGroup) -> Ordering {
    a.change_fold_ratio.total_cmp(&b.change_fold_ratio).then_with(|| by_id(a, b))
}

pub fn comp_p_value(a: &PeakGroup, b: &PeakGroup) -> Ordering {
    a.change_p_value.total_cmp(&b.change_p_value).then_with(|| by_id(a, b))
}

pub fn comp_c13(a: &PeakGroup, b: &PeakGroup) -> Ordering {
    a.isotope_c13_count.cmp(&b.isotope_c13_count).then_with(|| by_id(a, b))
}

pub fn comp_meta_group(a: &PeakGroup, b: &PeakGroup) -> Ordering {
    a.meta_group_id.cmp(&b.meta_group_id).then_with(|| by_id(a, b))
}

/// Named sort orders, for callers that pick a comparator at runtime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum GroupOrder {
    Rt,
    Mz,
    Intensity,
    Area,
    Quality,
    #[default]
    Rank,
    Ratio,
    PValue,
    C13,
    MetaGroup,
}

impl GroupOrder {
    pub fn comparator(&self) -> fn(&PeakGroup, &PeakGroup) -> Ordering {
        match self {
            GroupOrder::Rt => comp_rt,
            GroupOrder::Mz => comp_mz,
            GroupOrder::Intensity => comp_intensity,
            GroupOrder::Area => comp_area,
            GroupOrder::Quality => comp_quality,
            GroupOrder::Rank => comp_rank,
            GroupOrder::Ratio => comp_ratio,
            GroupOrder::PValue => comp_p_value,
            GroupOrder::C13 => comp_c13,
            GroupOrder::MetaGroup => comp_meta_group,
        }
    }
}

impl Display for GroupOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupOrder::Rt => "rt",
            GroupOrder::Mz => "mz",
            GroupOrder::Intensity => "intensity",
            GroupOrder::Area => "area",
            GroupOrder::Quality => "quality",
            GroupOrder::Rank => "rank",
            GroupOrder::Ratio => "ratio",
            GroupOrder::PValue => "p-value",
            GroupOrder::C13 => "c13",
            GroupOrder::MetaGroup => "meta-group",
        };
        write!(f, "{}", name)
    }
}

/// Stable sort of `groups` under `order`.
pub fn sort_groups(groups: &mut [PeakGroup], order: GroupOrder) {
    groups.sort_by(order.comparator());
}
