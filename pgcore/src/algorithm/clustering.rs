//! Correlation clustering of peak groups.
//!
//! Single left-to-right pass over groups sorted by mean rt. The earliest
//! unclustered group opens a cluster and becomes its parent; every later
//! unclustered group that passes the rt-distance, rt-overlap, sample
//! correlation and peak-shape correlation gates joins the current group's
//! cluster.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::algorithm::correlation::{pearson, rt_overlap, EicCorrelator, EicQuery, MassCutoff};
use crate::data::peak::QuantType;
use crate::data::peak_group::PeakGroup;
use crate::data::sample::Sample;
use crate::error::{PgError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterParams {
    /// Max |Δ mean rt| to the cluster parent is 2× this value (minutes)
    pub max_rt_diff: f32,             // e.g. 0.5
    /// Minimum rt-window overlap (intersection / union), inclusive
    pub min_rt_overlap: f32,          // 0.1
    /// Minimum Pearson r of the per-sample area-top vectors, inclusive
    pub min_sample_correlation: f32,  // e.g. 0.8
    /// Minimum peak-shape correlation in the representative sample, inclusive
    pub min_rt_correlation: f32,      // e.g. 0.9
    /// Mass tolerance used when extracting traces for the shape gate
    pub mass_cutoff: MassCutoff,
    /// Report progress every N outer-loop groups
    pub progress_every: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            max_rt_diff: 0.5,
            min_rt_overlap: 0.1,
            min_sample_correlation: 0.8,
            min_rt_correlation: 0.9,
            mass_cutoff: MassCutoff::Ppm(5.0),
            progress_every: 10,
        }
    }
}

impl ClusterParams {
    pub fn validate(&self) -> Result<()> {
        if !self.max_rt_diff.is_finite() || self.max_rt_diff < 0.0 {
            return Err(PgError::invalid("max_rt_diff", "must be finite and >= 0"));
        }
        if !(0.0..=1.0).contains(&self.min_rt_overlap) {
            return Err(PgError::invalid("min_rt_overlap", "must lie in [0, 1]"));
        }
        if !(-1.0..=1.0).contains(&self.min_sample_correlation) {
            return Err(PgError::invalid("min_sample_correlation", "must lie in [-1, 1]"));
        }
        if !(-1.0..=1.0).contains(&self.min_rt_correlation) {
            return Err(PgError::invalid("min_rt_correlation", "must lie in [-1, 1]"));
        }
        if self.progress_every == 0 {
            return Err(PgError::invalid("progress_every", "must be > 0"));
        }
        Ok(())
    }
}

/// Side channels of a clustering run.
#[derive(Default)]
pub struct ClusterHooks {
    /// Called with `(done, total)`.
    pub progress: Option<Box<dyn Fn(usize, usize) + Send + Sync>>,
    /// Checked once per outer-loop group; when set the run stops and already
    /// assigned cluster ids are kept.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl ClusterHooks {
    fn report(&self, done: usize, total: usize) {
        if let Some(cb) = &self.progress {
            cb(done, total);
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(AtomicOrdering::Relaxed))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusterOutcome {
    /// Number of cluster ids handed out, `1..=clusters`
    pub clusters: i32,
    pub cancelled: bool,
}

/// Sample holding the most intense apex of a group.
fn representative_sample(group: &PeakGroup) -> Option<Arc<Sample>> {
    let mut best: Option<(&Arc<Sample>, f32)> = None;
    for p in group.peaks() {
        if p.peak_intensity > best.map_or(0.0, |(_, v)| v) {
            best = Some((&p.sample, p.peak_intensity));
        }
    }
    best.map(|(s, _)| Arc::clone(s))
}

/// Assign `cluster_id`s to `groups`.
///
/// The slice is reordered by mean rt (stable) and every `cluster_id` is reset
/// to 0 first. Groups without peaks, or without any peak of positive
/// intensity, stay singletons. Non-finite correlations count as 0.
pub fn cluster_groups<E>(
    groups: &mut [PeakGroup],
    samples: &[Arc<Sample>],
    params: &ClusterParams,
    eic: &E,
    hooks: &ClusterHooks,
) -> ClusterOutcome
where
    E: EicCorrelator + ?Sized,
{
    let n = groups.len();
    log::info!(
        "clustering {} groups over {} samples (max_rt_diff={}, min_sample_corr={}, min_rt_corr={})",
        n,
        samples.len(),
        params.max_rt_diff,
        params.min_sample_correlation,
        params.min_rt_correlation
    );

    for g in groups.iter_mut() {
        g.cluster_id = 0;
    }
    if n == 0 {
        return ClusterOutcome { clusters: 0, cancelled: false };
    }

    groups.sort_by(|a, b| a.mean_rt.total_cmp(&b.mean_rt));

    // per-group inputs of the correlation gates
    let vectors: Vec<Vec<f32>> = groups
        .par_iter()
        .map(|g| g.ordered_intensity_vector(samples, QuantType::AreaTop))
        .collect();
    let representatives: Vec<Option<Arc<Sample>>> =
        groups.par_iter().map(representative_sample).collect();

    let rt_limit = 2.0 * params.max_rt_diff;
    let every = params.progress_every.max(1);
    let mut parents: Vec<usize> = Vec::new();
    let mut cancelled = false;

    for i in 0..n {
        if hooks.cancelled() {
            log::warn!("clustering cancelled at group {}/{}", i, n);
            cancelled = true;
            break;
        }
        if i % every == 0 {
            log::debug!("clustering {}/{}", i + 1, n);
            hooks.report(i + 1, n);
        }

        if groups[i].cluster_id == 0 {
            parents.push(i);
            groups[i].cluster_id = parents.len() as i32;
        }

        let cluster_id = groups[i].cluster_id;
        let parent_rt = groups[parents[(cluster_id - 1) as usize]].mean_rt;

        let representative = match (&representatives[i], groups[i].is_empty()) {
            (Some(s), false) => Arc::clone(s),
            _ => {
                log::trace!("group {} has no representative sample, kept as singleton", i);
                continue;
            }
        };

        let (i_min_rt, i_max_rt, i_mz) = (groups[i].min_rt, groups[i].max_rt, groups[i].mean_mz);

        for j in (i + 1)..n {
            let other = &groups[j];
            if other.cluster_id != 0 || other.is_empty() || representatives[j].is_none() {
                continue;
            }

            let rt_dist = (parent_rt - other.mean_rt).abs();
            if rt_dist > rt_limit {
                // sorted by rt, later groups are only farther from the parent
                log::trace!("pair ({}, {}) beyond rt limit: {}", i, j, rt_dist);
                break;
            }
            if rt_dist.is_nan() {
                continue;
            }

            let overlap = rt_overlap(i_min_rt, i_max_rt, other.min_rt, other.max_rt);
            if overlap < params.min_rt_overlap {
                log::trace!("pair ({}, {}) rejected by rt overlap {}", i, j, overlap);
                continue;
            }

            let sample_corr = finite_or_zero(pearson(&vectors[i], &vectors[j]));
            if sample_corr < params.min_sample_correlation {
                log::trace!("pair ({}, {}) rejected by sample correlation {}", i, j, sample_corr);
                continue;
            }

            let query = EicQuery {
                mz1: i_mz,
                mz2: other.mean_mz,
                cutoff: params.mass_cutoff,
                rtmin: i_min_rt,
                rtmax: i_max_rt,
            };
            let shape_corr = finite_or_zero(eic.correlation(&representative, &query));
            if shape_corr < params.min_rt_correlation {
                log::trace!("pair ({}, {}) rejected by shape correlation {}", i, j, shape_corr);
                continue;
            }

            groups[j].cluster_id = cluster_id;
        }
    }

    if !cancelled {
        hooks.report(n, n);
    }
    let clusters = parents.len() as i32;
    log::info!("clustering done: {} clusters, cancelled={}", clusters, cancelled);
    ClusterOutcome { clusters, cancelled }
}

#[inline]
fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() { v } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::peak::Peak;
    use std::sync::atomic::AtomicUsize;

    fn samples(n: u32) -> Vec<Arc<Sample>> {
        (1..=n).map(|i| Arc::new(Sample::new(i, &format!("s{}", i)))).collect()
    }

    /// Group with one peak per sample at `rt`, rt window `[rt - w, rt + w]`,
    /// and area-top intensities `scale * profile[k]`.
    fn group(samples: &[Arc<Sample>], rt: f32, w: f32, mz: f32, profile: &[f32], scale: f32) -> PeakGroup {
        let mut g = PeakGroup::new();
        for (s, v) in samples.iter().zip(profile.iter()) {
            g.add_peak(Peak::new(s.clone(), rt, mz, v * scale).with_rt_bounds(rt - w, rt + w));
        }
        g.group_statistics();
        g
    }

    fn always(v: f32) -> impl Fn(&Sample, &EicQuery) -> f32 {
        move |_: &Sample, _: &EicQuery| v
    }

    fn ids_by_rt(groups: &[PeakGroup]) -> Vec<i32> {
        groups.iter().map(|g| g.cluster_id).collect()
    }

    #[test]
    fn test_three_group_scenario() {
        let s = samples(4);
        let profile = [1.0, 3.0, 2.0, 5.0];
        let mut groups = vec![
            group(&s, 9.0, 0.1, 400.0, &profile, 10.0),
            group(&s, 5.05, 0.1, 201.0, &profile, 3.0),
            group(&s, 5.0, 0.1, 200.0, &profile, 100.0),
        ];
        let params = ClusterParams { max_rt_diff: 0.2, ..Default::default() };
        let out = cluster_groups(&mut groups, &s, &params, &always(1.0), &ClusterHooks::default());

        assert_eq!(out.clusters, 2);
        assert!(!out.cancelled);
        // sorted by rt: 5.0, 5.05, 9.0
        assert_eq!(groups[0].mean_rt, 5.0);
        assert_eq!(groups[0].cluster_id, groups[1].cluster_id);
        assert_ne!(groups[2].cluster_id, groups[0].cluster_id);
        assert_eq!(ids_by_rt(&groups), vec![1, 1, 2]);
    }

    #[test]
    fn test_overlap_exactly_at_threshold_passes() {
        let s = samples(3);
        let profile = [1.0, 2.0, 4.0];
        // [0, 1] against [0, 10]
        let mut a = group(&s, 0.5, 0.5, 100.0, &profile, 1.0);
        let mut b = group(&s, 0.5, 0.5, 100.0, &profile, 2.0);
        for p in b.peaks_mut() {
            p.rtmin = 0.0;
            p.rtmax = 10.0;
        }
        b.group_statistics();
        a.group_statistics();
        assert!((rt_overlap(a.min_rt, a.max_rt, b.min_rt, b.max_rt) - 0.1).abs() < 1e-7);

        let mut groups = vec![a, b];
        let params = ClusterParams { max_rt_diff: 10.0, ..Default::default() };
        let out = cluster_groups(&mut groups, &s, &params, &always(1.0), &ClusterHooks::default());
        assert_eq!(out.clusters, 1);
        assert_eq!(groups[0].cluster_id, groups[1].cluster_id);
    }

    #[test]
    fn test_low_sample_correlation_splits() {
        let s = samples(4);
        let mut groups = vec![
            group(&s, 5.0, 0.1, 200.0, &[1.0, 2.0, 3.0, 4.0], 1.0),
            group(&s, 5.01, 0.1, 201.0, &[4.0, 3.0, 2.0, 1.0], 1.0),
        ];
        let out = cluster_groups(&mut groups, &s, &ClusterParams::default(), &always(1.0), &ClusterHooks::default());
        assert_eq!(out.clusters, 2);
    }

    #[test]
    fn test_shape_gate_and_non_finite_correlation() {
        let s = samples(3);
        let profile = [1.0, 2.0, 4.0];
        let make = || {
            vec![
                group(&s, 5.0, 0.1, 200.0, &profile, 1.0),
                group(&s, 5.01, 0.1, 201.0, &profile, 1.0),
            ]
        };

        let mut groups = make();
        let out = cluster_groups(&mut groups, &s, &ClusterParams::default(), &always(0.5), &ClusterHooks::default());
        assert_eq!(out.clusters, 2);

        let mut groups = make();
        let out = cluster_groups(&mut groups, &s, &ClusterParams::default(), &always(f32::NAN), &ClusterHooks::default());
        assert_eq!(out.clusters, 2);
    }

    #[test]
    fn test_shape_query_uses_most_intense_sample() {
        let s = samples(3);
        let mut groups = vec![
            group(&s, 5.0, 0.1, 200.0, &[1.0, 9.0, 2.0], 1.0),
            group(&s, 5.01, 0.1, 201.0, &[1.0, 9.0, 2.0], 1.0),
        ];
        let shape = |sample: &Sample, q: &EicQuery| {
            assert_eq!(sample.id, 2);
            assert_eq!(q.mz1, 200.0);
            1.0f32
        };
        let out = cluster_groups(&mut groups, &s, &ClusterParams::default(), &shape, &ClusterHooks::default());
        assert_eq!(out.clusters, 1);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let s = samples(4);
        let profiles = [[1.0, 2.0, 3.0, 4.0], [4.0, 1.0, 1.0, 2.0], [2.0, 2.0, 5.0, 1.0]];
        let build = || {
            (0..30)
                .map(|k| {
                    let rt = 2.0 + (k % 10) as f32 * 0.07 + (k / 10) as f32 * 3.0;
                    group(&s, rt, 0.15, 100.0 + k as f32, &profiles[k % 3], 1.0 + k as f32)
                })
                .collect::<Vec<_>>()
        };
        let mut first = build();
        let mut second = build();
        let params = ClusterParams { max_rt_diff: 0.3, ..Default::default() };
        cluster_groups(&mut first, &s, &params, &always(1.0), &ClusterHooks::default());
        cluster_groups(&mut second, &s, &params, &always(1.0), &ClusterHooks::default());
        assert_eq!(ids_by_rt(&first), ids_by_rt(&second));
        let names_a: Vec<f32> = first.iter().map(|g| g.mean_mz).collect();
        let names_b: Vec<f32> = second.iter().map(|g| g.mean_mz).collect();
        assert_eq!(names_a, names_b);
    }

    #[test]
    fn test_rerun_resets_previous_ids() {
        let s = samples(3);
        let mut groups = vec![
            group(&s, 5.0, 0.1, 200.0, &[1.0, 2.0, 4.0], 1.0),
            group(&s, 5.01, 0.1, 201.0, &[1.0, 2.0, 4.0], 1.0),
        ];
        cluster_groups(&mut groups, &s, &ClusterParams::default(), &always(1.0), &ClusterHooks::default());
        assert_eq!(ids_by_rt(&groups), vec![1, 1]);
        let strict = ClusterParams { min_rt_correlation: 1.0, ..Default::default() };
        cluster_groups(&mut groups, &s, &strict, &always(0.99), &ClusterHooks::default());
        assert_eq!(ids_by_rt(&groups), vec![1, 2]);
    }

    #[test]
    fn test_empty_and_single_inputs() {
        let s = samples(2);
        let mut none: Vec<PeakGroup> = Vec::new();
        let out = cluster_groups(&mut none, &s, &ClusterParams::default(), &always(1.0), &ClusterHooks::default());
        assert_eq!(out, ClusterOutcome { clusters: 0, cancelled: false });

        let mut one = vec![group(&s, 5.0, 0.1, 200.0, &[1.0, 2.0], 1.0)];
        let out = cluster_groups(&mut one, &s, &ClusterParams::default(), &always(1.0), &ClusterHooks::default());
        assert_eq!(out.clusters, 1);
        assert_eq!(one[0].cluster_id, 1);
    }

    #[test]
    fn test_empty_group_stays_singleton() {
        let s = samples(2);
        let mut empty = PeakGroup::new();
        empty.mean_rt = 5.0;
        let mut groups = vec![empty, group(&s, 5.0, 0.1, 200.0, &[1.0, 2.0], 1.0)];
        let out = cluster_groups(&mut groups, &s, &ClusterParams::default(), &always(1.0), &ClusterHooks::default());
        assert_eq!(out.clusters, 2);
        assert_ne!(groups[0].cluster_id, groups[1].cluster_id);
    }

    #[test]
    fn test_zero_intensity_group_not_merged_as_candidate() {
        let s = samples(3);
        let bright = group(&s, 5.0, 0.1, 200.0, &[100.0, 200.0, 400.0], 1.0);
        let mut dark = PeakGroup::new();
        for (sample, area) in s.iter().zip([50.0f32, 100.0, 200.0]) {
            let mut p = Peak::new(sample.clone(), 5.0, 201.0, 0.0).with_rt_bounds(4.9, 5.1);
            p.peak_area_top = area;
            dark.add_peak(p);
        }
        dark.group_statistics();
        dark.mean_rt = 5.01;

        let mut groups = vec![bright, dark];
        let out = cluster_groups(&mut groups, &s, &ClusterParams::default(), &always(1.0), &ClusterHooks::default());
        assert_eq!(out.clusters, 2);
        assert_eq!(ids_by_rt(&groups), vec![1, 2]);
    }

    #[test]
    fn test_cancel_keeps_partial_assignment() {
        let s = samples(2);
        let mut groups: Vec<PeakGroup> = (0..5)
            .map(|k| group(&s, 1.0 + k as f32 * 10.0, 0.1, 200.0, &[1.0, 2.0], 1.0))
            .collect();
        let flag = Arc::new(AtomicBool::new(false));
        let seen = Arc::new(AtomicUsize::new(0));
        let hooks = ClusterHooks {
            progress: {
                let flag = flag.clone();
                let seen = seen.clone();
                Some(Box::new(move |done: usize, _total: usize| {
                    seen.store(done, AtomicOrdering::SeqCst);
                    flag.store(true, AtomicOrdering::SeqCst);
                }))
            },
            cancel: Some(flag.clone()),
        };
        let params = ClusterParams { progress_every: 1, ..Default::default() };
        let out = cluster_groups(&mut groups, &s, &params, &always(1.0), &hooks);

        assert!(out.cancelled);
        assert_eq!(out.clusters, 1);
        assert_eq!(seen.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(groups[0].cluster_id, 1);
        assert!(groups[1..].iter().all(|g| g.cluster_id == 0));
    }

    #[test]
    fn test_progress_every_ten() {
        let s = samples(2);
        let mut groups: Vec<PeakGroup> = (0..25)
            .map(|k| group(&s, 1.0 + k as f32 * 10.0, 0.1, 200.0, &[1.0, 2.0], 1.0))
            .collect();
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let hooks = ClusterHooks {
            progress: {
                let calls = calls.clone();
                Some(Box::new(move |done: usize, total: usize| {
                    if let Ok(mut v) = calls.lock() {
                        v.push((done, total));
                    }
                }))
            },
            cancel: None,
        };
        cluster_groups(&mut groups, &s, &ClusterParams::default(), &always(1.0), &hooks);
        let calls = calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(1, 25), (11, 25), (21, 25), (25, 25)]);
    }

    #[test]
    fn test_params_validate() {
        assert!(ClusterParams::default().validate().is_ok());
        assert!(ClusterParams { min_rt_overlap: 1.5, ..Default::default() }.validate().is_err());
        assert!(ClusterParams { max_rt_diff: f32::NAN, ..Default::default() }.validate().is_err());
        assert!(ClusterParams { progress_every: 0, ..Default::default() }.validate().is_err());
    }
}
