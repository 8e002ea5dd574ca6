//! Flat rows for external reporters ("Groups Summary" / "Peaks Detailed").
//!
//! Empty groups are skipped. Children follow their parent, depth first, with
//! `depth` telling them apart.

use std::sync::Arc;

use serde::Serialize;

use crate::data::peak::QuantType;
use crate::data::peak_group::PeakGroup;
use crate::data::sample::Sample;

const TOP_FEATURES: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupSummaryRow {
    pub label: String,
    pub group_id: i32,
    pub meta_group_id: i32,
    pub cluster_id: i32,
    pub depth: usize,
    pub name: String,
    pub compound: String,
    pub good_peak_count: u32,
    pub mean_mz: f32,
    pub mean_rt: f32,
    pub max_quality: f32,
    pub expected_rt_diff: f32,
    pub group_rank: f32,
    pub predicted_label: String,
    pub predicted_legend: &'static str,
    pub prediction_probability: f32,
    pub top_features: String,
    /// One value per requested sample, in the requested order
    pub intensities: Vec<f32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PeakDetailRow {
    pub group_id: i32,
    pub depth: usize,
    pub name: String,
    pub sample: String,
    pub peak_mz: f32,
    pub mzmin: f32,
    pub mzmax: f32,
    pub rt: f32,
    pub rtmin: f32,
    pub rtmax: f32,
    pub quality: f32,
    pub peak_intensity: f32,
    pub peak_area: f32,
    pub peak_area_corrected: f32,
    pub peak_area_top: f32,
    pub signal_baseline_ratio: f32,
    pub no_noise_obs: u32,
    pub label: String,
}

fn walk<'a>(groups: &'a [PeakGroup], depth: usize, out: &mut Vec<(usize, &'a PeakGroup)>) {
    for g in groups {
        if g.is_empty() {
            continue;
        }
        out.push((depth, g));
        walk(g.children(), depth + 1, out);
    }
}

fn flatten(groups: &[PeakGroup]) -> Vec<(usize, &PeakGroup)> {
    let mut out = Vec::new();
    walk(groups, 0, &mut out);
    out
}

/// Samples in report column order (`sample_order`, then id).
pub fn column_order(samples: &[Arc<Sample>]) -> Vec<Arc<Sample>> {
    let mut ordered = samples.to_vec();
    ordered.sort_by(|a, b| Sample::comp_sample_order(a, b));
    ordered
}

pub fn group_summary_rows(groups: &[PeakGroup], samples: &[Arc<Sample>], qtype: QuantType) -> Vec<GroupSummaryRow> {
    flatten(groups)
        .into_iter()
        .map(|(depth, g)| GroupSummaryRow {
            label: g.user_label().map(|l| l.as_char().to_string()).unwrap_or_default(),
            group_id: g.group_id,
            meta_group_id: g.meta_group_id,
            cluster_id: g.cluster_id,
            depth,
            name: g.name(),
            compound: g.compound.as_ref().map(|c| c.name.clone()).unwrap_or_default(),
            good_peak_count: g.good_peak_count,
            mean_mz: g.mean_mz,
            mean_rt: g.mean_rt,
            max_quality: g.max_quality,
            expected_rt_diff: g.expected_rt_diff,
            group_rank: g.group_rank,
            predicted_label: g.predicted_label().to_string(),
            predicted_legend: g.predicted_label().legend(),
            prediction_probability: g.prediction_probability(),
            top_features: g.prediction_inference().describe_top(TOP_FEATURES),
            intensities: g.ordered_intensity_vector(samples, qtype),
        })
        .collect()
}

pub fn peak_detail_rows(groups: &[PeakGroup]) -> Vec<PeakDetailRow> {
    let mut rows = Vec::new();
    for (depth, g) in flatten(groups) {
        let name = g.name();
        for p in g.peaks() {
            rows.push(PeakDetailRow {
                group_id: g.group_id,
                depth,
                name: name.clone(),
                sample: p.sample.name.clone(),
                peak_mz: p.peak_mz,
                mzmin: p.mzmin,
                mzmax: p.mzmax,
                rt: p.rt,
                rtmin: p.rtmin,
                rtmax: p.rtmax,
                quality: p.quality,
                peak_intensity: p.peak_intensity,
                peak_area: p.peak_area,
                peak_area_corrected: p.peak_area_corrected,
                peak_area_top: p.peak_area_top,
                signal_baseline_ratio: p.signal_baseline_ratio,
                no_noise_obs: p.no_noise_obs,
                label: p.label.map(|l| l.as_char().to_string()).unwrap_or_default(),
            });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::label::{ClassifiedLabel, PredictionInference};
    use crate::data::peak::Peak;

    #[test]
    fn test_rows_skip_empty_and_flatten_children() {
        let s1 = Arc::new(Sample::new(1, "a"));
        let s2 = Arc::new(Sample::new(2, "b"));

        let mut parent = PeakGroup::new();
        parent.group_id = 1;
        parent.add_peak(Peak::new(s2.clone(), 5.0, 200.0, 50.0));
        parent.set_user_label('g');
        parent.set_predicted_label(ClassifiedLabel::Signal, 0.9);
        parent.set_prediction_inference(PredictionInference::from(vec![(0.4, "width".to_string())]));
        let mut child = PeakGroup::new();
        child.group_id = 1;
        child.add_peak(Peak::new(s1.clone(), 5.0, 201.0, 10.0));
        parent.add_child(child);
        parent.add_child(PeakGroup::new());

        let groups = vec![PeakGroup::new(), parent];
        let rows = group_summary_rows(&groups, &[s1.clone(), s2.clone()], QuantType::Height);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].depth, 0);
        assert_eq!(rows[0].label, "g");
        assert_eq!(rows[0].intensities, vec![0.0, 50.0]);
        assert_eq!(rows[0].predicted_label, "Signal");
        assert_eq!(rows[0].predicted_legend, "Signal");
        assert_eq!(rows[1].predicted_legend, "Unclassified");
        assert_eq!(rows[0].top_features, "width=0.400");
        assert_eq!(rows[1].depth, 1);
        assert_eq!(rows[1].label, "");
        assert_eq!(rows[1].intensities, vec![10.0, 0.0]);

        let peaks = peak_detail_rows(&groups);
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].sample, "b");
        assert_eq!(peaks[1].depth, 1);
    }

    #[test]
    fn test_column_order_follows_sample_order() {
        let mut late = Sample::new(1, "late");
        late.sample_order = 5;
        let early = Sample::new(2, "early");
        let mut tied = Sample::new(3, "tied");
        tied.sample_order = 2;
        let samples: Vec<Arc<Sample>> = vec![Arc::new(late), Arc::new(tied), Arc::new(early)];

        let ordered = column_order(&samples);
        let names: Vec<&str> = ordered.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["early", "tied", "late"]);
        assert_eq!(samples[0].name, "late");
    }
}
