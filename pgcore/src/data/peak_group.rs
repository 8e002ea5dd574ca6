//! The peak-group entity.
//!
//! A `PeakGroup` owns at most one `Peak` per contributing sample and, by value,
//! its child groups (isotopologues, adducts). Aggregates are recomputed only by
//! an explicit `group_statistics()` / `update_quality()` call after mutation;
//! none of the mutators below touch them.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::label::{ClassifiedLabel, EffectiveLabel, PredictionInference, UserLabel};
use crate::data::peak::{Peak, QuantType};
use crate::data::sample::Sample;
use crate::data::slice::MzSlice;

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a group object.
///
/// Unlike `group_id`, which is renumbered by the owning table on every
/// membership change, a uid never changes for the lifetime of the object.
/// Copies receive a fresh uid.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct GroupUid(u64);

impl GroupUid {
    pub fn fresh() -> Self {
        GroupUid(NEXT_UID.fetch_add(1, AtomicOrdering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum GroupType {
    #[default]
    None,
    C13,
    Adduct,
    Covariant,
    Isotope,
}


/// Lightweight link to the compound a targeted group was searched for.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompoundRef {
    pub name: String,
    #[serde(default)]
    pub expected_rt: Option<f32>,
    #[serde(default)]
    pub expected_mz: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakGroup {
    #[serde(skip, default = "GroupUid::fresh")]
    uid: GroupUid,
    #[serde(skip)]
    parent: Option<GroupUid>,

    peaks: Vec<Peak>,
    children: Vec<PeakGroup>,

    pub group_id: i32,
    pub meta_group_id: i32,
    /// 0 = not clustered
    pub cluster_id: i32,

    pub group_type: GroupType,
    quantitation_type: QuantType,

    pub compound: Option<CompoundRef>,
    pub srm_id: String,
    pub tag_string: String,
    pub search_table_name: String,

    // intensity maxima, one per quantitation type
    pub max_intensity: f32,
    pub max_area_top_intensity: f32,
    pub max_area_intensity: f32,
    pub max_height_intensity: f32,
    pub max_area_not_corrected_intensity: f32,
    pub max_area_top_not_corrected_intensity: f32,
    #[serde(skip)]
    current_intensity: Option<f32>,

    // geometry
    pub mean_rt: f32,
    pub mean_mz: f32,
    pub min_rt: f32,
    pub max_rt: f32,
    pub min_mz: f32,
    pub max_mz: f32,
    pub expected_mz: f32,

    // blank vs sample contrast
    pub blank_max: f32,
    pub blank_mean: f32,
    pub blank_sample_count: u32,
    pub sample_count: u32,
    pub sample_mean: f32,
    pub sample_max: f32,
    pub total_sample_count: u32,

    // quality and rank
    pub max_no_noise_obs: u32,
    pub max_quality: f32,
    pub avg_peak_quality: f32,
    pub min_quality: f32,
    pub max_peak_fractional_area: f32,
    pub max_signal_baseline_ratio: f32,
    pub good_peak_count: u32,
    pub expected_rt_diff: f32,
    pub group_rank: f32,

    // sample contrasts
    pub change_fold_ratio: f32,
    pub change_p_value: f32,

    // isotopic information
    pub expected_abundance: f32,
    pub isotope_c13_count: i32,

    slice: Option<MzSlice>,

    user_label: Option<UserLabel>,
    predicted_label: ClassifiedLabel,
    prediction_probability: f32,
    prediction_inference: PredictionInference,
}

impl Default for PeakGroup {
    fn default() -> Self {
        PeakGroup {
            uid: GroupUid::fresh(),
            parent: None,
            peaks: Vec::new(),
            children: Vec::new(),
            group_id: 0,
            meta_group_id: 0,
            cluster_id: 0,
            group_type: GroupType::None,
            quantitation_type: QuantType::AreaTop,
            compound: None,
            srm_id: String::new(),
            tag_string: String::new(),
            search_table_name: String::new(),
            max_intensity: 0.0,
            max_area_top_intensity: 0.0,
            max_area_intensity: 0.0,
            max_height_intensity: 0.0,
            max_area_not_corrected_intensity: 0.0,
            max_area_top_not_corrected_intensity: 0.0,
            current_intensity: None,
            mean_rt: 0.0,
            mean_mz: 0.0,
            min_rt: 0.0,
            max_rt: 0.0,
            min_mz: 0.0,
            max_mz: 0.0,
            expected_mz: 0.0,
            blank_max: 0.0,
            blank_mean: 0.0,
            blank_sample_count: 0,
            sample_count: 0,
            sample_mean: 0.0,
            sample_max: 0.0,
            total_sample_count: 0,
            max_no_noise_obs: 0,
            max_quality: 0.0,
            avg_peak_quality: 0.0,
            min_quality: 0.2,
            max_peak_fractional_area: 0.0,
            max_signal_baseline_ratio: 0.0,
            good_peak_count: 0,
            expected_rt_diff: -1.0,
            group_rank: 1000.0,
            change_fold_ratio: 0.0,
            change_p_value: 0.0,
            expected_abundance: 0.0,
            isotope_c13_count: 0,
            slice: None,
            user_label: None,
            predicted_label: ClassifiedLabel::None,
            prediction_probability: 0.0,
            prediction_inference: PredictionInference::new(),
        }
    }
}

/// Deep copy: peaks and children are copied by value and the children are
/// re-parented to the copy. The copy gets a fresh uid and no parent.
impl Clone for PeakGroup {
    fn clone(&self) -> Self {
        let mut copy = PeakGroup::new();
        copy.copy_obj(self);
        copy
    }
}

impl PeakGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite everything in `self` with a deep copy of `other`, except
    /// `self`'s own uid and parent link.
    pub fn copy_obj(&mut self, other: &PeakGroup) {
        self.peaks = other.peaks.clone();
        self.copy_children(other);

        self.group_id = other.group_id;
        self.meta_group_id = other.meta_group_id;
        self.cluster_id = other.cluster_id;
        self.group_type = other.group_type;
        self.quantitation_type = other.quantitation_type;
        self.compound = other.compound.clone();
        self.srm_id = other.srm_id.clone();
        self.tag_string = other.tag_string.clone();
        self.search_table_name = other.search_table_name.clone();

        self.max_intensity = other.max_intensity;
        self.max_area_top_intensity = other.max_area_top_intensity;
        self.max_area_intensity = other.max_area_intensity;
        self.max_height_intensity = other.max_height_intensity;
        self.max_area_not_corrected_intensity = other.max_area_not_corrected_intensity;
        self.max_area_top_not_corrected_intensity = other.max_area_top_not_corrected_intensity;
        self.current_intensity = other.current_intensity;

        self.mean_rt = other.mean_rt;
        self.mean_mz = other.mean_mz;
        self.min_rt = other.min_rt;
        self.max_rt = other.max_rt;
        self.min_mz = other.min_mz;
        self.max_mz = other.max_mz;
        self.expected_mz = other.expected_mz;

        self.blank_max = other.blank_max;
        self.blank_mean = other.blank_mean;
        self.blank_sample_count = other.blank_sample_count;
        self.sample_count = other.sample_count;
        self.sample_mean = other.sample_mean;
        self.sample_max = other.sample_max;
        self.total_sample_count = other.total_sample_count;

        self.max_no_noise_obs = other.max_no_noise_obs;
        self.max_quality = other.max_quality;
        self.avg_peak_quality = other.avg_peak_quality;
        self.min_quality = other.min_quality;
        self.max_peak_fractional_area = other.max_peak_fractional_area;
        self.max_signal_baseline_ratio = other.max_signal_baseline_ratio;
        self.good_peak_count = other.good_peak_count;
        self.expected_rt_diff = other.expected_rt_diff;
        self.group_rank = other.group_rank;

        self.change_fold_ratio = other.change_fold_ratio;
        self.change_p_value = other.change_p_value;
        self.expected_abundance = other.expected_abundance;
        self.isotope_c13_count = other.isotope_c13_count;

        self.slice = other.slice;

        self.user_label = other.user_label;
        self.predicted_label = other.predicted_label;
        self.prediction_probability = other.prediction_probability;
        self.prediction_inference = other.prediction_inference.clone();
    }

    /// Replace this group's children with deep copies of `other`'s.
    pub fn copy_children(&mut self, other: &PeakGroup) {
        self.children = other.children.clone();
        let uid = self.uid;
        for child in &mut self.children {
            child.parent = Some(uid);
        }
    }

    #[inline]
    pub fn uid(&self) -> GroupUid {
        self.uid
    }

    /// Uid of the group that owns this one as a child, if any.
    #[inline]
    pub fn parent(&self) -> Option<GroupUid> {
        self.parent
    }

    /// Re-establish parent links of the whole subtree below this group.
    /// Needed after deserialization, where links are not persisted.
    pub fn relink_children(&mut self) {
        let uid = self.uid;
        for child in &mut self.children {
            child.parent = Some(uid);
            child.relink_children();
        }
    }

    // ---- membership ---------------------------------------------------------

    /// Append a peak. Aggregates stay stale until `group_statistics()`.
    pub fn add_peak(&mut self, peak: Peak) {
        self.peaks.push(peak);
    }

    pub fn add_child(&mut self, mut child: PeakGroup) {
        child.parent = Some(self.uid);
        self.children.push(child);
    }

    #[inline]
    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    /// Mutable access to peak values; the peak count cannot change through it.
    #[inline]
    pub fn peaks_mut(&mut self) -> &mut [Peak] {
        &mut self.peaks
    }

    #[inline]
    pub fn children(&self) -> &[PeakGroup] {
        &self.children
    }

    #[inline]
    pub fn children_mut(&mut self) -> &mut [PeakGroup] {
        &mut self.children
    }

    #[inline]
    pub fn peak_count(&self) -> usize {
        self.peaks.len()
    }

    #[inline]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn get_peak(&self, sample_id: u32) -> Option<&Peak> {
        self.peaks.iter().find(|p| p.sample_id() == sample_id)
    }

    pub fn get_peak_mut(&mut self, sample_id: u32) -> Option<&mut Peak> {
        self.peaks.iter_mut().find(|p| p.sample_id() == sample_id)
    }

    /// Remove the peak at `index`; `false` if out of range.
    pub fn delete_peak(&mut self, index: usize) -> bool {
        if index < self.peaks.len() {
            self.peaks.remove(index);
            true
        } else {
            false
        }
    }

    pub fn delete_peaks(&mut self) {
        self.peaks.clear();
    }

    /// Remove the child at `index`; `false` if out of range.
    pub fn delete_child(&mut self, index: usize) -> bool {
        if index < self.children.len() {
            self.children.remove(index);
            true
        } else {
            false
        }
    }

    /// Remove the direct child with the given uid; `false` if not a child.
    pub fn delete_child_by_uid(&mut self, uid: GroupUid) -> bool {
        match self.children.iter().position(|c| c.uid == uid) {
            Some(index) => self.delete_child(index),
            None => false,
        }
    }

    pub fn delete_children(&mut self) {
        self.children.clear();
    }

    /// Drop all peaks and children.
    pub fn clear(&mut self) {
        self.delete_peaks();
        self.delete_children();
    }

    /// Give every descendant this group's `group_id`.
    pub fn set_group_id_for_children(&mut self) {
        let id = self.group_id;
        for child in &mut self.children {
            child.group_id = id;
            child.set_group_id_for_children();
        }
    }

    /// Apply `f` to this group and then, depth first, to every descendant.
    pub fn visit_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut PeakGroup),
    {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }

    /// Find a group by uid in this subtree (including `self`).
    pub fn find(&self, uid: GroupUid) -> Option<&PeakGroup> {
        if self.uid == uid {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(uid))
    }

    pub fn find_mut(&mut self, uid: GroupUid) -> Option<&mut PeakGroup> {
        if self.uid == uid {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(uid))
    }

    // ---- type, identity, naming ---------------------------------------------

    #[inline]
    pub fn is_isotope(&self) -> bool {
        self.group_type == GroupType::Isotope
    }

    #[inline]
    pub fn is_adduct(&self) -> bool {
        self.group_type == GroupType::Adduct
    }

    #[inline]
    pub fn has_compound_link(&self) -> bool {
        self.compound.is_some()
    }

    /// `true` iff an SRM id is set.
    #[inline]
    pub fn has_srm_id(&self) -> bool {
        !self.srm_id.is_empty()
    }

    /// Compound name, tag string, SRM id, `mz@rt`, or the group id, in this
    /// order of preference.
    pub fn name(&self) -> String {
        if let Some(c) = &self.compound {
            if !c.name.is_empty() {
                return c.name.clone();
            }
        }
        if !self.tag_string.is_empty() {
            return self.tag_string.clone();
        }
        if self.has_srm_id() {
            return self.srm_id.clone();
        }
        if self.mean_mz > 0.0 {
            return format!("{:.4}@{:.2}", self.mean_mz, self.mean_rt);
        }
        self.group_id.to_string()
    }

    // ---- slice --------------------------------------------------------------

    pub fn set_slice(&mut self, slice: MzSlice) {
        self.slice = Some(slice);
    }

    pub fn slice(&self) -> Option<&MzSlice> {
        self.slice.as_ref()
    }

    pub fn has_slice(&self) -> bool {
        self.slice.is_some()
    }

    /// `true` when no slice is set or the slice is degenerate.
    pub fn slice_is_zero(&self) -> bool {
        self.slice.map_or(true, |s| s.is_zero())
    }

    // ---- quantitation -------------------------------------------------------

    #[inline]
    pub fn quantitation_type(&self) -> QuantType {
        self.quantitation_type
    }

    pub fn set_quantitation_type(&mut self, qtype: QuantType) {
        if qtype != self.quantitation_type {
            self.current_intensity = None;
        }
        self.quantitation_type = qtype;
    }

    /// Group maximum under `qtype`, from the last statistics pass for the
    /// area/height types and from the peaks for the rest.
    pub fn max_intensity_for(&self, qtype: QuantType) -> f32 {
        match qtype {
            QuantType::AreaTop => self.max_area_top_intensity,
            QuantType::Area => self.max_area_intensity,
            QuantType::Height => self.max_height_intensity,
            QuantType::AreaNotCorrected => self.max_area_not_corrected_intensity,
            QuantType::AreaTopNotCorrected => self.max_area_top_not_corrected_intensity,
            other => self
                .peaks
                .iter()
                .map(|p| p.quantity(other))
                .fold(0.0f32, f32::max),
        }
    }

    /// Maximum intensity under the current quantitation type, cached until the
    /// type changes or statistics are recomputed.
    pub fn current_intensity(&mut self) -> f32 {
        match self.current_intensity {
            Some(v) => v,
            None => {
                let v = self.max_intensity_for(self.quantitation_type);
                self.current_intensity = Some(v);
                v
            }
        }
    }

    pub(crate) fn invalidate_intensity_cache(&mut self) {
        self.current_intensity = None;
    }

    /// One value per entry of `samples`, in that order; 0 where this group has
    /// no peak for the sample.
    pub fn ordered_intensity_vector(&self, samples: &[Arc<Sample>], qtype: QuantType) -> Vec<f32> {
        samples
            .iter()
            .map(|s| self.get_peak(s.id).map_or(0.0, |p| p.quantity(qtype)))
            .collect()
    }

    // ---- labels -------------------------------------------------------------

    /// Accepts `'g'`, `'b'` and `'\0'` (unset); any other character is ignored.
    pub fn set_user_label(&mut self, label: char) {
        if let Some(parsed) = UserLabel::parse(label) {
            self.user_label = parsed;
        }
    }

    #[inline]
    pub fn user_label(&self) -> Option<UserLabel> {
        self.user_label
    }

    /// `'g'`, `'b'`, or `'\0'` when unset.
    pub fn user_label_char(&self) -> char {
        self.user_label.map_or('\0', |l| l.as_char())
    }

    /// Store a classifier prediction. The user label is left untouched.
    pub fn set_predicted_label(&mut self, label: ClassifiedLabel, probability: f32) {
        self.predicted_label = label;
        self.prediction_probability = probability.clamp(0.0, 1.0);
    }

    pub fn set_prediction_inference(&mut self, inference: PredictionInference) {
        self.prediction_inference = inference;
    }

    #[inline]
    pub fn predicted_label(&self) -> ClassifiedLabel {
        self.predicted_label
    }

    #[inline]
    pub fn prediction_probability(&self) -> f32 {
        self.prediction_probability
    }

    #[inline]
    pub fn prediction_inference(&self) -> &PredictionInference {
        &self.prediction_inference
    }

    pub fn effective_label(&self) -> EffectiveLabel {
        EffectiveLabel::resolve(self.user_label, self.predicted_label)
    }

    /// Fraction of peaks whose quality contradicts the reviewer's label:
    /// good peaks in a group marked bad, or bad peaks in a group marked good.
    pub fn label_disagreement(&self, min_quality: f32) -> f32 {
        if self.peaks.is_empty() {
            return 0.0;
        }
        let good = self.peaks.iter().filter(|p| p.quality > min_quality).count();
        let bad = self.peaks.len() - good;
        let total = self.peaks.len() as f32;
        match self.user_label {
            Some(UserLabel::Bad) if good > 0 => good as f32 / total,
            Some(UserLabel::Good) if bad > 0 => bad as f32 / total,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: u32) -> Arc<Sample> {
        Arc::new(Sample::new(id, &format!("s{}", id)))
    }

    fn group_with_peaks(n: u32) -> PeakGroup {
        let mut g = PeakGroup::new();
        for i in 0..n {
            g.add_peak(Peak::new(sample(i + 1), 5.0 + i as f32 * 0.01, 200.0, 100.0 * (i + 1) as f32));
        }
        g
    }

    #[test]
    fn test_set_user_label_ignores_unknown_chars() {
        let mut g = PeakGroup::new();
        g.set_user_label('g');
        assert_eq!(g.user_label(), Some(UserLabel::Good));
        g.set_user_label('x');
        assert_eq!(g.user_label(), Some(UserLabel::Good));
        g.set_user_label('b');
        assert_eq!(g.user_label_char(), 'b');
        g.set_user_label('\0');
        assert_eq!(g.user_label(), None);
        assert_eq!(g.user_label_char(), '\0');
    }

    #[test]
    fn test_predicted_label_does_not_touch_user_label() {
        let mut g = PeakGroup::new();
        g.set_predicted_label(ClassifiedLabel::Signal, 0.83);
        assert_eq!(g.user_label(), None);
        assert_eq!(g.effective_label(), EffectiveLabel::Good);

        g.set_user_label('b');
        g.set_predicted_label(ClassifiedLabel::Correlation, 0.99);
        assert_eq!(g.effective_label(), EffectiveLabel::Bad);
        assert_eq!(g.predicted_label(), ClassifiedLabel::Correlation);
    }

    #[test]
    fn test_user_good_overrides_predicted_noise() {
        let mut g = PeakGroup::new();
        g.set_user_label('g');
        g.set_predicted_label(ClassifiedLabel::Noise, 0.9);
        assert_eq!(g.effective_label(), EffectiveLabel::Good);
    }

    #[test]
    fn test_delete_peak_bounds() {
        let mut g = group_with_peaks(3);
        assert!(!g.delete_peak(3));
        assert!(g.delete_peak(1));
        assert_eq!(g.peak_count(), 2);
        assert_eq!(g.peaks()[1].sample_id(), 3);
    }

    #[test]
    fn test_deletion_leaves_aggregates_stale() {
        let mut g = group_with_peaks(2);
        g.group_statistics();
        let before = g.max_intensity;
        assert!(g.delete_peak(1));
        assert_eq!(g.max_intensity, before);
        g.group_statistics();
        assert_eq!(g.max_intensity, 100.0);
    }

    #[test]
    fn test_delete_child_keeps_sibling_parent() {
        let mut parent = group_with_peaks(1);
        parent.add_child(group_with_peaks(1));
        parent.add_child(group_with_peaks(2));
        let second = parent.children()[1].uid();

        assert!(parent.delete_child(0));
        assert_eq!(parent.child_count(), 1);
        assert_eq!(parent.children()[0].uid(), second);
        assert_eq!(parent.children()[0].parent(), Some(parent.uid()));

        assert!(!parent.delete_child(5));
        assert!(!parent.delete_child_by_uid(GroupUid::fresh()));
        assert!(parent.delete_child_by_uid(second));
        assert_eq!(parent.child_count(), 0);
    }

    #[test]
    fn test_clone_is_deep_and_reparented() {
        let mut original = group_with_peaks(2);
        original.add_child(group_with_peaks(1));
        let mut outer = PeakGroup::new();
        outer.add_child(original);
        let original = &outer.children()[0];

        let mut copy = original.clone();
        assert_ne!(copy.uid(), original.uid());
        assert_eq!(copy.parent(), None);
        assert_eq!(copy.children()[0].parent(), Some(copy.uid()));
        assert_eq!(original.children()[0].parent(), Some(original.uid()));

        copy.peaks_mut()[0].peak_intensity = -1.0;
        copy.delete_peak(1);
        assert_eq!(original.peak_count(), 2);
        assert_eq!(original.peaks()[0].peak_intensity, 100.0);
    }

    #[test]
    fn test_copy_obj_keeps_own_identity() {
        let source = group_with_peaks(2);
        let mut holder = PeakGroup::new();
        holder.add_child(PeakGroup::new());
        let target_uid = holder.children()[0].uid();
        let parent_uid = holder.uid();

        let target = &mut holder.children_mut()[0];
        target.copy_obj(&source);
        assert_eq!(target.uid(), target_uid);
        assert_eq!(target.parent(), Some(parent_uid));
        assert_eq!(target.peak_count(), 2);
    }

    #[test]
    fn test_group_id_cascades_to_descendants() {
        let mut child = PeakGroup::new();
        child.add_child(PeakGroup::new());
        let mut g = PeakGroup::new();
        g.add_child(child);
        g.group_id = 7;
        g.set_group_id_for_children();
        assert_eq!(g.children()[0].group_id, 7);
        assert_eq!(g.children()[0].children()[0].group_id, 7);
    }

    #[test]
    fn test_ordered_intensity_vector_follows_sample_order() {
        let s1 = sample(1);
        let s2 = sample(2);
        let s3 = sample(3);
        let mut g = PeakGroup::new();
        g.add_peak(Peak::new(s3.clone(), 5.0, 200.0, 30.0));
        g.add_peak(Peak::new(s1.clone(), 5.0, 200.0, 10.0));

        let v = g.ordered_intensity_vector(&[s2.clone(), s3.clone(), s1.clone()], QuantType::Height);
        assert_eq!(v, vec![0.0, 30.0, 10.0]);
        assert!(g.ordered_intensity_vector(&[], QuantType::Height).is_empty());
    }

    #[test]
    fn test_current_intensity_cache_invalidated_on_type_change() {
        let mut g = group_with_peaks(2);
        g.peaks_mut()[1].peak_area_top = 50.0;
        g.group_statistics();
        assert_eq!(g.current_intensity(), 100.0);
        g.set_quantitation_type(QuantType::Height);
        assert_eq!(g.current_intensity(), 200.0);
    }

    #[test]
    fn test_name_preference() {
        let mut g = PeakGroup::new();
        g.group_id = 12;
        assert_eq!(g.name(), "12");
        g.mean_mz = 180.06339;
        g.mean_rt = 4.257;
        assert_eq!(g.name(), "180.0634@4.26");
        g.srm_id = "srm-1".into();
        assert!(g.has_srm_id());
        assert_eq!(g.name(), "srm-1");
        g.tag_string = "tagged".into();
        assert_eq!(g.name(), "tagged");
        g.compound = Some(CompoundRef { name: "glucose".into(), ..Default::default() });
        assert_eq!(g.name(), "glucose");
    }

    #[test]
    fn test_slice_presence() {
        let mut g = PeakGroup::new();
        assert!(!g.has_slice());
        assert!(g.slice_is_zero());
        g.set_slice(MzSlice::new(100.0, 100.01, 0.0, 0.0));
        assert!(g.has_slice());
        assert!(g.slice_is_zero());
        g.set_slice(MzSlice::new(100.0, 100.01, 2.0, 3.0));
        assert!(!g.slice_is_zero());
    }

    #[test]
    fn test_label_disagreement() {
        let mut g = PeakGroup::new();
        g.add_peak(Peak::new(sample(1), 5.0, 200.0, 1.0).with_quality(0.9));
        g.add_peak(Peak::new(sample(2), 5.0, 200.0, 1.0).with_quality(0.1));
        g.add_peak(Peak::new(sample(3), 5.0, 200.0, 1.0).with_quality(0.1));
        assert_eq!(g.label_disagreement(0.5), 0.0);
        g.set_user_label('g');
        assert!((g.label_disagreement(0.5) - 2.0 / 3.0).abs() < 1e-6);
        g.set_user_label('b');
        assert!((g.label_disagreement(0.5) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_serde_relink() {
        let mut g = group_with_peaks(1);
        g.add_child(group_with_peaks(1));
        let json = serde_json::to_string(&g).unwrap();
        let mut back: PeakGroup = serde_json::from_str(&json).unwrap();
        assert_eq!(back.children()[0].parent(), None);
        back.relink_children();
        assert_eq!(back.children()[0].parent(), Some(back.uid()));
        assert_eq!(back.peaks()[0].sample_id(), 1);
    }
}
