//! The owning collection of peak groups and table-title bookkeeping.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::algorithm::alignment::{Aligner, AlignmentReport};
use crate::algorithm::clustering::{cluster_groups, ClusterHooks, ClusterOutcome, ClusterParams};
use crate::algorithm::compare::GroupOrder;
use crate::algorithm::correlation::EicCorrelator;
use crate::algorithm::statistics::RankParams;
use crate::data::label::{ClassifiedLabel, UserLabel};
use crate::data::peak_group::{GroupUid, PeakGroup};
use crate::data::sample::Sample;

/// Tolerance for treating two groups as the same feature.
const SAME_MZ_RT_TOLERANCE: f32 = 1e-5;

/// Views of a table by predicted label.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum SubsetType {
    All,
    /// predicted `Signal` only
    Good,
    /// predicted `Noise`
    Bad,
    /// everything not predicted `Noise`
    ExcludeBad,
    /// not classified
    Unmarked,
    Correlated,
    Variance,
    CorrelatedVariance,
}

impl SubsetType {
    pub const ALL: [SubsetType; 8] = [
        SubsetType::All,
        SubsetType::Good,
        SubsetType::Bad,
        SubsetType::ExcludeBad,
        SubsetType::Unmarked,
        SubsetType::Correlated,
        SubsetType::Variance,
        SubsetType::CorrelatedVariance,
    ];

    pub fn contains(&self, label: ClassifiedLabel) -> bool {
        match self {
            SubsetType::All => true,
            SubsetType::Good => label == ClassifiedLabel::Signal,
            SubsetType::Bad => label == ClassifiedLabel::Noise,
            SubsetType::ExcludeBad => label != ClassifiedLabel::Noise,
            SubsetType::Unmarked => label == ClassifiedLabel::None,
            SubsetType::Correlated => label == ClassifiedLabel::Correlation,
            SubsetType::Variance => label == ClassifiedLabel::Pattern,
            SubsetType::CorrelatedVariance => label == ClassifiedLabel::CorrelationAndPattern,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStatus {
    pub total: usize,
    pub good: usize,
    pub bad: usize,
}

/// Per-peak confusion counts of peak quality against curated peak labels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
    pub good_peaks: usize,
    pub bad_peaks: usize,
    pub total: usize,
    pub accuracy: f32,
}

/// Ordered, exclusively owned collection of peak groups.
///
/// Every membership change renumbers `group_id` to `1..=len` and cascades the
/// ids to children. Iteration order is insertion order until a sort or a
/// clustering run.
#[derive(Debug, Default)]
pub struct PeakTable {
    pub id: i32,
    title: String,
    samples: Vec<Arc<Sample>>,
    groups: Vec<PeakGroup>,
    labeled_groups: usize,
    targeted_groups: usize,
}

impl PeakTable {
    pub fn new(id: i32, title: &str) -> Self {
        PeakTable { id, title: title.to_string(), ..Default::default() }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    /// Sample order used for intensity vectors and report columns.
    pub fn samples(&self) -> &[Arc<Sample>] {
        &self.samples
    }

    pub fn set_samples(&mut self, samples: Vec<Arc<Sample>>) {
        self.samples = samples;
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[PeakGroup] {
        &self.groups
    }

    /// Mutable access to the groups; membership cannot change through it.
    pub fn groups_mut(&mut self) -> &mut [PeakGroup] {
        &mut self.groups
    }

    /// Groups with children.
    pub fn labeled_groups(&self) -> usize {
        self.labeled_groups
    }

    /// Groups linked to a compound.
    pub fn targeted_groups(&self) -> usize {
        self.targeted_groups
    }

    fn count_in(&mut self, group: &PeakGroup) {
        if group.child_count() > 0 {
            self.labeled_groups += 1;
        }
        if group.has_compound_link() {
            self.targeted_groups += 1;
        }
    }

    fn count_out(&mut self, group: &PeakGroup) {
        if group.child_count() > 0 {
            self.labeled_groups = self.labeled_groups.saturating_sub(1);
        }
        if group.has_compound_link() {
            self.targeted_groups = self.targeted_groups.saturating_sub(1);
        }
    }

    fn renumber(&mut self) {
        for (i, g) in self.groups.iter_mut().enumerate() {
            g.group_id = i as i32 + 1;
            g.set_group_id_for_children();
        }
    }

    fn admit(&mut self, mut group: PeakGroup) {
        group.relink_children();
        group.search_table_name = self.title.clone();
        self.count_in(&group);
        self.groups.push(group);
    }

    /// Append `group`, stamp it with this table's title and give it the
    /// next id.
    pub fn add_group(&mut self, group: PeakGroup) -> &PeakGroup {
        self.admit(group);
        let last = self.groups.len() - 1;
        let g = &mut self.groups[last];
        g.group_id = last as i32 + 1;
        g.set_group_id_for_children();
        &self.groups[last]
    }

    /// Append every group, then renumber the table once.
    pub fn add_groups<I>(&mut self, groups: I) -> usize
    where
        I: IntoIterator<Item = PeakGroup>,
    {
        let before = self.groups.len();
        for group in groups {
            self.admit(group);
        }
        self.renumber();
        let added = self.groups.len() - before;
        log::debug!("table {}: added {} groups, {} total", self.id, added, self.groups.len());
        added
    }

    /// Remove the top-level group at `index`; `false` if out of range.
    pub fn remove_group(&mut self, index: usize) -> bool {
        if index >= self.groups.len() {
            return false;
        }
        let removed = self.groups.remove(index);
        self.count_out(&removed);
        self.renumber();
        log::debug!("table {}: removed group at {}, {} left", self.id, index, self.groups.len());
        true
    }

    /// Remove a group by uid, either a top-level group or a nested child.
    pub fn remove_by_uid(&mut self, uid: GroupUid) -> bool {
        if let Some(index) = self.groups.iter().position(|g| g.uid() == uid) {
            return self.remove_group(index);
        }
        let parent = match self.parent_of(uid) {
            Some(p) => p.uid(),
            None => return false,
        };
        let removed = self
            .groups
            .iter_mut()
            .find_map(|g| g.find_mut(parent))
            .map_or(false, |p| p.delete_child_by_uid(uid));
        if removed {
            self.recount();
            self.renumber();
            log::debug!("table {}: removed child group", self.id);
        }
        removed
    }

    fn recount(&mut self) {
        self.labeled_groups = self.groups.iter().filter(|g| g.child_count() > 0).count();
        self.targeted_groups = self.groups.iter().filter(|g| g.has_compound_link()).count();
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.labeled_groups = 0;
        self.targeted_groups = 0;
    }

    pub fn find(&self, uid: GroupUid) -> Option<&PeakGroup> {
        self.groups.iter().find_map(|g| g.find(uid))
    }

    pub fn find_mut(&mut self, uid: GroupUid) -> Option<&mut PeakGroup> {
        self.groups.iter_mut().find_map(|g| g.find_mut(uid))
    }

    /// The group owning `uid` as a direct child; `None` for top-level groups.
    pub fn parent_of(&self, uid: GroupUid) -> Option<&PeakGroup> {
        let parent = self.find(uid)?.parent()?;
        self.find(parent)
    }

    /// Flat list of the top-level groups, as consumed by an `Aligner`.
    pub fn group_refs_mut(&mut self) -> Vec<&mut PeakGroup> {
        self.groups.iter_mut().collect()
    }

    /// Visit every group and child, each parent before its descendants.
    pub fn for_each_group_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut PeakGroup),
    {
        for g in &mut self.groups {
            g.visit_mut(&mut f);
        }
    }

    // ---- labels -------------------------------------------------------------

    pub fn validation_status(&self) -> ValidationStatus {
        let mut status = ValidationStatus { total: self.groups.len(), ..Default::default() };
        for g in &self.groups {
            match g.user_label() {
                Some(UserLabel::Good) => status.good += 1,
                Some(UserLabel::Bad) => status.bad += 1,
                None => {}
            }
        }
        status
    }

    /// `true` when every group carries a user label (vacuously for an empty
    /// table).
    pub fn all_groups_labeled(&self) -> bool {
        self.groups.iter().all(|g| g.user_label().is_some())
    }

    pub fn subset(&self, subset: SubsetType) -> Vec<&PeakGroup> {
        self.groups
            .iter()
            .filter(|g| subset.contains(g.predicted_label()))
            .collect()
    }

    pub fn count_by_subsets(&self) -> BTreeMap<SubsetType, usize> {
        let mut counts: BTreeMap<SubsetType, usize> = SubsetType::ALL.iter().map(|s| (*s, 0)).collect();
        for g in &self.groups {
            let label = g.predicted_label();
            for s in SubsetType::ALL {
                if s.contains(label) {
                    *counts.entry(s).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    /// Peak-level accuracy of `quality > min_quality` as a good/bad call,
    /// over groups a reviewer has labeled. `None` when no such peak exists.
    pub fn accuracy(&self, min_quality: f32) -> Option<AccuracyReport> {
        let mut r = AccuracyReport::default();
        for g in self.groups.iter().filter(|g| g.user_label().is_some()) {
            for p in g.peaks() {
                match p.label {
                    Some(UserLabel::Good) => {
                        r.good_peaks += 1;
                        if p.quality > min_quality {
                            r.true_positive += 1;
                        } else if p.quality < min_quality {
                            r.false_negative += 1;
                        }
                    }
                    Some(UserLabel::Bad) => {
                        r.bad_peaks += 1;
                        if p.quality < min_quality {
                            r.true_negative += 1;
                        } else if p.quality > min_quality {
                            r.false_positive += 1;
                        }
                    }
                    None => {}
                }
                r.total += 1;
            }
        }
        if r.total == 0 {
            return None;
        }
        r.accuracy = 1.0 - (r.false_positive + r.false_negative) as f32 / r.total as f32;
        Some(r)
    }

    // ---- membership across tables -------------------------------------------

    /// Move all groups into `target`, continuing its id sequence. Returns the
    /// number of groups moved; this table is left empty.
    pub fn merge_into(&mut self, target: &mut PeakTable) -> usize {
        let groups = std::mem::take(&mut self.groups);
        self.clear();
        let moved = groups.len();
        let mut next_id = target.groups.len() as i32;
        for mut g in groups {
            next_id += 1;
            g.group_id = next_id;
            g.set_group_id_for_children();
            target.count_in(&g);
            target.groups.push(g);
        }
        log::debug!("merged {} groups from table {} into table {}", moved, self.id, target.id);
        moved
    }

    /// `group` itself, or another group at the same m/z and rt, is present.
    pub fn contains_same_mz_rt(&self, group: &PeakGroup) -> bool {
        self.groups.iter().any(|g| {
            g.uid() == group.uid()
                || ((g.mean_mz - group.mean_mz).abs() < SAME_MZ_RT_TOLERANCE
                    && (g.mean_rt - group.mean_rt).abs() < SAME_MZ_RT_TOLERANCE)
        })
    }

    // ---- analytics ----------------------------------------------------------

    /// Stable sort with an arbitrary comparator.
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&PeakGroup, &PeakGroup) -> Ordering,
    {
        self.groups.sort_by(compare);
    }

    pub fn sort(&mut self, order: GroupOrder) {
        self.sort_by(order.comparator());
    }

    /// Recompute statistics and quality of every group and child.
    pub fn update_statistics(&mut self, min_quality: f32) {
        self.for_each_group_mut(|g| {
            g.group_statistics();
            g.update_quality(min_quality);
        });
    }

    pub fn rank(&mut self, params: &RankParams) {
        self.for_each_group_mut(|g| {
            g.cal_group_rank(params);
        });
    }

    pub fn cluster<E>(&mut self, params: &ClusterParams, eic: &E, hooks: &ClusterHooks) -> ClusterOutcome
    where
        E: EicCorrelator + ?Sized,
    {
        cluster_groups(&mut self.groups, &self.samples, params, eic, hooks)
    }

    pub fn clear_clusters(&mut self) {
        for g in &mut self.groups {
            g.cluster_id = 0;
        }
    }

    pub fn align(&mut self, aligner: &dyn Aligner) -> AlignmentReport {
        let mut refs = self.group_refs_mut();
        aligner.align(&mut refs)
    }
}

/// Explicit id → title bookkeeping for a set of tables.
///
/// Id `-1` is the scatter-plot table and id `0` the bookmark table; both have
/// fixed titles. Titles of other tables default to `Peak Table N` and are made
/// unique with a ` (k)` suffix.
#[derive(Clone, Debug, Default)]
pub struct TitleRegistry {
    titles: BTreeMap<i32, String>,
}

impl TitleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.titles.clear();
    }

    /// Register a title for `id` and return it. An id that is already
    /// registered keeps its title.
    pub fn set_title_for_id(&mut self, id: i32, title: &str) -> String {
        if let Some(existing) = self.titles.get(&id) {
            return existing.clone();
        }
        let resolved = match id {
            -1 => "Scatterplot Peak Table".to_string(),
            0 => "Bookmark Table".to_string(),
            _ if title.is_empty() => format!("Peak Table {}", id),
            _ => self.unique_title(title),
        };
        self.titles.insert(id, resolved.clone());
        resolved
    }

    fn unique_title(&self, title: &str) -> String {
        let pattern = format!(r"^{} \((\d+)\)$", regex::escape(title));
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(_) => return title.to_string(),
        };
        let mut exists = false;
        let mut highest = 0u32;
        for existing in self.titles.values() {
            if let Some(caps) = re.captures(existing) {
                exists = true;
                let k = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()).unwrap_or(0);
                highest = highest.max(k);
            } else if existing == title {
                exists = true;
            }
        }
        if exists {
            format!("{} ({})", title, highest + 1)
        } else {
            title.to_string()
        }
    }

    pub fn title_for_id(&self, id: i32) -> Option<&str> {
        self.titles.get(&id).map(|s| s.as_str())
    }

    pub fn remove(&mut self, id: i32) -> Option<String> {
        self.titles.remove(&id)
    }

    /// Highest registered id, `-1` when empty.
    pub fn last_table_id(&self) -> i32 {
        self.titles.keys().next_back().copied().unwrap_or(-1)
    }

    /// Register a new table after the highest id.
    pub fn register(&mut self, title: &str) -> (i32, String) {
        let id = self.last_table_id() + 1;
        let title = self.set_title_for_id(id, title);
        (id, title)
    }
}
