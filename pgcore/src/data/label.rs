//! Classification labels.
//!
//! A group carries two independent labels: the reviewer's `UserLabel` and the
//! classifier's `ClassifiedLabel`. Any consumer that must pick one good/bad
//! decision goes through `EffectiveLabel::resolve`, where the reviewer wins.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::{Display, Formatter};

use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Machine-predicted class of a peak group.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub enum ClassifiedLabel {
    /// not classified yet
    #[default]
    None,
    /// too noisy to be a metabolite
    Noise,
    /// clear signal, not necessarily interesting
    Signal,
    /// signal correlated to one or more other signals
    Correlation,
    /// signal with an interesting inter-cohort intensity pattern
    Pattern,
    CorrelationAndPattern,
}

impl ClassifiedLabel {
    /// Integer class id `0..=4` to label; anything else is `None`.
    pub fn from_value(value: i32) -> ClassifiedLabel {
        match value {
            0 => ClassifiedLabel::Noise,
            1 => ClassifiedLabel::Signal,
            2 => ClassifiedLabel::Correlation,
            3 => ClassifiedLabel::Pattern,
            4 => ClassifiedLabel::CorrelationAndPattern,
            _ => ClassifiedLabel::None,
        }
    }

    /// Inverse of `from_value`; `None` maps to `-1`.
    pub fn value(&self) -> i32 {
        match self {
            ClassifiedLabel::Noise => 0,
            ClassifiedLabel::Signal => 1,
            ClassifiedLabel::Correlation => 2,
            ClassifiedLabel::Pattern => 3,
            ClassifiedLabel::CorrelationAndPattern => 4,
            ClassifiedLabel::None => -1,
        }
    }

    /// Everything except `Noise` and `None` reads as "the classifier thinks
    /// this is good".
    #[inline]
    pub fn is_signal(&self) -> bool {
        !matches!(self, ClassifiedLabel::None | ClassifiedLabel::Noise)
    }

    pub fn legend(&self) -> &'static str {
        match self {
            ClassifiedLabel::CorrelationAndPattern => "Signal with correlation and cohort-variance",
            ClassifiedLabel::Correlation => "Signal with only correlation",
            ClassifiedLabel::Pattern => "Signal with only cohort-variance",
            ClassifiedLabel::Signal => "Signal",
            ClassifiedLabel::Noise => "Noise",
            ClassifiedLabel::None => "Unclassified",
        }
    }
}

impl Display for ClassifiedLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ClassifiedLabel::None => write!(f, "None"),
            ClassifiedLabel::Noise => write!(f, "Noise"),
            ClassifiedLabel::Signal => write!(f, "Signal"),
            ClassifiedLabel::Correlation => write!(f, "Correlation"),
            ClassifiedLabel::Pattern => write!(f, "Pattern"),
            ClassifiedLabel::CorrelationAndPattern => write!(f, "CorrelationAndPattern"),
        }
    }
}

/// Reviewer decision. Unset is represented by `Option::None` at use sites.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum UserLabel {
    #[serde(rename = "g")]
    Good,
    #[serde(rename = "b")]
    Bad,
}

impl UserLabel {
    /// Parses the character surface: `'g'`, `'b'` or `'\0'` (unset).
    /// Returns `None` for characters that are not a label at all.
    pub fn parse(c: char) -> Option<Option<UserLabel>> {
        match c {
            'g' => Some(Some(UserLabel::Good)),
            'b' => Some(Some(UserLabel::Bad)),
            '\0' => Some(None),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            UserLabel::Good => 'g',
            UserLabel::Bad => 'b',
        }
    }
}

/// The single good/bad decision a consumer acts on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum EffectiveLabel {
    Good,
    Bad,
    Unmarked,
}

impl EffectiveLabel {
    /// User label if set, else the predicted label.
    pub fn resolve(user: Option<UserLabel>, predicted: ClassifiedLabel) -> EffectiveLabel {
        match user {
            Some(UserLabel::Good) => EffectiveLabel::Good,
            Some(UserLabel::Bad) => EffectiveLabel::Bad,
            None if predicted == ClassifiedLabel::None => EffectiveLabel::Unmarked,
            None if predicted.is_signal() => EffectiveLabel::Good,
            None => EffectiveLabel::Bad,
        }
    }
}

/// Feature contributions behind a prediction: signed weight -> feature name.
///
/// Several features may share a weight. Iteration is ascending by weight and,
/// within one weight, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<(f32, String)>", into = "Vec<(f32, String)>")]
pub struct PredictionInference {
    entries: BTreeMap<OrderedFloat<f32>, Vec<String>>,
}

impl PredictionInference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, weight: f32, feature: impl Into<String>) {
        self.entries.entry(OrderedFloat(weight)).or_default().push(feature.into());
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f32, &str)> + '_ {
        self.entries
            .iter()
            .flat_map(|(w, names)| names.iter().map(move |n| (w.0, n.as_str())))
    }

    /// The `n` features with the largest weights, largest first.
    pub fn top_n(&self, n: usize) -> Vec<(f32, &str)> {
        self.entries
            .iter()
            .rev()
            .flat_map(|(w, names)| names.iter().map(move |n| (w.0, n.as_str())))
            .take(n)
            .collect()
    }

    /// `name=weight` pairs of the top `n` features, joined for a report cell.
    pub fn describe_top(&self, n: usize) -> String {
        self.top_n(n)
            .into_iter()
            .map(|(w, name)| format!("{}={:.3}", name, w))
            .join(";")
    }
}

impl From<Vec<(f32, String)>> for PredictionInference {
    fn from(pairs: Vec<(f32, String)>) -> Self {
        let mut inference = PredictionInference::new();
        for (w, name) in pairs {
            inference.insert(w, name);
        }
        inference
    }
}

impl From<PredictionInference> for Vec<(f32, String)> {
    fn from(inference: PredictionInference) -> Self {
        inference
            .entries
            .into_iter()
            .flat_map(|(w, names)| names.into_iter().map(move |n| (w.0, n)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELS: [ClassifiedLabel; 5] = [
        ClassifiedLabel::Noise,
        ClassifiedLabel::Signal,
        ClassifiedLabel::Correlation,
        ClassifiedLabel::Pattern,
        ClassifiedLabel::CorrelationAndPattern,
    ];

    #[test]
    fn test_label_value_round_trip() {
        for label in LABELS {
            assert_eq!(ClassifiedLabel::from_value(label.value()), label);
        }
        assert_eq!(ClassifiedLabel::None.value(), -1);
        assert_eq!(ClassifiedLabel::from_value(5), ClassifiedLabel::None);
        assert_eq!(ClassifiedLabel::from_value(-7), ClassifiedLabel::None);
    }

    #[test]
    fn test_values_are_distinct() {
        let mut values: Vec<i32> = LABELS.iter().map(|l| l.value()).collect();
        values.sort();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_user_label_parse() {
        assert_eq!(UserLabel::parse('g'), Some(Some(UserLabel::Good)));
        assert_eq!(UserLabel::parse('b'), Some(Some(UserLabel::Bad)));
        assert_eq!(UserLabel::parse('\0'), Some(None));
        assert_eq!(UserLabel::parse('i'), None);
    }

    #[test]
    fn test_user_label_overrides_prediction() {
        assert_eq!(
            EffectiveLabel::resolve(Some(UserLabel::Good), ClassifiedLabel::Noise),
            EffectiveLabel::Good
        );
        assert_eq!(
            EffectiveLabel::resolve(Some(UserLabel::Bad), ClassifiedLabel::CorrelationAndPattern),
            EffectiveLabel::Bad
        );
        assert_eq!(EffectiveLabel::resolve(None, ClassifiedLabel::Pattern), EffectiveLabel::Good);
        assert_eq!(EffectiveLabel::resolve(None, ClassifiedLabel::Noise), EffectiveLabel::Bad);
        assert_eq!(EffectiveLabel::resolve(None, ClassifiedLabel::None), EffectiveLabel::Unmarked);
    }

    #[test]
    fn test_inference_keeps_duplicate_weights() {
        let mut inf = PredictionInference::new();
        inf.insert(0.5, "peak_width");
        inf.insert(-0.2, "noise");
        inf.insert(0.5, "gauss_fit");
        inf.insert(0.9, "intensity");
        assert_eq!(inf.len(), 4);

        let top = inf.top_n(3);
        assert_eq!(top[0], (0.9, "intensity"));
        assert_eq!(top[1], (0.5, "peak_width"));
        assert_eq!(top[2], (0.5, "gauss_fit"));

        let asc: Vec<f32> = inf.iter().map(|(w, _)| w).collect();
        assert_eq!(asc, vec![-0.2, 0.5, 0.5, 0.9]);
    }

    #[test]
    fn test_inference_serde_round_trip() {
        let mut inf = PredictionInference::new();
        inf.insert(0.25, "a");
        inf.insert(0.25, "b");
        let json = serde_json::to_string(&inf).unwrap();
        let back: PredictionInference = serde_json::from_str(&json).unwrap();
        assert_eq!(back, inf);
    }
}
