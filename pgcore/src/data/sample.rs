use std::fmt;
use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

/// One acquired sample (one raw file).
///
/// Peaks hold a shared handle (`Arc<Sample>`) to the sample they were detected
/// in; identity is the numeric `id`, not the handle address.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub is_blank: bool,
    #[serde(default = "default_selected")]
    pub is_selected: bool,
    #[serde(default)]
    pub sample_order: i32,
}

fn default_selected() -> bool {
    true
}

impl Sample {
    pub fn new(id: u32, name: &str) -> Self {
        Sample {
            id,
            name: name.to_string(),
            is_blank: false,
            is_selected: true,
            sample_order: id as i32,
        }
    }

    pub fn blank(id: u32, name: &str) -> Self {
        Sample { is_blank: true, ..Sample::new(id, name) }
    }

    /// Ordering used for report columns: `sample_order`, then `id`.
    pub fn comp_sample_order(a: &Sample, b: &Sample) -> std::cmp::Ordering {
        a.sample_order.cmp(&b.sample_order).then(a.id.cmp(&b.id))
    }
}

impl Display for Sample {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}
