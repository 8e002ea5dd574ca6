//! JSON table files.
//!
//! ```json
//! { "title": "...", "samples": [...], "groups": [...], "eics": [...] }
//! ```
//!
//! Every peak carries a copy of its sample; on load the copies are replaced by
//! the shared handles from `samples`, matched by id.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use pgcore::algorithm::correlation::EicTrace;
use pgcore::{PeakGroup, PeakTable, Sample};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolError};

#[derive(Deserialize)]
struct TableFile {
    #[serde(default)]
    id: i32,
    #[serde(default)]
    title: String,
    samples: Vec<Sample>,
    #[serde(default)]
    groups: Vec<PeakGroup>,
    #[serde(default)]
    eics: Vec<EicTrace>,
}

#[derive(Serialize)]
struct TableFileRef<'a> {
    id: i32,
    title: &'a str,
    samples: &'a [Arc<Sample>],
    groups: &'a [PeakGroup],
    eics: &'a [EicTrace],
}

pub struct LoadedTable {
    pub table: PeakTable,
    pub eics: Vec<EicTrace>,
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).map_err(|source| ToolError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_str(&raw).map_err(|source| ToolError::Json { path: path.to_path_buf(), source })
}

fn share_samples(group: &mut PeakGroup, by_id: &HashMap<u32, Arc<Sample>>) -> Result<()> {
    let mut missing = None;
    group.visit_mut(&mut |g: &mut PeakGroup| {
        for p in g.peaks_mut() {
            match by_id.get(&p.sample.id) {
                Some(shared) => p.sample = Arc::clone(shared),
                None => missing = missing.or(Some(p.sample.id)),
            }
        }
    });
    match missing {
        Some(id) => Err(ToolError::UnknownSample(id)),
        None => Ok(()),
    }
}

pub fn load_table(path: &Path) -> Result<LoadedTable> {
    let file: TableFile = read_json(path)?;
    let samples: Vec<Arc<Sample>> = file.samples.into_iter().map(Arc::new).collect();
    let by_id: HashMap<u32, Arc<Sample>> = samples.iter().map(|s| (s.id, Arc::clone(s))).collect();

    let title = if file.title.is_empty() { format!("Peak Table {}", file.id) } else { file.title };
    let mut table = PeakTable::new(file.id, &title);
    table.set_samples(samples);
    let mut groups = file.groups;
    for group in groups.iter_mut() {
        share_samples(group, &by_id)?;
    }
    table.add_groups(groups);
    log::info!(
        "loaded {} groups over {} samples ({} traces) from {}",
        table.len(),
        table.samples().len(),
        file.eics.len(),
        path.display()
    );
    Ok(LoadedTable { table, eics: file.eics })
}

pub fn to_json(table: &PeakTable, eics: &[EicTrace]) -> Result<String> {
    let out = TableFileRef {
        id: table.id,
        title: table.title(),
        samples: table.samples(),
        groups: table.groups(),
        eics,
    };
    serde_json::to_string_pretty(&out).map_err(|source| ToolError::Json { path: "<output>".into(), source })
}

/// Write `contents` to `path`, or to stdout when no path is given.
pub fn emit(path: Option<&Path>, contents: &str) -> Result<()> {
    match path {
        Some(p) => fs::write(p, contents).map_err(|source| ToolError::Io { path: p.to_path_buf(), source }),
        None => {
            println!("{}", contents);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgcore::Peak;

    #[test]
    fn test_peaks_share_table_samples() {
        let a = Arc::new(Sample::new(1, "a"));
        let mut g = PeakGroup::new();
        g.add_peak(Peak::new(Arc::new(Sample::new(1, "a")), 5.0, 100.0, 10.0));
        let by_id = HashMap::from([(1, Arc::clone(&a))]);
        share_samples(&mut g, &by_id).unwrap();
        assert!(Arc::ptr_eq(&g.peaks()[0].sample, &a));
    }

    #[test]
    fn test_unknown_sample_is_an_error() {
        let mut g = PeakGroup::new();
        g.add_peak(Peak::new(Arc::new(Sample::new(7, "x")), 5.0, 100.0, 10.0));
        let err = share_samples(&mut g, &HashMap::new()).unwrap_err();
        assert!(matches!(err, ToolError::UnknownSample(7)));
    }

    #[test]
    fn test_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("pgtool-io-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("table.json");

        let s = Arc::new(Sample::new(1, "a"));
        let mut table = PeakTable::new(3, "");
        table.set_samples(vec![s.clone()]);
        let mut g = PeakGroup::new();
        g.add_peak(Peak::new(s, 5.0, 100.0, 10.0));
        table.add_group(g);
        fs::write(&path, to_json(&table, &[]).unwrap()).unwrap();

        let loaded = load_table(&path).unwrap();
        assert_eq!(loaded.table.len(), 1);
        assert_eq!(loaded.table.title(), "Peak Table 3");
        assert!(Arc::ptr_eq(&loaded.table.groups()[0].peaks()[0].sample, &loaded.table.samples()[0]));
        fs::remove_dir_all(&dir).unwrap();
    }
}
