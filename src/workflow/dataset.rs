//! JSONL dataset loading.
//!
//! A dataset is a `<datasets>/<name>.jsonl` file with one [`WorkItem`] per
//! line. Blank lines are skipped; a malformed record aborts the load with
//! its 1-based line number.

use std::path::{Path, PathBuf};

use crate::error::DatasetError;

use super::WorkItem;

/// Path of the dataset file `name` inside `datasets_dir`.
pub fn dataset_path(datasets_dir: &Path, name: &str) -> PathBuf {
    if name.ends_with(".jsonl") {
        datasets_dir.join(name)
    } else {
        datasets_dir.join(format!("{name}.jsonl"))
    }
}

/// Load the dataset `name` from `datasets_dir`.
pub fn load_dataset(datasets_dir: &Path, name: &str) -> Result<Vec<WorkItem>, DatasetError> {
    let path = dataset_path(datasets_dir, name);
    if !path.is_file() {
        return Err(DatasetError::NotFound(path.display().to_string()));
    }

    let raw = std::fs::read_to_string(&path)?;
    let items = parse_dataset(&raw)?;
    tracing::info!(
        dataset = %path.display(),
        items = items.len(),
        "Loaded dataset"
    );
    Ok(items)
}

/// Parse JSONL content into work items.
pub fn parse_dataset(raw: &str) -> Result<Vec<WorkItem>, DatasetError> {
    let mut items = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let item: WorkItem = serde_json::from_str(line)
            .map_err(|source| DatasetError::InvalidRecord { line: idx + 1, source })?;
        items.push(item);
    }
    Ok(items)
}

/// Find a work item by id.
pub fn find_by_id(items: &[WorkItem], id: u64) -> Option<&WorkItem> {
    items.iter().find(|item| item.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::fixtures::work_item;

    fn to_line(item: &WorkItem) -> String {
        serde_json::to_string(item).unwrap()
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let raw = format!("{}\n\n{}\n", to_line(&work_item(1)), to_line(&work_item(2)));
        let items = parse_dataset(&raw).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].id, 2);
    }

    #[test]
    fn test_parse_reports_line_number() {
        let raw = format!("{}\nnot json\n", to_line(&work_item(1)));
        match parse_dataset(&raw) {
            Err(DatasetError::InvalidRecord { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_parse_reads_main_language_field() {
        let line = to_line(&work_item(3));
        assert!(line.contains("\"mainLanguage\""));
        let items = parse_dataset(&line).unwrap();
        assert_eq!(items[0].main_language.as_deref(), Some("Rust"));
    }

    #[test]
    fn test_load_dataset_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_dataset(dir.path(), "absent");
        assert!(matches!(result, Err(DatasetError::NotFound(_))));
    }

    #[test]
    fn test_load_dataset_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bench.jsonl"), to_line(&work_item(9))).unwrap();
        let items = load_dataset(dir.path(), "bench").unwrap();
        assert_eq!(items.len(), 1);
        assert!(find_by_id(&items, 9).is_some());
        assert!(find_by_id(&items, 10).is_none());
    }

    #[test]
    fn test_dataset_path_accepts_extension() {
        let dir = Path::new("/d");
        assert_eq!(dataset_path(dir, "x"), PathBuf::from("/d/x.jsonl"));
        assert_eq!(dataset_path(dir, "x.jsonl"), PathBuf::from("/d/x.jsonl"));
    }
}
