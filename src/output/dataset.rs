//! Finalized datasets: the full record list, per-group subsets and a summary

use crate::output::OutputResult;
use crate::state::ExtractedRecord;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Group name used for records whose grouping field is empty
pub const UNGROUPED: &str = "ungrouped";

/// Summary object written next to every dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub total_records: usize,

    /// Number of distinct values of the first grouping key
    pub distinct_groups: usize,

    /// Sorted values of the first grouping key
    pub group_names: Vec<String>,

    /// Every grouping key with its sorted values
    pub groups: BTreeMap<String, Vec<String>>,

    /// Logical name to file name
    pub files: BTreeMap<String, String>,
}

/// Records grouped under one value of one grouping key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupFile {
    pub key: String,
    pub value: String,
    pub file_name: String,
    pub records: Vec<ExtractedRecord>,
}

/// A dataset ready to be written
///
/// Built by `MergeSink::finalize`; everything in it is ordered, so rendering
/// the same output twice gives identical bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedOutput {
    pub dataset: String,
    pub records: Vec<ExtractedRecord>,
    pub groups: Vec<GroupFile>,
    pub summary: DatasetSummary,
}

impl FinalizedOutput {
    /// Groups `records` (already in output order) by each key in `group_by`
    pub fn build(dataset: &str, records: Vec<ExtractedRecord>, group_by: &[String]) -> Self {
        let mut groups = Vec::new();
        let mut group_values = BTreeMap::new();

        for key in group_by {
            let mut by_value: BTreeMap<String, Vec<ExtractedRecord>> = BTreeMap::new();
            for record in &records {
                by_value
                    .entry(group_value(record, key))
                    .or_default()
                    .push(record.clone());
            }

            let mut used_slugs = BTreeSet::new();
            for (value, members) in by_value {
                let file_name = unique_file_name(dataset, key, &value, &mut used_slugs);
                groups.push(GroupFile {
                    key: key.clone(),
                    value,
                    file_name,
                    records: members,
                });
            }

            group_values.insert(
                key.clone(),
                groups
                    .iter()
                    .filter(|g| &g.key == key)
                    .map(|g| g.value.clone())
                    .collect::<Vec<_>>(),
            );
        }

        let group_names = group_by
            .first()
            .and_then(|key| group_values.get(key))
            .cloned()
            .unwrap_or_default();

        let mut files = BTreeMap::new();
        files.insert("all".to_string(), full_file_name(dataset));
        files.insert("summary".to_string(), summary_file_name(dataset));
        for group in &groups {
            files.insert(
                format!("{}:{}", group.key, group.value),
                group.file_name.clone(),
            );
        }

        let summary = DatasetSummary {
            total_records: records.len(),
            distinct_groups: group_names.len(),
            group_names,
            groups: group_values,
            files,
        };

        Self {
            dataset: dataset.to_string(),
            records,
            groups,
            summary,
        }
    }

    /// File name and pretty-printed contents of every variant, full dataset first
    pub fn rendered_files(&self) -> OutputResult<Vec<(String, String)>> {
        let mut files = Vec::with_capacity(self.groups.len() + 2);
        files.push((full_file_name(&self.dataset), to_pretty_json(&self.records)?));

        for group in &self.groups {
            files.push((group.file_name.clone(), to_pretty_json(&group.records)?));
        }

        files.push((summary_file_name(&self.dataset), to_pretty_json(&self.summary)?));
        Ok(files)
    }
}

fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> OutputResult<String> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}

fn group_value(record: &ExtractedRecord, key: &str) -> String {
    let value = record.get(key).trim();
    if value.is_empty() {
        UNGROUPED.to_string()
    } else {
        value.to_string()
    }
}

fn full_file_name(dataset: &str) -> String {
    format!("{}.json", dataset)
}

fn summary_file_name(dataset: &str) -> String {
    format!("{}-summary.json", dataset)
}

/// `<dataset>-by-<key>-<slug>.json`, suffixed when two values share a slug
fn unique_file_name(
    dataset: &str,
    key: &str,
    value: &str,
    used: &mut BTreeSet<String>,
) -> String {
    let base = slugify(value);
    let mut slug = base.clone();
    let mut n = 2;
    while !used.insert(slug.clone()) {
        slug = format!("{}-{}", base, n);
        n += 1;
    }
    format!("{}-by-{}-{}.json", dataset, slugify(key), slug)
}

/// Lowercase ASCII alphanumerics separated by single dashes
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;

    for ch in value.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        UNGROUPED.to_string()
    } else {
        slug
    }
}
