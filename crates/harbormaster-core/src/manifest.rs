//! Manifest path convention parsing and change records.
//!
//! Manifest files live at `<folderOrder>-<folderName>/<fileOrder>-<fileName>.yml`
//! relative to the monitored folder. The numeric prefixes establish the
//! total deployment order: folders first, files within a folder second.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// A repository-relative manifest path parsed against the ordering
/// convention. Paths that violate the convention are not representable
/// and get skipped upstream with a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestPath {
    pub folder_order: u32,
    pub folder_name: String,
    pub file_order: u32,
    pub file_name: String,
    /// The path as reported, relative to the monitored folder.
    pub full_path: String,
}

fn path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+)-([^/]+)/(\d+)-([^/]+?)\.ya?ml$").expect("static pattern")
    })
}

impl ManifestPath {
    /// Parse a path relative to the monitored folder. Returns `None` when
    /// the path has no folder component or either segment lacks the
    /// numeric-dash prefix.
    pub fn parse(relative: &str) -> Option<ManifestPath> {
        let captures = path_pattern().captures(relative)?;
        Some(ManifestPath {
            folder_order: captures[1].parse().ok()?,
            folder_name: captures[2].to_string(),
            file_order: captures[3].parse().ok()?,
            file_name: captures[4].to_string(),
            full_path: relative.to_string(),
        })
    }

    /// Composite sort key: folder order first, file order second.
    pub fn order_key(&self) -> (u32, u32) {
        (self.folder_order, self.file_order)
    }

    /// The file name without its order prefix or extension, e.g.
    /// `"app-deployment"` for `2-app/1-app-deployment.yml`.
    pub fn file_stem(&self) -> &str {
        &self.file_name
    }

    /// The trailing segment of the stem, after the last hyphen. This is
    /// the seed for job names and kind detection: `"deployment"` for
    /// `1-app-deployment.yml`.
    pub fn stem_tail(&self) -> &str {
        self.file_name
            .rsplit('-')
            .next()
            .unwrap_or(&self.file_name)
    }
}

impl std::fmt::Display for ManifestPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_path)
    }
}

/// Per-file status reported by the manifest host for a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Added,
    Modified,
    Removed,
    Renamed,
    Copied,
    Unchanged,
}

impl ChangeStatus {
    /// Parse the status string from the commit API. The API reports
    /// `"changed"` for some modifications; it is treated as modified.
    pub fn parse(status: &str) -> Option<ChangeStatus> {
        match status {
            "added" => Some(ChangeStatus::Added),
            "modified" | "changed" => Some(ChangeStatus::Modified),
            "removed" => Some(ChangeStatus::Removed),
            "renamed" => Some(ChangeStatus::Renamed),
            "copied" => Some(ChangeStatus::Copied),
            "unchanged" => Some(ChangeStatus::Unchanged),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeStatus::Added => "added",
            ChangeStatus::Modified => "modified",
            ChangeStatus::Removed => "removed",
            ChangeStatus::Renamed => "renamed",
            ChangeStatus::Copied => "copied",
            ChangeStatus::Unchanged => "unchanged",
        };
        f.write_str(s)
    }
}

/// One file touched by a commit, already parsed against the convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub path: ManifestPath,
    pub status: ChangeStatus,
}

/// Sort change records into deployment order: ascending
/// `(folder_order, file_order)`, independent of reporting order.
pub fn sort_records(records: &mut [ChangeRecord]) {
    records.sort_by_key(|record| record.path.order_key());
}
