//! Journal storage: trait plus a file-system implementation.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use lanwatch_core::ScanSample;

use crate::{JournalError, Result, ScanEntry, ScanId};

/// Query parameters for listing scan entries.
#[derive(Debug, Default, Clone)]
pub struct JournalQuery {
    /// Only entries for this CIDR.
    pub subnet: Option<String>,
    /// Only entries started at or after this time.
    pub from: Option<DateTime<Utc>>,
    /// Only entries started at or before this time.
    pub to: Option<DateTime<Utc>>,
    /// Keep the newest `limit` entries.
    pub limit: Option<usize>,
}

/// Persistence backend for scan entries.
pub trait JournalStore: Send + Sync {
    /// Store a finalized entry. Fails if the entry has no content hash.
    fn save(&self, entry: &ScanEntry) -> Result<()>;

    /// Retrieve an entry by ID, verifying integrity.
    fn get(&self, id: ScanId) -> Result<ScanEntry>;

    /// Entries matching `query`, newest first. Entries that fail the
    /// integrity check are left out.
    fn list(&self, query: &JournalQuery) -> Result<Vec<ScanEntry>>;

    /// Delete entries from days strictly before `before`'s date. Returns
    /// the number of entries removed.
    fn prune(&self, before: DateTime<Utc>) -> Result<usize>;

    /// Samples recorded for `mac` at or after `from` (all of them when
    /// `None`), oldest first.
    fn device_history(&self, mac: &str, from: Option<DateTime<Utc>>) -> Result<Vec<ScanSample>> {
        let query = JournalQuery {
            from,
            ..JournalQuery::default()
        };
        let mut samples: Vec<ScanSample> = self
            .list(&query)?
            .iter()
            .filter_map(|entry| entry.sample_for(mac))
            .collect();
        samples.sort_by_key(|s| s.timestamp);
        Ok(samples)
    }
}

/// File-system backed journal.
///
/// ```text
/// {root}/
///   2026/
///     03/
///       14/
///         {scan_id}.json
/// ```
pub struct FileJournalStore {
    root: PathBuf,
}

impl FileJournalStore {
    /// Open a journal rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn entry_path(&self, entry: &ScanEntry) -> PathBuf {
        let date = entry.started_at.format("%Y/%m/%d");
        self.root.join(format!("{}/{}.json", date, entry.id.0))
    }

    fn find_path(&self, id: ScanId) -> Result<PathBuf> {
        let filename = format!("{}.json", id.0);
        find_file_recursive(&self.root, &filename).ok_or(JournalError::NotFound(id))
    }
}

impl JournalStore for FileJournalStore {
    fn save(&self, entry: &ScanEntry) -> Result<()> {
        if entry.content_hash.is_none() {
            return Err(JournalError::NotFinalized);
        }

        let path = self.entry_path(entry);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(entry)?;
        fs::write(&path, json)?;

        tracing::debug!(
            scan_id = %entry.id,
            path = %path.display(),
            "Scan entry saved"
        );

        Ok(())
    }

    fn get(&self, id: ScanId) -> Result<ScanEntry> {
        let path = self.find_path(id)?;
        let json = fs::read_to_string(&path)?;
        let entry: ScanEntry = serde_json::from_str(&json)?;

        if !entry.verify_integrity() {
            return Err(JournalError::IntegrityViolation(id));
        }

        Ok(entry)
    }

    fn list(&self, query: &JournalQuery) -> Result<Vec<ScanEntry>> {
        let mut results = Vec::new();
        collect_entries_recursive(&self.root, &self.root, query, &mut results)?;

        results.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        if let Some(limit) = query.limit {
            results.truncate(limit);
        }

        Ok(results)
    }

    fn prune(&self, before: DateTime<Utc>) -> Result<usize> {
        let cutoff = before.date_naive();
        let mut removed = 0;

        for year in subdirs(&self.root)? {
            for month in subdirs(&year)? {
                for day in subdirs(&month)? {
                    if day_dir_date(&self.root, &day).is_some_and(|d| d < cutoff) {
                        removed += fs::read_dir(&day)?
                            .flatten()
                            .filter(|e| {
                                e.path().extension().and_then(|x| x.to_str()) == Some("json")
                            })
                            .count();
                        fs::remove_dir_all(&day)?;
                    }
                }
                remove_if_empty(&month)?;
            }
            remove_if_empty(&year)?;
        }

        if removed > 0 {
            tracing::info!(removed, before = %cutoff, "Pruned scan journal");
        }
        Ok(removed)
    }
}

fn subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(fs::read_dir(dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect())
}

fn remove_if_empty(dir: &Path) -> Result<()> {
    if fs::read_dir(dir)?.next().is_none() {
        fs::remove_dir(dir)?;
    }
    Ok(())
}

/// The date of a `YYYY/MM/DD` directory under `root`.
fn day_dir_date(root: &Path, dir: &Path) -> Option<NaiveDate> {
    let rel = dir.strip_prefix(root).ok()?;
    let parts: Vec<&str> = rel.iter().filter_map(|c| c.to_str()).collect();
    match parts.as_slice() {
        [y, m, d] => NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?),
        _ => None,
    }
}

/// Whether a day directory can hold entries inside the query window.
fn day_in_window(day: NaiveDate, query: &JournalQuery) -> bool {
    query.from.map_or(true, |from| day >= from.date_naive())
        && query.to.map_or(true, |to| day <= to.date_naive())
}

fn find_file_recursive(dir: &Path, filename: &str) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }

    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_file_recursive(&path, filename) {
                return Some(found);
            }
        } else if path.file_name().and_then(|n| n.to_str()) == Some(filename) {
            return Some(path);
        }
    }

    None
}

fn collect_entries_recursive(
    root: &Path,
    dir: &Path,
    query: &JournalQuery,
    results: &mut Vec<ScanEntry>,
) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    let entries = fs::read_dir(dir)?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if day_dir_date(root, &path).is_some_and(|day| !day_in_window(day, query)) {
                continue;
            }
            collect_entries_recursive(root, &path, query, results)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
            let json = fs::read_to_string(&path)?;
            let scan: ScanEntry = match serde_json::from_str(&json) {
                Ok(scan) => scan,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Unreadable scan entry skipped");
                    continue;
                }
            };

            if !scan.verify_integrity() {
                tracing::warn!(scan_id = %scan.id, "Scan entry failed integrity check, skipped");
                continue;
            }

            if matches_query(&scan, query) {
                results.push(scan);
            }
        }
    }

    Ok(())
}

fn matches_query(entry: &ScanEntry, query: &JournalQuery) -> bool {
    if let Some(subnet) = &query.subnet {
        if &entry.subnet != subnet {
            return false;
        }
    }
    if let Some(from) = &query.from {
        if &entry.started_at < from {
            return false;
        }
    }
    if let Some(to) = &query.to {
        if &entry.started_at > to {
            return false;
        }
    }
    true
}
