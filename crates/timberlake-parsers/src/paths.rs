//! Input/output path list handling for job configurations.

use once_cell::sync::Lazy;
use regex::Regex;

static HDFS_AUTHORITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"hdfs://\w+(\.\w+)*:\d+").expect("valid regex"));

/// Split a comma-separated path list, dropping empty entries.
pub fn split_paths(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Strip `hdfs://host:port` authorities and space out comma lists for display.
pub fn clean_job_path(path: &str) -> String {
    HDFS_AUTHORITY.replace_all(path, "").replace(',', ", ")
}
