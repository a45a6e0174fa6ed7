//! Log file discovery and renaming

use anyhow::{Context, Result};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn has_log_extension(name: &str, extensions: &[String]) -> bool {
    extensions.iter().any(|ext| name.ends_with(ext.as_str()))
}

/// Recursively collect files whose name ends with one of `extensions`
///
/// The result is naturally sorted by base name, so `run2.log` comes before
/// `run10.log` regardless of the directory either lives in.
pub fn gather_files(folder: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(folder).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry under {:?}: {}", folder, e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if has_log_extension(&entry.file_name().to_string_lossy(), extensions) {
            paths.push(entry.into_path());
        }
    }
    paths.sort_by_cached_key(|path| natural_key(path));
    log::info!("Found {} log files", paths.len());
    paths
}

/// Replace the extension of matching top-level files with `new_ext`
///
/// Returns the number of files renamed. A rename that would overwrite an
/// existing file is skipped.
pub fn rename_logs(folder: &Path, extensions: &[String], new_ext: &str) -> Result<usize> {
    let mut entries: Vec<_> = fs::read_dir(folder)
        .with_context(|| format!("Failed to list log folder: {:?}", folder))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();
    entries.sort();

    let mut renamed = 0;
    for path in entries {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !has_log_extension(&name, extensions) {
            continue;
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let new_name = format!("{}{}", stem, new_ext);
        if new_name == name {
            continue;
        }
        let target = folder.join(&new_name);
        if target.exists() {
            log::warn!("Not renaming {} to {}: target exists", name, new_name);
            continue;
        }
        match fs::rename(&path, &target) {
            Ok(()) => {
                log::info!("Renamed {} to {}", name, new_name);
                renamed += 1;
            }
            Err(e) => log::error!("Failed to rename {}: {}", name, e),
        }
    }
    Ok(renamed)
}

/// One run of a natural sort key
#[derive(Debug, Clone, PartialEq, Eq)]
enum Chunk {
    Text(String),
    Number(u128),
}

impl PartialOrd for Chunk {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Chunk {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Chunk::Number(a), Chunk::Number(b)) => a.cmp(b),
            (Chunk::Text(a), Chunk::Text(b)) => a.cmp(b),
            (Chunk::Number(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Number(_)) => Ordering::Greater,
        }
    }
}

/// Sort key for a file's base name: digit runs compare numerically, text
/// case-insensitively
fn natural_key(path: &Path) -> Vec<Chunk> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;
    for c in name.chars() {
        let is_digit = c.is_ascii_digit();
        if is_digit != in_digits && !current.is_empty() {
            chunks.push(make_chunk(&current, in_digits));
            current.clear();
        }
        in_digits = is_digit;
        current.push(c);
    }
    if !current.is_empty() {
        chunks.push(make_chunk(&current, in_digits));
    }
    chunks
}

fn make_chunk(run: &str, digits: bool) -> Chunk {
    if digits {
        Chunk::Number(run.parse().unwrap_or(u128::MAX))
    } else {
        Chunk::Text(run.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        vec![".log".to_string(), ".txt".to_string()]
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_natural_order() {
        let mut paths: Vec<PathBuf> = ["run10.log", "Run2.log", "run1.log", "alpha.log"]
            .iter()
            .map(PathBuf::from)
            .collect();
        paths.sort_by_cached_key(|p| natural_key(p));
        assert_eq!(names(&paths), vec!["alpha.log", "run1.log", "Run2.log", "run10.log"]);
    }

    #[test]
    fn test_gather_recurses_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b3.log"), "").unwrap();
        fs::write(dir.path().join("nested").join("b20.txt"), "").unwrap();
        fs::write(dir.path().join("b10.csv"), "").unwrap();

        let found = gather_files(dir.path(), &exts());
        assert_eq!(names(&found), vec!["b3.log", "b20.txt"]);
    }

    #[test]
    fn test_rename_top_level_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("a.log"), "").unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();
        fs::write(dir.path().join("nested").join("c.log"), "").unwrap();

        let renamed = rename_logs(dir.path(), &[".log".to_string()], ".txt").unwrap();
        assert_eq!(renamed, 1);
        assert!(dir.path().join("a.txt").exists());
        assert!(dir.path().join("b.txt").exists());
        assert!(dir.path().join("nested").join("c.log").exists());
    }

    #[test]
    fn test_rename_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.log"), "log").unwrap();
        fs::write(dir.path().join("a.txt"), "txt").unwrap();

        let renamed = rename_logs(dir.path(), &[".log".to_string()], ".txt").unwrap();
        assert_eq!(renamed, 0);
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "txt");
    }
}
