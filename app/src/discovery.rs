//! Turning command-line inputs into a list of LAS/LAZ files.

use std::{
    collections::HashSet,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use glob::glob;

fn is_point_cloud(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("las") || ext.eq_ignore_ascii_case("laz"))
        .unwrap_or(false)
}

/// The `*.las` and `*.laz` files directly inside `dir`, sorted by path.
pub fn list_directory(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot read directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_point_cloud(path))
        .collect();
    files.sort();
    files
}

/// Expands glob patterns and directories; plain paths are taken as given.
/// The first occurrence of a path wins.
pub fn expand_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for pattern in patterns {
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            match glob(pattern) {
                Ok(entries) => {
                    for entry in entries {
                        match entry {
                            Ok(path) => paths.push(path),
                            Err(e) => log::warn!("{:?}", e),
                        }
                    }
                }
                Err(e) => log::error!("Invalid glob pattern {}: {}", pattern, e),
            }
        } else {
            let path = PathBuf::from(pattern);
            if path.is_dir() {
                paths.extend(list_directory(&path));
            } else {
                paths.push(path);
            }
        }
    }

    let mut seen = HashSet::new();
    paths.retain(|p| seen.insert(p.clone()));
    paths
}

/// Local files first, then network files whose name has no local copy.
pub fn merge_by_name(local: Vec<PathBuf>, network: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut names: HashSet<OsString> = local
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_os_string()))
        .collect();
    let mut merged = local;
    for path in network {
        let Some(name) = path.file_name() else {
            continue;
        };
        if names.insert(name.to_os_string()) {
            merged.push(path);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn directories_globs_and_plain_paths() {
        let dir = tempfile::tempdir().unwrap();
        let b = touch(dir.path(), "b.las");
        let a = touch(dir.path(), "a.LAZ");
        touch(dir.path(), "notes.txt");
        fs::create_dir(dir.path().join("sub.las")).unwrap();

        let listed = expand_inputs(&[dir.path().to_string_lossy().into_owned()]);
        assert_eq!(listed, vec![a.clone(), b.clone()]);

        let pattern = dir.path().join("*.las").to_string_lossy().into_owned();
        let plain = dir.path().join("missing.las");
        let expanded = expand_inputs(&[
            pattern,
            b.to_string_lossy().into_owned(),
            plain.to_string_lossy().into_owned(),
        ]);
        // the glob also matches the sub.las directory; selection rejects it later
        assert_eq!(expanded, vec![b, dir.path().join("sub.las"), plain]);
    }

    #[test]
    fn local_copies_take_precedence() {
        let merged = merge_by_name(
            vec![PathBuf::from("/local/a.las"), PathBuf::from("/local/b.las")],
            vec![PathBuf::from("/net/b.las"), PathBuf::from("/net/c.las")],
        );
        assert_eq!(
            merged,
            vec![
                PathBuf::from("/local/a.las"),
                PathBuf::from("/local/b.las"),
                PathBuf::from("/net/c.las"),
            ]
        );
    }
}
