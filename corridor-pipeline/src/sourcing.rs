//! Bringing selected files from a remote directory into a local one before
//! processing.

use std::{
    collections::HashSet,
    ffi::OsString,
    path::{Path, PathBuf},
};

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchReport {
    pub fetched: Vec<PathBuf>,
    pub up_to_date: Vec<String>,
    pub failed: Vec<String>,
}

/// Brings files into a local directory. Failures are reported, not raised;
/// whatever did not arrive is skipped later. A name listed in `failed` is
/// never used, even if a file of that name exists locally.
pub trait FileFetcher {
    fn fetch(&self, files: &[PathBuf], local_dir: &Path) -> FetchReport;
}

fn is_inside(path: &Path, dir: &Path) -> bool {
    let parent = path.parent().unwrap_or(Path::new(""));
    match (parent.canonicalize(), dir.canonicalize()) {
        (Ok(parent), Ok(dir)) => parent == dir,
        _ => parent == dir,
    }
}

/// Maps `files` to their copies in `local_dir`, fetching the ones that live
/// elsewhere first. Files whose fetch failed or whose local copy is still
/// missing afterwards are dropped. Order is preserved and each file name
/// appears once.
pub fn reconcile_local(
    files: &[PathBuf],
    local_dir: &Path,
    fetcher: Option<&dyn FileFetcher>,
) -> Vec<PathBuf> {
    let remote: Vec<PathBuf> = files
        .iter()
        .filter(|f| !is_inside(f, local_dir))
        .cloned()
        .collect();
    let failed: HashSet<OsString> = match (fetcher, remote.is_empty()) {
        (Some(fetcher), false) => fetcher
            .fetch(&remote, local_dir)
            .failed
            .into_iter()
            .map(OsString::from)
            .collect(),
        _ => HashSet::new(),
    };

    let mut seen = HashSet::new();
    files
        .iter()
        .filter_map(|f| {
            let name = f.file_name()?;
            if !seen.insert(name.to_os_string()) {
                return None;
            }
            let local = local_dir.join(name);
            if failed.contains(name) {
                log::warn!("{} was not fetched completely, skipping", local.display());
                None
            } else if local.is_file() {
                Some(local)
            } else {
                log::warn!("{} is not available locally, skipping", local.display());
                None
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::{cell::RefCell, fs};

    /// Copies unconditionally and remembers what it was asked for.
    #[derive(Default)]
    pub(crate) struct PlainCopy {
        pub requested: RefCell<Vec<PathBuf>>,
    }

    impl FileFetcher for PlainCopy {
        fn fetch(&self, files: &[PathBuf], local_dir: &Path) -> FetchReport {
            self.requested.borrow_mut().extend_from_slice(files);
            fs::create_dir_all(local_dir).unwrap();
            let mut report = FetchReport::default();
            for file in files {
                let name = file.file_name().unwrap();
                let destination = local_dir.join(name);
                match fs::copy(file, &destination) {
                    Ok(_) => report.fetched.push(destination),
                    Err(_) => report.failed.push(name.to_string_lossy().into_owned()),
                }
            }
            report
        }
    }

    #[test]
    fn reconcile_resolves_to_local_copies() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let fetched = remote.path().join("fetched.las");
        let absent = remote.path().join("absent.las");
        fs::write(&fetched, b"x").unwrap();
        let already_local = local.path().join("local.las");
        fs::write(&already_local, b"y").unwrap();

        let fetcher = PlainCopy::default();
        let resolved = reconcile_local(
            &[fetched.clone(), absent.clone(), already_local.clone()],
            local.path(),
            Some(&fetcher),
        );
        assert_eq!(
            resolved,
            vec![local.path().join("fetched.las"), already_local]
        );
        assert_eq!(*fetcher.requested.borrow(), vec![fetched, absent]);
    }

    /// Leaves a truncated copy behind and reports the file as failed.
    struct InterruptedCopy;

    impl FileFetcher for InterruptedCopy {
        fn fetch(&self, files: &[PathBuf], local_dir: &Path) -> FetchReport {
            let mut report = FetchReport::default();
            for file in files {
                let name = file.file_name().unwrap();
                let bytes = fs::read(file).unwrap();
                fs::write(local_dir.join(name), &bytes[..bytes.len() / 2]).unwrap();
                report.failed.push(name.to_string_lossy().into_owned());
            }
            report
        }
    }

    #[test]
    fn failed_fetch_is_not_used_even_if_a_copy_exists() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let broken = remote.path().join("broken.las");
        fs::write(&broken, b"0123456789").unwrap();
        let already_local = local.path().join("local.las");
        fs::write(&already_local, b"y").unwrap();

        let resolved = reconcile_local(
            &[broken, already_local.clone()],
            local.path(),
            Some(&InterruptedCopy),
        );
        assert!(local.path().join("broken.las").is_file());
        assert_eq!(resolved, vec![already_local]);
    }

    #[test]
    fn reconcile_without_fetcher_uses_existing_copies() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        fs::write(local.path().join("tile.las"), b"x").unwrap();

        let resolved = reconcile_local(
            &[remote.path().join("tile.las"), remote.path().join("other.las")],
            local.path(),
            None,
        );
        assert_eq!(resolved, vec![local.path().join("tile.las")]);
    }
}
