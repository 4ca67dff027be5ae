//! Copying tiles from a network share into a local directory.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use corridor_pipeline::{FetchReport, FileFetcher};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Plain file-system copy. A local copy at least as new as its source is
/// left alone. Copies land under a `.part` name and are renamed once
/// complete, so an interrupted copy never looks like a finished file.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyFetcher;

impl FileFetcher for CopyFetcher {
    fn fetch(&self, files: &[PathBuf], local_dir: &Path) -> FetchReport {
        let mut report = FetchReport::default();
        let names = || files.iter().map(|f| file_name(f)).collect::<Vec<_>>();

        if let Err(e) = fs::create_dir_all(local_dir) {
            log::error!("Cannot create {}: {}", local_dir.display(), e);
            report.failed = names();
            return report;
        }

        let total: u64 = files
            .iter()
            .filter_map(|f| fs::metadata(f).ok())
            .map(|m| m.len())
            .sum();
        if total > 0 {
            log::info!("Total download size: {:.2} GB", total as f64 / GIB);
        }

        let mut copied = 0;
        for source in files {
            let name = file_name(source);
            let destination = local_dir.join(&name);

            let source_meta = match fs::metadata(source) {
                Ok(meta) => meta,
                Err(e) => {
                    log::warn!("Source not found: {} ({})", name, e);
                    report.failed.push(name);
                    continue;
                }
            };
            if is_up_to_date(&source_meta, &destination) {
                log::info!("Skipping {} (up-to-date)", name);
                report.up_to_date.push(name);
                continue;
            }

            log::info!("Copying {}...", name);
            match copy_then_rename(source, &destination) {
                Ok(bytes) => {
                    copied += bytes;
                    log::info!("Copied {} ({:.2} GB)", name, bytes as f64 / GIB);
                    report.fetched.push(destination);
                }
                Err(e) => {
                    log::error!("Error copying {}: {}", name, e);
                    report.failed.push(name);
                }
            }
        }

        log::info!(
            "Downloaded: {} ({:.2} GB), skipped: {}, failed: {}",
            report.fetched.len(),
            copied as f64 / GIB,
            report.up_to_date.len(),
            report.failed.len()
        );
        for name in &report.failed {
            log::warn!("Failed download: {}", name);
        }
        report
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

fn copy_then_rename(source: &Path, destination: &Path) -> io::Result<u64> {
    let partial = partial_path(destination);
    let result = fs::copy(source, &partial).and_then(|bytes| {
        fs::rename(&partial, destination)?;
        Ok(bytes)
    });
    if result.is_err() && partial.exists() {
        if let Err(e) = fs::remove_file(&partial) {
            log::warn!("Could not remove {}: {}", partial.display(), e);
        }
    }
    result
}

fn is_up_to_date(source: &fs::Metadata, destination: &Path) -> bool {
    let Ok(local) = fs::metadata(destination) else {
        return false;
    };
    match (source.modified(), local.modified()) {
        (Ok(remote), Ok(local)) => remote <= local,
        _ => false,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_missing_and_skips_current() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let a = remote.path().join("a.las");
        let b = remote.path().join("b.las");
        fs::write(&a, b"aaaa").unwrap();
        fs::write(&b, b"bbbb").unwrap();
        let missing = remote.path().join("missing.las");

        let first = CopyFetcher.fetch(&[a.clone(), b.clone(), missing], local.path());
        assert_eq!(first.fetched.len(), 2);
        assert_eq!(first.failed, vec!["missing.las".to_string()]);
        assert_eq!(fs::read(local.path().join("a.las")).unwrap(), b"aaaa");

        let second = CopyFetcher.fetch(&[a, b], local.path());
        assert!(second.fetched.is_empty());
        assert_eq!(
            second.up_to_date,
            vec!["a.las".to_string(), "b.las".to_string()]
        );
    }

    #[test]
    fn creates_the_local_directory() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let tile = remote.path().join("tile.laz");
        fs::write(&tile, b"laz").unwrap();
        let nested = local.path().join("cache").join("tiles");

        let report = CopyFetcher.fetch(&[tile], &nested);
        assert_eq!(report.fetched, vec![nested.join("tile.laz")]);
    }

    #[test]
    fn failed_copy_leaves_nothing_behind() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let good = remote.path().join("good.las");
        fs::write(&good, b"good").unwrap();
        // a directory cannot be copied as a file
        let unreadable = remote.path().join("bad.las");
        fs::create_dir(&unreadable).unwrap();

        let report = CopyFetcher.fetch(&[good, unreadable], local.path());
        assert_eq!(report.fetched, vec![local.path().join("good.las")]);
        assert_eq!(report.failed, vec!["bad.las".to_string()]);

        let mut left: Vec<String> = fs::read_dir(local.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec!["good.las".to_string()]);
    }
}
