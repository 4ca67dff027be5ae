use std::{
    fs,
    path::{Path, PathBuf},
};

/// Guards an output file while it is being produced. Unless [`keep`] is
/// called, dropping the guard deletes whatever was written at `path`.
///
/// Declare the guard before the writer that fills the file, so the writer is
/// dropped (and closed) first.
///
/// [`keep`]: OutputArtifact::keep
#[derive(Debug)]
pub struct OutputArtifact {
    path: PathBuf,
    keep: bool,
}

impl OutputArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn keep(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for OutputArtifact {
    fn drop(&mut self) {
        if self.keep || !self.path.exists() {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => log::info!("Removed incomplete output {}", self.path.display()),
            Err(e) => log::warn!(
                "Could not remove incomplete output {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_unless_kept() {
        let dir = tempfile::tempdir().unwrap();
        let dropped = dir.path().join("dropped.las");
        let kept = dir.path().join("kept.las");
        fs::write(&dropped, b"partial").unwrap();
        fs::write(&kept, b"complete").unwrap();

        drop(OutputArtifact::new(&dropped));
        let path = OutputArtifact::new(&kept).keep();

        assert!(!dropped.exists());
        assert_eq!(path, kept);
        assert!(kept.exists());
    }

    #[test]
    fn missing_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        drop(OutputArtifact::new(dir.path().join("never-written.las")));
    }
}
