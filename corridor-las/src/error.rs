use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LasError {
    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: las::Error,
    },

    #[error(transparent)]
    Las(#[from] las::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("output sink for {0} is already closed")]
    Closed(PathBuf),
}

impl LasError {
    pub(crate) fn file(path: impl Into<PathBuf>) -> impl FnOnce(las::Error) -> Self {
        let path = path.into();
        move |source| Self::File { path, source }
    }
}
