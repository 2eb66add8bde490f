use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("directory {path} is missing or not writable: {reason}")]
    Directory { path: PathBuf, reason: String },
    #[error("could not serialize {filename}: {source}")]
    Serialize {
        filename: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Creates `dir` when missing and checks that files can be created in it.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    let fail = |reason: String| PersistError::Directory {
        path: dir.to_path_buf(),
        reason,
    };
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => return Err(fail("path is not a directory".into())),
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| fail(e.to_string()))?;
        }
        Err(err) => return Err(fail(err.to_string())),
    }
    NamedTempFile::new_in(dir).map_err(|e| fail(e.to_string()))?;
    Ok(())
}

/// Writes whole files into one directory so readers never observe a
/// partially written file: content goes to a temp file that is then renamed
/// over the target.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        // `persist` replaces an existing target on every platform we build for.
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }

    /// Pretty-printed JSON followed by a newline.
    pub fn write_json<T: Serialize + ?Sized>(
        &self,
        filename: &str,
        value: &T,
    ) -> Result<PathBuf, PersistError> {
        let mut bytes =
            serde_json::to_vec_pretty(value).map_err(|source| PersistError::Serialize {
                filename: filename.to_string(),
                source,
            })?;
        bytes.push(b'\n');
        self.write(filename, &bytes)
    }
}
