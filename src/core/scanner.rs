use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: PathBuf,
    pub extension: String,
}

#[derive(Debug, Clone)]
pub struct FileScanner {
    extensions: HashSet<String>,
}

impl FileScanner {
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn java() -> Self {
        Self::new(&["java"])
    }

    /// Lists candidate source files below `root_path`, recursively.
    ///
    /// Fails with [`AnalysisError::InvalidPath`] when the root is missing or not a
    /// directory. The order of the result is unspecified.
    pub fn scan_directory(&self, root_path: &Path) -> Result<Vec<FileInfo>> {
        if !root_path.is_dir() {
            return Err(AnalysisError::InvalidPath(root_path.to_path_buf()));
        }

        // Collect all entries first for parallel processing
        let entries: Vec<_> = WalkDir::new(root_path)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    debug!(error = %err, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .collect();

        let files: Vec<FileInfo> = entries
            .par_iter()
            .filter_map(|entry| {
                let path = entry.path();
                let extension = path.extension()?.to_str()?.to_ascii_lowercase();
                self.extensions.contains(&extension).then(|| FileInfo {
                    path: path.to_path_buf(),
                    extension,
                })
            })
            .collect();

        debug!(root = %root_path.display(), files = files.len(), "scan finished");
        Ok(files)
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::java()
    }
}
