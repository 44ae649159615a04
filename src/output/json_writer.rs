//! Writes finalized datasets as JSON files into one directory

use crate::output::{FinalizedOutput, OutputError, OutputHandler, OutputResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Output handler writing every dataset variant under a single directory
pub struct JsonDirectoryWriter {
    dir: PathBuf,
}

impl JsonDirectoryWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }
}

impl OutputHandler for JsonDirectoryWriter {
    fn write(&self, output: &FinalizedOutput) -> OutputResult<Vec<PathBuf>> {
        fs::create_dir_all(&self.dir)?;

        let mut written = Vec::new();
        for (name, contents) in output.rendered_files()? {
            let path = self.dir.join(&name);
            fs::write(&path, contents).map_err(|source| OutputError::Write {
                path: path.display().to_string(),
                source,
            })?;
            written.push(path);
        }

        tracing::info!(
            "Wrote dataset {} ({} records, {} files) to {}",
            output.dataset,
            output.records.len(),
            written.len(),
            self.dir.display()
        );
        Ok(written)
    }
}
