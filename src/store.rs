use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;
use tracing::info;

use crate::domain::{ArtifactFormat, DatasetAccession};
use crate::error::ExportError;

/// Output directory holding one artifact per dataset.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: Utf8PathBuf,
}

impl ArtifactStore {
    pub fn new(output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn artifact_path(&self, accession: &DatasetAccession, format: ArtifactFormat) -> Utf8PathBuf {
        self.output_dir
            .join(format!("{}.{}", accession.as_str(), format.extension()))
    }

    pub fn ensure_output_dir(&self) -> Result<(), ExportError> {
        if self.output_dir.as_std_path().is_dir() {
            return Ok(());
        }
        info!(dir = %self.output_dir, "output directory does not exist, creating it");
        fs::create_dir_all(self.output_dir.as_std_path()).map_err(|err| {
            ExportError::Filesystem(format!("create {}: {err}", self.output_dir))
        })
    }

    /// Writes through a temp file in the same directory and renames it over
    /// `path`; readers never observe a partial artifact.
    pub fn write_atomic(&self, path: &Utf8Path, content: &str) -> Result<(), ExportError> {
        let write_err = |message: String| ExportError::ArtifactWrite {
            path: path.to_path_buf(),
            message,
        };
        let parent = path
            .parent()
            .ok_or_else(|| write_err("invalid destination path".to_string()))?;
        let mut temp = Builder::new()
            .prefix(".researchdata-")
            .suffix(".tmp")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| write_err(err.to_string()))?;
        temp.write_all(content.as_bytes())
            .map_err(|err| write_err(err.to_string()))?;
        temp.as_file()
            .sync_all()
            .map_err(|err| write_err(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| write_err(err.error.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_path_uses_format_extension() {
        let store = ArtifactStore::new("out");
        let accession: DatasetAccession = "EGAD00001000002".parse().unwrap();
        assert_eq!(
            store.artifact_path(&accession, ArtifactFormat::Qmd),
            Utf8PathBuf::from("out/EGAD00001000002.qmd")
        );
        assert_eq!(
            store.artifact_path(&accession, ArtifactFormat::Html),
            Utf8PathBuf::from("out/EGAD00001000002.html")
        );
    }

    #[test]
    fn write_atomic_overwrites_and_leaves_no_temp_files() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let store = ArtifactStore::new(dir.clone());
        let path = dir.join("EGAD1.html");

        store.write_atomic(&path, "first").unwrap();
        store.write_atomic(&path, "second").unwrap();

        assert_eq!(fs::read_to_string(path.as_std_path()).unwrap(), "second");
        let entries = fs::read_dir(dir.as_std_path()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
