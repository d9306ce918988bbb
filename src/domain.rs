use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ExportError;

static STUDY_ACCESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^EGAS\d+$").expect("valid study accession regex"));
static DATASET_ACCESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^EGAD\d+$").expect("valid dataset accession regex"));

pub const DATASET_IDENTIFIER_PREFIX: &str = "http://identifiers.org/ega.dataset:";
pub const STUDY_IDENTIFIER_PREFIX: &str = "http://identifiers.org/ega.study:";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudyAccession(String);

impl StudyAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn identifier_url(&self) -> String {
        format!("{STUDY_IDENTIFIER_PREFIX}{}", self.0)
    }
}

impl fmt::Display for StudyAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StudyAccession {
    type Err = ExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        if !STUDY_ACCESSION.is_match(&normalized) {
            return Err(ExportError::InvalidStudyAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Dataset accessions end up as file names, so anything outside `EGAD<digits>`
/// is refused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetAccession(String);

impl DatasetAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn identifier_url(&self) -> String {
        format!("{DATASET_IDENTIFIER_PREFIX}{}", self.0)
    }
}

impl fmt::Display for DatasetAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetAccession {
    type Err = ExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if !DATASET_ACCESSION.is_match(value) {
            return Err(ExportError::InvalidDatasetAccession(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}

/// Artifact shape written per dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// Quarto document: YAML front matter, embedded JSON-LD and a markdown body.
    #[default]
    Qmd,
    /// Bare `<script type="application/ld+json">` fragment.
    Html,
}

impl ArtifactFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Qmd => "qmd",
            ArtifactFormat::Html => "html",
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Skip the failing dataset, keep going, report every failure at the end.
    #[default]
    Continue,
    FailFast,
}
