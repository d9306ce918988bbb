use std::fmt;

use camino::Utf8PathBuf;
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error("invalid EGA study accession: {0}")]
    #[diagnostic(help("study accessions look like EGAS00001000001"))]
    InvalidStudyAccession(String),

    #[error("invalid EGA dataset accession: {0}")]
    InvalidDatasetAccession(String),

    #[error("invalid archive request: {0}")]
    InvalidRequest(String),

    #[error("invalid archive base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("archive request failed: {0}")]
    ArchiveTransport(String),

    #[error("archive returned status {status} for {endpoint}")]
    ArchiveStatus { status: u16, endpoint: String },

    #[error("unexpected archive response from {endpoint}: {message}")]
    ArchiveDecode { endpoint: String, message: String },

    #[error("malformed archive record: {0}")]
    RecordDecode(String),

    #[error("dataset {accession}: released date {value:?} is not an ISO-8601 date")]
    DateParse { accession: String, value: String },

    #[error("unknown organisation code: {0}")]
    #[diagnostic(help("run with --help to list the accepted --creator codes"))]
    UnknownOrganisation(String),

    #[error("failed to render artifact: {0}")]
    Render(String),

    #[error("failed to write artifact {path}: {message}")]
    ArtifactWrite { path: Utf8PathBuf, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("{step} failed for {accession}")]
    Step {
        step: ExportStep,
        accession: String,
        #[source]
        source: Box<ExportError>,
    },
}

impl ExportError {
    pub fn at_step(self, step: ExportStep, accession: impl Into<String>) -> Self {
        ExportError::Step {
            step,
            accession: accession.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error once `Step` context is peeled off.
    pub fn root(&self) -> &ExportError {
        match self {
            ExportError::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportStep {
    StudyFetch,
    DatasetFetch,
    Decode,
    Transform,
    Render,
    Write,
}

impl ExportStep {
    pub fn is_per_dataset(self) -> bool {
        !matches!(self, ExportStep::StudyFetch | ExportStep::DatasetFetch)
    }
}

impl fmt::Display for ExportStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportStep::StudyFetch => write!(f, "study fetch"),
            ExportStep::DatasetFetch => write!(f, "dataset fetch"),
            ExportStep::Decode => write!(f, "dataset decode"),
            ExportStep::Transform => write!(f, "transform"),
            ExportStep::Render => write!(f, "render"),
            ExportStep::Write => write!(f, "write"),
        }
    }
}
