use camino::Utf8PathBuf;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ResolvedConfig;
use crate::domain::{
    ArtifactFormat, DatasetAccession, FailurePolicy, STUDY_IDENTIFIER_PREFIX, StudyAccession,
};
use crate::ega::{EgaClient, RawDataset, Transport};
use crate::error::{ExportError, ExportStep};
use crate::organisation::OrganisationRegistry;
use crate::render::ArtifactSerializer;
use crate::store::ArtifactStore;
use crate::transform::{DatasetTransformer, StudyContext};

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub study: StudyAccession,
    pub creator: Option<String>,
    pub keywords: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub format: ArtifactFormat,
    pub page_size: Option<u32>,
    pub failure_policy: FailurePolicy,
}

impl From<&ResolvedConfig> for ExportOptions {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            format: config.format,
            page_size: config.page_size,
            failure_policy: config.failure_policy,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub study: String,
    pub study_title: String,
    pub format: ArtifactFormat,
    pub dataset_count: usize,
    pub written: Vec<WrittenArtifact>,
    pub failures: Vec<DatasetFailure>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WrittenArtifact {
    pub accession: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetFailure {
    pub accession: String,
    pub step: ExportStep,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    StudyResolved {
        accession: String,
        title: String,
        dataset_count: usize,
    },
    ArtifactWritten {
        accession: String,
        path: Utf8PathBuf,
        sitemap_entry: Option<String>,
    },
    DatasetFailed(DatasetFailure),
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

struct StepFailure {
    accession: String,
    step: ExportStep,
    error: ExportError,
}

/// Study → datasets → descriptors → one artifact file per dataset.
pub struct Exporter<T: Transport> {
    client: EgaClient<T>,
    store: ArtifactStore,
    options: ExportOptions,
}

impl<T: Transport> Exporter<T> {
    pub fn new(client: EgaClient<T>, store: ArtifactStore, options: ExportOptions) -> Self {
        Self {
            client,
            store,
            options,
        }
    }

    pub fn client(&self) -> &EgaClient<T> {
        &self.client
    }

    /// Archive failures on the study or its dataset list abort before anything
    /// is written. Per-dataset failures follow the configured policy.
    pub fn export(
        &self,
        request: &ExportRequest,
        sink: &dyn ProgressSink,
    ) -> Result<ExportReport, ExportError> {
        let format = self.options.format;
        let registry = OrganisationRegistry::for_format(format);
        let transformer = DatasetTransformer::new(
            registry,
            request.creator.as_deref(),
            request.keywords.clone(),
        )?;
        let serializer = ArtifactSerializer::new(format);
        let study_id = request.study.as_str();

        info!(study = study_id, "fetching study");
        let study = self
            .client
            .fetch_study(&request.study)
            .map_err(|err| err.at_step(ExportStep::StudyFetch, study_id))?;
        let datasets = self
            .client
            .fetch_study_datasets(&request.study, self.options.page_size)
            .map_err(|err| err.at_step(ExportStep::DatasetFetch, study_id))?;
        info!(
            study = study_id,
            title = %study.title,
            datasets = datasets.len(),
            "fetched related datasets"
        );
        if datasets.is_empty() {
            warn!(study = study_id, "study has no datasets, nothing to export");
        }
        sink.event(ProgressEvent::StudyResolved {
            accession: study.accession_id.clone(),
            title: study.title.clone(),
            dataset_count: datasets.len(),
        });

        let context = StudyContext {
            dataset_count: datasets.len(),
            study_title: study.title.clone(),
            study_url: match format {
                ArtifactFormat::Qmd => Some(format!("{STUDY_IDENTIFIER_PREFIX}{}", study.accession_id)),
                ArtifactFormat::Html => None,
            },
        };

        self.store.ensure_output_dir()?;

        let mut report = ExportReport {
            study: study.accession_id.clone(),
            study_title: study.title.clone(),
            format,
            dataset_count: datasets.len(),
            written: Vec::new(),
            failures: Vec::new(),
        };

        for (index, value) in datasets.into_iter().enumerate() {
            match self.export_dataset(index, value, &context, &transformer, &serializer) {
                Ok((accession, path)) => {
                    debug!(dataset = %accession, path = %path, "artifact written");
                    report.written.push(WrittenArtifact {
                        accession: accession.to_string(),
                        path: path.to_string(),
                    });
                    sink.event(ProgressEvent::ArtifactWritten {
                        sitemap_entry: serializer.sitemap_entry(accession.as_str()),
                        accession: accession.to_string(),
                        path,
                    });
                }
                Err(failure) => {
                    warn!(
                        dataset = %failure.accession,
                        step = %failure.step,
                        error = %failure.error,
                        "dataset export failed"
                    );
                    if self.options.failure_policy == FailurePolicy::FailFast {
                        return Err(failure.error.at_step(failure.step, failure.accession));
                    }
                    let failure = DatasetFailure {
                        accession: failure.accession,
                        step: failure.step,
                        message: failure.error.to_string(),
                    };
                    sink.event(ProgressEvent::DatasetFailed(failure.clone()));
                    report.failures.push(failure);
                }
            }
        }

        info!(
            study = study_id,
            written = report.written.len(),
            failed = report.failures.len(),
            "export finished"
        );
        Ok(report)
    }

    fn export_dataset(
        &self,
        index: usize,
        value: Value,
        context: &StudyContext,
        transformer: &DatasetTransformer,
        serializer: &ArtifactSerializer,
    ) -> Result<(DatasetAccession, Utf8PathBuf), StepFailure> {
        let label = value
            .get("accession_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("record #{index}"));
        let fail = |step: ExportStep| {
            let accession = label.clone();
            move |error: ExportError| StepFailure {
                accession,
                step,
                error,
            }
        };

        let raw: RawDataset = serde_json::from_value(value)
            .map_err(|err| ExportError::RecordDecode(err.to_string()))
            .map_err(fail(ExportStep::Decode))?;
        let accession: DatasetAccession =
            raw.accession_id.parse().map_err(fail(ExportStep::Decode))?;
        let descriptor = transformer
            .transform(&raw, context)
            .map_err(fail(ExportStep::Transform))?;
        let content = serializer
            .render(&descriptor)
            .map_err(fail(ExportStep::Render))?;
        let path = self.store.artifact_path(&accession, serializer.format());
        self.store
            .write_atomic(&path, &content)
            .map_err(fail(ExportStep::Write))?;
        Ok((accession, path))
    }
}
