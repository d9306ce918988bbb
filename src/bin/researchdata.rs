use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use clap::builder::PossibleValuesParser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use researchdata_export::app::{ExportOptions, ExportReport, ExportRequest, Exporter, ProgressSink};
use researchdata_export::config::{ConfigLoader, ConfigOverrides};
use researchdata_export::domain::{ArtifactFormat, StudyAccession};
use researchdata_export::ega::{EgaClient, HttpTransport};
use researchdata_export::error::ExportError;
use researchdata_export::organisation::OrganisationRegistry;
use researchdata_export::output::{JsonOutput, SitemapOutput};
use researchdata_export::store::ArtifactStore;

#[derive(Parser)]
#[command(name = "researchdata")]
#[command(about = "A command-line utility for preparing FEGA Sweden metadata for researchdata.se")]
#[command(version, author)]
struct Cli {
    /// EGA study accession number
    study_id: String,

    /// Path to the output directory
    output_dir: Utf8PathBuf,

    /// Main organisation that collected the data
    #[arg(long, value_parser = PossibleValuesParser::new(OrganisationRegistry::full().codes()))]
    creator: Option<String>,

    /// Keywords describing the dataset
    #[arg(long, num_args = 0..)]
    keywords: Option<Vec<String>>,

    /// Artifact format [default: qmd]
    #[arg(long)]
    format: Option<ArtifactFormat>,

    /// JSON config file [default: ./researchdata.json when present]
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Related datasets requested per page
    #[arg(long, conflicts_with = "no_pagination")]
    page_size: Option<u32>,

    /// Fetch related datasets with one unparameterized request
    #[arg(long)]
    no_pagination: bool,

    /// Abort on the first dataset that cannot be exported
    #[arg(long)]
    fail_fast: bool,

    /// Print the export report as JSON instead of sitemap entries
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<ExportError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &ExportError) -> u8 {
    if let ExportError::Step { step, .. } = error {
        if step.is_per_dataset() {
            return 4;
        }
    }
    match error.root() {
        ExportError::InvalidStudyAccession(_)
        | ExportError::InvalidRequest(_)
        | ExportError::InvalidBaseUrl(_)
        | ExportError::UnknownOrganisation(_)
        | ExportError::ConfigRead(_)
        | ExportError::ConfigParse(_) => 2,
        ExportError::ArchiveTransport(_)
        | ExportError::ArchiveStatus { .. }
        | ExportError::ArchiveDecode { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let study: StudyAccession = cli.study_id.parse()?;

    let config = ConfigLoader::resolve(cli.config.as_deref())?.apply(ConfigOverrides {
        base_url: cli.base_url,
        timeout_secs: cli.timeout_secs,
        page_size: cli.page_size,
        no_pagination: cli.no_pagination,
        format: cli.format,
        fail_fast: cli.fail_fast,
    })?;

    let transport = HttpTransport::new(&config.archive)?;
    let client = EgaClient::new(transport, &config.archive.base_url)?;
    let exporter = Exporter::new(
        client,
        ArtifactStore::new(cli.output_dir),
        ExportOptions::from(&config),
    );
    let request = ExportRequest {
        study,
        creator: cli.creator,
        keywords: cli.keywords,
    };

    let sink: &dyn ProgressSink = if cli.json { &JsonOutput } else { &SitemapOutput };
    let report = exporter.export(&request, sink)?;
    if cli.json {
        JsonOutput::print_report(&report).into_diagnostic()?;
    }

    if report.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        print_failures(&report);
        Ok(ExitCode::from(4))
    }
}

fn print_failures(report: &ExportReport) {
    eprintln!(
        "{} of {} datasets in {} could not be exported:",
        report.failures.len(),
        report.dataset_count,
        report.study
    );
    for failure in &report.failures {
        eprintln!("  {} ({}): {}", failure.accession, failure.step, failure.message);
    }
}
