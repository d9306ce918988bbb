use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ExportReport, ProgressEvent, ProgressSink};

/// Default stdout sink: one sitemap `<url>` fragment per written Quarto artifact,
/// for pasting into the catalogue sitemap.
pub struct SitemapOutput;

impl ProgressSink for SitemapOutput {
    fn event(&self, event: ProgressEvent) {
        if let ProgressEvent::ArtifactWritten {
            sitemap_entry: Some(entry),
            ..
        } = event
        {
            println!("{entry}");
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &ExportReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}
