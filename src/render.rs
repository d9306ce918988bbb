//! Artifact rendering. Both formats embed the same JSON-LD block.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::domain::ArtifactFormat;
use crate::error::ExportError;
use crate::transform::DatasetDescriptor;

pub const SCRIPT_OPEN: &str = r#"<script type="application/ld+json">"#;
pub const SCRIPT_CLOSE: &str = "</script>";
pub const CATALOGUE_DATASET_URL: &str = "https://fega.nbis.se/catalogue/datasets/";

const HEADER_INDENT: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct ArtifactSerializer {
    format: ArtifactFormat,
}

impl ArtifactSerializer {
    pub fn new(format: ArtifactFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> ArtifactFormat {
        self.format
    }

    pub fn render(&self, descriptor: &DatasetDescriptor) -> Result<String, ExportError> {
        match self.format {
            ArtifactFormat::Qmd => {
                let mut document = front_matter(descriptor)?;
                document.push_str(&markdown_body(descriptor));
                Ok(document)
            }
            ArtifactFormat::Html => json_ld_script(descriptor),
        }
    }

    /// Only Quarto exports feed the catalogue sitemap.
    pub fn sitemap_entry(&self, accession: &str) -> Option<String> {
        match self.format {
            ArtifactFormat::Qmd => Some(sitemap_entry(accession)),
            ArtifactFormat::Html => None,
        }
    }
}

/// Descriptor as pretty JSON: four-space indent, non-ASCII as `\uXXXX`.
pub fn json_ld(descriptor: &DatasetDescriptor) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    descriptor
        .serialize(&mut serializer)
        .map_err(|err| ExportError::Render(err.to_string()))?;
    let json = String::from_utf8(buffer).map_err(|err| ExportError::Render(err.to_string()))?;
    Ok(escape_for_script(&json))
}

pub fn json_ld_script(descriptor: &DatasetDescriptor) -> Result<String, ExportError> {
    Ok(format!("{SCRIPT_OPEN}\n{}\n{SCRIPT_CLOSE}\n", json_ld(descriptor)?))
}

pub fn front_matter(descriptor: &DatasetDescriptor) -> Result<String, ExportError> {
    let mut fm = String::from("---\n");
    fm.push_str(&format!("title: {}\n", yaml_scalar(&descriptor.name)?));
    if let Some(author) = &descriptor.creator.name {
        fm.push_str(&format!("author: {}\n", yaml_scalar(author)?));
    }
    fm.push_str(&format!("date: {}\n", descriptor.date_published));
    fm.push_str("description: Dataset\n");
    match descriptor.keywords.as_deref() {
        Some(keywords) if !keywords.is_empty() => {
            fm.push_str("categories:\n");
            for keyword in keywords {
                fm.push_str(&format!("  - {}\n", yaml_scalar(keyword)?));
            }
        }
        _ => fm.push_str("categories: []\n"),
    }
    fm.push_str("format:\n  html:\n    include-in-header:\n      text: |\n");
    fm.push_str(&indent(&json_ld_script(descriptor)?, HEADER_INDENT));
    fm.push_str("\n---\n");
    Ok(fm)
}

pub fn markdown_body(descriptor: &DatasetDescriptor) -> String {
    format!(
        "{}\n\n**Official landing page:**\n<{}>\n",
        descriptor.description, descriptor.identifier
    )
}

pub fn sitemap_entry(accession: &str) -> String {
    format!("  <url>\n    <loc>{CATALOGUE_DATASET_URL}{accession}.html</loc>\n  </url>")
}

/// Parses the first embedded JSON-LD block of a rendered artifact.
pub fn extract_json_ld(artifact: &str) -> Result<DatasetDescriptor, ExportError> {
    let start = artifact
        .find(SCRIPT_OPEN)
        .map(|index| index + SCRIPT_OPEN.len())
        .ok_or_else(|| ExportError::Render("no JSON-LD script block".to_string()))?;
    let end = artifact[start..]
        .find(SCRIPT_CLOSE)
        .map(|index| start + index)
        .ok_or_else(|| ExportError::Render("unterminated JSON-LD script block".to_string()))?;
    serde_json::from_str(&artifact[start..end]).map_err(|err| ExportError::Render(err.to_string()))
}

fn indent(text: &str, spaces: usize) -> String {
    let margin = " ".repeat(spaces);
    text.lines()
        .map(|line| format!("{margin}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Plain YAML scalar when that round-trips, otherwise a double-quoted one.
fn yaml_scalar(value: &str) -> Result<String, ExportError> {
    let plain = serde_yaml::to_string(value).map_err(|err| ExportError::Render(err.to_string()))?;
    let plain = plain.strip_suffix('\n').unwrap_or(&plain);
    if plain == value && !value.is_empty() {
        return Ok(value.to_string());
    }
    serde_json::to_string(value).map_err(|err| ExportError::Render(err.to_string()))
}

fn escape_for_script(json: &str) -> String {
    let mut escaped = String::with_capacity(json.len());
    for ch in json.chars() {
        if ch.is_ascii() && ch != '\u{7f}' {
            if ch == '/' && escaped.ends_with('<') {
                escaped.push('\\');
            }
            escaped.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    escaped
}
