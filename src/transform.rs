//! EGA dataset record → schema.org `Dataset` descriptor.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::DatasetAccession;
use crate::ega::RawDataset;
use crate::error::ExportError;
use crate::organisation::{OrganisationDescriptor, OrganisationRegistry, national_node};

pub const SCHEMA_ORG_CONTEXT: &str = "https://schema.org/";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%d %H:%M:%S%.fZ",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescriptorType {
    Dataset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LanguageType {
    Language,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    #[serde(rename = "@type")]
    pub kind: LanguageType,
    pub identifier: String,
    pub name: String,
}

impl Language {
    pub fn english() -> Self {
        Self {
            kind: LanguageType::Language,
            identifier: "en".to_string(),
            name: "English".to_string(),
        }
    }
}

/// Field order is the JSON-LD key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetDescriptor {
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(rename = "@type")]
    pub kind: DescriptorType,
    pub identifier: String,
    pub creator: OrganisationDescriptor,
    pub name: String,
    pub publisher: OrganisationDescriptor,
    pub date_published: NaiveDate,
    pub keywords: Option<Vec<String>>,
    pub in_language: Vec<Language>,
    pub license: String,
    pub description: String,
}

/// What the transformer knows about the parent study.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyContext {
    pub dataset_count: usize,
    pub study_title: String,
    pub study_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DatasetTransformer {
    creator: OrganisationDescriptor,
    keywords: Option<Vec<String>>,
}

impl DatasetTransformer {
    /// Resolves the creator once; an unknown code fails here, before any record
    /// is touched.
    pub fn new(
        registry: &OrganisationRegistry,
        creator_code: Option<&str>,
        keywords: Option<Vec<String>>,
    ) -> Result<Self, ExportError> {
        let creator = registry.resolve(creator_code)?.clone();
        Ok(Self { creator, keywords })
    }

    pub fn transform(
        &self,
        raw: &RawDataset,
        context: &StudyContext,
    ) -> Result<DatasetDescriptor, ExportError> {
        let accession: DatasetAccession = raw.accession_id.parse()?;
        let identifier = accession.identifier_url();
        let date_published =
            parse_release_date(&raw.released_date).ok_or_else(|| ExportError::DateParse {
                accession: accession.to_string(),
                value: raw.released_date.clone(),
            })?;

        Ok(DatasetDescriptor {
            context: SCHEMA_ORG_CONTEXT.to_string(),
            kind: DescriptorType::Dataset,
            identifier: identifier.clone(),
            creator: self.creator.clone(),
            name: raw.title.clone(),
            publisher: national_node().clone(),
            date_published,
            keywords: self.keywords.clone(),
            in_language: vec![Language::english()],
            license: identifier,
            description: compose_description(raw.description.as_deref().unwrap_or(""), context),
        })
    }
}

/// Calendar date of an ISO-8601 date or date-time, as written in the source.
/// Offsets are not applied, so `2021-05-03T23:30:00-05:00` stays on May 3rd.
pub fn parse_release_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.date_naive());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|datetime| datetime.date())
}

pub fn compose_description(description: &str, context: &StudyContext) -> String {
    let mut composed = format!(
        "{} \n\nThis dataset is 1 of {} included in the study titled {}",
        description.trim(),
        context.dataset_count,
        context.study_title
    );
    match &context.study_url {
        Some(url) => {
            composed.push_str(", ");
            composed.push_str(url);
            composed.push('.');
        }
        None => composed.push('.'),
    }
    composed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepted_release_dates() {
        let expected = NaiveDate::from_ymd_opt(2021, 5, 3).unwrap();
        for value in [
            "2021-05-03",
            "2021-05-03T00:00:00",
            "2021-05-03T10:11:12.123456",
            "2021-05-03 10:11:12",
            "2021-05-03T10:11",
            "2021-05-03T23:30:00Z",
            "2021-05-03T23:30:00-05:00",
            "2021-05-03T01:00:00.000+01:00",
        ] {
            assert_eq!(parse_release_date(value), Some(expected), "{value}");
        }
    }

    #[test]
    fn parse_rejects_non_iso_dates() {
        for value in ["", "03/05/2021", "May 3 2021", "2021-13-01", "2021-05-03T"] {
            assert_eq!(parse_release_date(value), None, "{value}");
        }
    }

    #[test]
    fn description_without_study_url_ends_with_period() {
        let context = StudyContext {
            dataset_count: 4,
            study_title: "Childhood tumours".to_string(),
            study_url: None,
        };
        assert_eq!(
            compose_description("  Exomes.\n", &context),
            "Exomes. \n\nThis dataset is 1 of 4 included in the study titled Childhood tumours."
        );
    }
}
