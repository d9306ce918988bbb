//! Organisation codes accepted by `--creator` and their schema.org descriptors.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::domain::ArtifactFormat;
use crate::error::ExportError;

pub const UNSPECIFIED: &str = "unspecified";
pub const NATIONAL_NODE: &str = "FEGA-SE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrganisationType {
    Organization,
}

/// schema.org `Organization`. The `unspecified` sentinel has every field null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganisationDescriptor {
    #[serde(rename = "@type")]
    pub kind: Option<OrganisationType>,
    #[serde(rename = "@id")]
    pub id: Option<String>,
    pub name: Option<String>,
}

impl OrganisationDescriptor {
    fn unspecified() -> Self {
        Self {
            kind: None,
            id: None,
            name: None,
        }
    }

    fn organization(id: Option<&str>, name: &str) -> Self {
        Self {
            kind: Some(OrganisationType::Organization),
            id: id.map(str::to_string),
            name: Some(name.to_string()),
        }
    }
}

#[derive(Debug)]
pub struct OrganisationRegistry {
    entries: Vec<(&'static str, OrganisationDescriptor)>,
}

static NATIONAL_NODE_ORG: LazyLock<OrganisationDescriptor> =
    LazyLock::new(|| OrganisationDescriptor::organization(None, "FEGA Sweden"));

static FULL: LazyLock<OrganisationRegistry> = LazyLock::new(|| OrganisationRegistry {
    entries: vec![
        (UNSPECIFIED, OrganisationDescriptor::unspecified()),
        (NATIONAL_NODE, NATIONAL_NODE_ORG.clone()),
        (
            "LiU",
            OrganisationDescriptor::organization(
                Some("https://ror.org/05ynxx418"),
                "Linköping University",
            ),
        ),
        (
            "LU",
            OrganisationDescriptor::organization(
                Some("https://ror.org/012a77v79"),
                "Lund University",
            ),
        ),
        (
            "UU",
            OrganisationDescriptor::organization(
                Some("https://ror.org/048a87296"),
                "Uppsala University",
            ),
        ),
        (
            "BTB",
            OrganisationDescriptor::organization(None, "The Swedish Childhood Tumor Biobank"),
        ),
    ],
});

static FRAGMENT: LazyLock<OrganisationRegistry> = LazyLock::new(|| OrganisationRegistry {
    entries: FULL
        .entries
        .iter()
        .filter(|(code, _)| *code != "BTB")
        .cloned()
        .collect(),
});

impl OrganisationRegistry {
    /// Every code the CLI accepts.
    pub fn full() -> &'static OrganisationRegistry {
        &FULL
    }

    /// Registry in effect for an artifact format; HTML fragments use a smaller one.
    pub fn for_format(format: ArtifactFormat) -> &'static OrganisationRegistry {
        match format {
            ArtifactFormat::Qmd => &FULL,
            ArtifactFormat::Html => &FRAGMENT,
        }
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(code, _)| *code).collect()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.entries.iter().any(|(key, _)| *key == code)
    }

    /// `None` resolves to the `unspecified` sentinel; an unknown code is an error.
    pub fn resolve(&self, code: Option<&str>) -> Result<&OrganisationDescriptor, ExportError> {
        let code = code.unwrap_or(UNSPECIFIED);
        self.entries
            .iter()
            .find(|(key, _)| *key == code)
            .map(|(_, descriptor)| descriptor)
            .ok_or_else(|| ExportError::UnknownOrganisation(code.to_string()))
    }
}

/// Publisher of every exported dataset.
pub fn national_node() -> &'static OrganisationDescriptor {
    &NATIONAL_NODE_ORG
}
