use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::{ArtifactFormat, FailurePolicy};
use crate::ega::DEFAULT_BASE_URL;
use crate::error::ExportError;

pub const DEFAULT_CONFIG_FILE: &str = "researchdata.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// On-disk shape of `researchdata.json`. Every key is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub paginate: Option<bool>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub format: Option<ArtifactFormat>,
    #[serde(default)]
    pub fail_fast: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub archive: ArchiveSettings,
    /// `None` means one unparameterized related-datasets request.
    pub page_size: Option<u32>,
    pub format: ArtifactFormat,
    pub failure_policy: FailurePolicy,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            archive: ArchiveSettings::default(),
            page_size: Some(DEFAULT_PAGE_SIZE),
            format: ArtifactFormat::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub page_size: Option<u32>,
    pub no_pagination: bool,
    pub format: Option<ArtifactFormat>,
    pub fail_fast: bool,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `researchdata.json` from the working directory when it
    /// exists. A missing default file yields the built-in defaults.
    pub fn resolve(path: Option<&Utf8Path>) -> Result<ResolvedConfig, ExportError> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Utf8PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| ExportError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ExportError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, ExportError> {
        let timeout_secs = config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ExportError::ConfigParse(
                "timeout_secs must be positive".to_string(),
            ));
        }
        let page_size = match config.paginate {
            Some(false) => None,
            _ => Some(config.page_size.unwrap_or(DEFAULT_PAGE_SIZE)),
        };
        if page_size == Some(0) {
            return Err(ExportError::ConfigParse(
                "page_size must be positive".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            archive: ArchiveSettings {
                base_url: config
                    .base_url
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                timeout_secs,
                max_retries: config.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            },
            page_size,
            format: config.format.unwrap_or_default(),
            failure_policy: if config.fail_fast.unwrap_or(false) {
                FailurePolicy::FailFast
            } else {
                FailurePolicy::Continue
            },
        })
    }
}

impl ResolvedConfig {
    pub fn apply(mut self, overrides: ConfigOverrides) -> Result<Self, ExportError> {
        if let Some(base_url) = overrides.base_url {
            self.archive.base_url = base_url;
        }
        if let Some(timeout_secs) = overrides.timeout_secs {
            if timeout_secs == 0 {
                return Err(ExportError::ConfigParse(
                    "--timeout-secs must be positive".to_string(),
                ));
            }
            self.archive.timeout_secs = timeout_secs;
        }
        if let Some(page_size) = overrides.page_size {
            if page_size == 0 {
                return Err(ExportError::ConfigParse(
                    "--page-size must be positive".to_string(),
                ));
            }
            self.page_size = Some(page_size);
        }
        if overrides.no_pagination {
            self.page_size = None;
        }
        if let Some(format) = overrides.format {
            self.format = format;
        }
        if overrides.fail_fast {
            self.failure_policy = FailurePolicy::FailFast;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved, ResolvedConfig::default());
        assert_eq!(resolved.page_size, Some(DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn paginate_false_disables_paging() {
        let config = Config {
            paginate: Some(false),
            page_size: Some(50),
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.page_size, None);
    }
}
