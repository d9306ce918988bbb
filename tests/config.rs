use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use researchdata_export::config::{
    Config, ConfigLoader, ConfigOverrides, DEFAULT_PAGE_SIZE, ResolvedConfig,
};
use researchdata_export::domain::{ArtifactFormat, FailurePolicy};
use researchdata_export::error::ExportError;

fn write_config(content: &str) -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("researchdata.json")).unwrap();
    std::fs::write(path.as_std_path(), content).unwrap();
    (temp, path)
}

#[test]
fn load_config_file() {
    let (_temp, path) = write_config(
        r#"{
            "base_url": "http://localhost:9000",
            "timeout_secs": 5,
            "page_size": 20,
            "format": "html",
            "fail_fast": true
        }"#,
    );

    let resolved = ConfigLoader::resolve(Some(&path)).unwrap();
    assert_eq!(resolved.archive.base_url, "http://localhost:9000");
    assert_eq!(resolved.archive.timeout_secs, 5);
    assert_eq!(resolved.page_size, Some(20));
    assert_eq!(resolved.format, ArtifactFormat::Html);
    assert_eq!(resolved.failure_policy, FailurePolicy::FailFast);
}

#[test]
fn unknown_keys_are_rejected() {
    let (_temp, path) = write_config(r#"{"base-url": "http://localhost:9000"}"#);
    let err = ConfigLoader::resolve(Some(&path)).unwrap_err();
    assert_matches!(err, ExportError::ConfigParse(_));
}

#[test]
fn explicit_missing_file_is_an_error() {
    let path = Utf8PathBuf::from("/nonexistent/researchdata.json");
    let err = ConfigLoader::resolve(Some(&path)).unwrap_err();
    assert_matches!(err, ExportError::ConfigRead(_));
}

#[test]
fn zero_timeout_is_rejected() {
    let config = Config {
        timeout_secs: Some(0),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(ExportError::ConfigParse(_))
    );
}

#[test]
fn command_line_overrides_win() {
    let resolved = ResolvedConfig::default()
        .apply(ConfigOverrides {
            base_url: Some("http://mirror.test".to_string()),
            timeout_secs: Some(90),
            format: Some(ArtifactFormat::Html),
            fail_fast: true,
            ..ConfigOverrides::default()
        })
        .unwrap();
    assert_eq!(resolved.archive.base_url, "http://mirror.test");
    assert_eq!(resolved.archive.timeout_secs, 90);
    assert_eq!(resolved.page_size, Some(DEFAULT_PAGE_SIZE));
    assert_eq!(resolved.format, ArtifactFormat::Html);
    assert_eq!(resolved.failure_policy, FailurePolicy::FailFast);

    let unpaged = ResolvedConfig::default()
        .apply(ConfigOverrides {
            no_pagination: true,
            ..ConfigOverrides::default()
        })
        .unwrap();
    assert_eq!(unpaged.page_size, None);
}
