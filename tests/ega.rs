use std::collections::VecDeque;
use std::sync::Mutex;

use assert_matches::assert_matches;
use reqwest::Url;
use serde_json::{Value, json};

use researchdata_export::domain::StudyAccession;
use researchdata_export::ega::{EgaClient, Page, Transport};
use researchdata_export::error::ExportError;

/// Replays canned bodies in order and records every requested URL.
struct ScriptedTransport {
    bodies: Mutex<VecDeque<Value>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn new(bodies: Vec<Value>) -> Self {
        Self {
            bodies: Mutex::new(bodies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn get_json(&self, url: &Url) -> Result<Value, ExportError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.bodies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ExportError::ArchiveTransport("script exhausted".to_string()))
    }
}

fn client(bodies: Vec<Value>) -> EgaClient<ScriptedTransport> {
    EgaClient::new(ScriptedTransport::new(bodies), "https://metadata.ega-archive.org").unwrap()
}

#[test]
fn fetch_entity_omits_absent_pagination() {
    let client = client(vec![json!({"accession_id": "EGAS00001000001"})]);
    let study = client
        .fetch_entity("studies", Some("EGAS00001000001"), Page::default())
        .unwrap();

    assert_eq!(study["accession_id"], "EGAS00001000001");
    assert_eq!(
        client.transport().calls(),
        vec!["https://metadata.ega-archive.org/studies/EGAS00001000001"]
    );
}

#[test]
fn fetch_entity_passes_limit_and_offset() {
    let client = client(vec![json!([]), json!([])]);
    client
        .fetch_entity("datasets", None, Page { limit: Some(25), offset: None })
        .unwrap();
    client.fetch_entity("datasets", None, Page::new(25, 50)).unwrap();

    assert_eq!(
        client.transport().calls(),
        vec![
            "https://metadata.ega-archive.org/datasets?limit=25",
            "https://metadata.ega-archive.org/datasets?limit=25&offset=50",
        ]
    );
}

#[test]
fn related_entities_must_be_an_array() {
    let client = client(vec![json!({"accession_id": "EGAD00001000001"})]);
    let err = client
        .fetch_related_entities("studies", "datasets", "EGAS00001000001", Page::default())
        .unwrap_err();
    assert_matches!(err, ExportError::ArchiveDecode { message, .. } if message.contains("an object"));
}

#[test]
fn empty_entity_type_is_rejected_without_a_request() {
    let client = client(vec![]);
    let err = client
        .fetch_related_entities("studies", "", "EGAS00001000001", Page::default())
        .unwrap_err();
    assert_matches!(err, ExportError::InvalidRequest(_));
    assert!(client.transport().calls().is_empty());
}

#[test]
fn fetch_all_walks_pages_until_empty() {
    let client = client(vec![
        json!([{"accession_id": "EGAD1"}, {"accession_id": "EGAD2"}]),
        json!([{"accession_id": "EGAD3"}]),
        json!([]),
    ]);
    let items = client
        .fetch_all_related_entities("studies", "datasets", "EGAS00001000001", Some(2))
        .unwrap();

    let ids: Vec<_> = items
        .iter()
        .map(|item| item["accession_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["EGAD1", "EGAD2", "EGAD3"]);
    assert_eq!(
        client.transport().calls(),
        vec![
            "https://metadata.ega-archive.org/studies/EGAS00001000001/datasets?limit=2&offset=0",
            "https://metadata.ega-archive.org/studies/EGAS00001000001/datasets?limit=2&offset=2",
            "https://metadata.ega-archive.org/studies/EGAS00001000001/datasets?limit=2&offset=3",
        ]
    );
}

/// Serves a fixed record list, never more than `cap` records per page.
struct CappedArchive {
    records: Vec<Value>,
    cap: usize,
    calls: Mutex<Vec<String>>,
}

impl Transport for CappedArchive {
    fn get_json(&self, url: &Url) -> Result<Value, ExportError> {
        self.calls.lock().unwrap().push(url.to_string());
        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .and_then(|(_, value)| value.parse::<usize>().ok())
        };
        let offset = param("offset").unwrap_or(0);
        let limit = param("limit").unwrap_or(self.records.len()).min(self.cap);
        let page: Vec<Value> = self.records.iter().skip(offset).take(limit).cloned().collect();
        Ok(Value::Array(page))
    }
}

#[test]
fn fetch_all_follows_short_pages() {
    let records: Vec<Value> = (1..=5)
        .map(|n| json!({"accession_id": format!("EGAD0000100000{n}")}))
        .collect();
    let archive = CappedArchive {
        records: records.clone(),
        cap: 2,
        calls: Mutex::new(Vec::new()),
    };
    let client = EgaClient::new(archive, "https://metadata.ega-archive.org").unwrap();

    let items = client
        .fetch_all_related_entities("studies", "datasets", "EGAS00001000001", Some(100))
        .unwrap();

    assert_eq!(items, records);
    let offsets: Vec<_> = client
        .transport()
        .calls
        .lock()
        .unwrap()
        .iter()
        .map(|call| call.rsplit('=').next().unwrap().to_string())
        .collect();
    assert_eq!(offsets, vec!["0", "2", "4", "5"]);
}

#[test]
fn fetch_all_without_page_size_is_one_request() {
    let client = client(vec![json!([{"accession_id": "EGAD1"}])]);
    let items = client
        .fetch_all_related_entities("studies", "datasets", "EGAS00001000001", None)
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(
        client.transport().calls(),
        vec!["https://metadata.ega-archive.org/studies/EGAS00001000001/datasets"]
    );
}

#[test]
fn fetch_all_detects_an_archive_ignoring_offset() {
    let page = json!([{"accession_id": "EGAD1"}]);
    let client = client(vec![page.clone(), page]);
    let err = client
        .fetch_all_related_entities("studies", "datasets", "EGAS00001000001", Some(1))
        .unwrap_err();
    assert_matches!(err, ExportError::ArchiveDecode { .. });
}

#[test]
fn fetch_study_decodes_title() {
    let client = client(vec![json!({
        "accession_id": "EGAS00001000001",
        "title": "Study A",
        "study_type": "Whole Genome Sequencing"
    })]);
    let accession: StudyAccession = "EGAS00001000001".parse().unwrap();
    let study = client.fetch_study(&accession).unwrap();
    assert_eq!(study.title, "Study A");
}

#[test]
fn invalid_base_url_is_rejected() {
    let err = EgaClient::new(ScriptedTransport::new(vec![]), "not a url").err().unwrap();
    assert_matches!(err, ExportError::InvalidBaseUrl(_));
}
