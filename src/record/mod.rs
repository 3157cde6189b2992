//! Typed view of one aggregator catalog record.
//!
//! The aggregator returns an arbitrarily nested JSON document. Only a handful
//! of paths are ever read by the pipeline, so [`Record`] lifts those into
//! named optional fields and keeps the rest as an opaque blob (`raw`) retained
//! solely for the audit side file. Records are immutable once fetched, with
//! one exception: a manifest URL discovered by the eligibility probe is
//! injected back into both the typed field and the raw document so downstream
//! stages and re-runs see it.

mod api;
pub mod provider;

pub use api::{AggregatorClient, AggregatorError};

use serde_json::Value;

/// One catalog record.
#[derive(Debug, Clone)]
pub struct Record {
    /// Opaque stable identifier; storage paths derive from it.
    pub id: String,
    /// Display title.
    pub title: Option<String>,
    /// Rights statement URI.
    pub rights_uri: Option<String>,
    /// Provider display name.
    pub provider_name: Option<String>,
    /// Data-provider (institution) display name.
    pub data_provider_name: Option<String>,
    /// Landing-page URL at the contributing institution.
    pub is_shown_at: Option<String>,
    /// Direct, ordered media URLs, when the record carries them.
    pub media_urls: Vec<String>,
    /// IIIF manifest URL, when declared (or discovered by the probe).
    pub manifest_url: Option<String>,
    /// Creator, for the description document.
    pub creator: Option<String>,
    /// Free-text description, for the description document.
    pub description: Option<String>,
    /// Display date, for the description document.
    pub date: Option<String>,
    /// Local identifier at the institution, for the description document.
    pub identifier: Option<String>,
    /// The full aggregator document, untouched apart from manifest injection.
    pub raw: Value,
}

impl Record {
    /// Builds a typed record from an aggregator document.
    ///
    /// Returns `None` when the document has no usable `id`.
    #[must_use]
    pub fn from_document(doc: Value) -> Option<Self> {
        let id = doc.get("id")?.as_str()?.trim().to_string();
        if id.is_empty() {
            return None;
        }

        let source_resource = doc.get("sourceResource");

        let record = Self {
            id,
            title: source_resource.and_then(|sr| first_string(sr.get("title"))),
            rights_uri: first_string(doc.get("rights")),
            provider_name: display_name(doc.get("provider")),
            data_provider_name: display_name(doc.get("dataProvider")),
            is_shown_at: first_string(doc.get("isShownAt")),
            media_urls: string_list(doc.get("mediaMaster")),
            manifest_url: first_string(doc.get("iiifManifest")),
            creator: source_resource.and_then(|sr| first_string(sr.get("creator"))),
            description: source_resource.and_then(|sr| first_string(sr.get("description"))),
            date: source_resource
                .and_then(|sr| sr.get("date"))
                .and_then(|d| first_string(d.get("displayDate")).or_else(|| first_string(Some(d)))),
            identifier: source_resource.and_then(|sr| first_string(sr.get("identifier"))),
            raw: doc,
        };
        Some(record)
    }

    /// Returns true if the record carries a non-empty direct asset list.
    #[must_use]
    pub fn has_media_urls(&self) -> bool {
        !self.media_urls.is_empty()
    }

    /// Returns true if the record declares a non-empty manifest URL.
    #[must_use]
    pub fn has_manifest(&self) -> bool {
        self.manifest_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    /// Records a manifest URL discovered by the eligibility probe.
    ///
    /// The URL is written to the typed field and into the raw document so the
    /// audit side file and any re-run see the discovery.
    pub fn set_discovered_manifest(&mut self, url: impl Into<String>) {
        let url = url.into();
        if let Value::Object(map) = &mut self.raw {
            map.insert("iiifManifest".to_string(), Value::String(url.clone()));
        }
        self.manifest_url = Some(url);
    }
}

/// Reads a string out of a value that may be a string or an array of strings.
///
/// The aggregator is inconsistent about cardinality; the first element wins.
fn first_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => items.iter().find_map(|item| first_string(Some(item))),
        _ => None,
    }
}

/// Reads a display name from a value that may be a string or `{"name": ...}`.
fn display_name(value: Option<&Value>) -> Option<String> {
    let value = value?;
    if let Some(name) = value.get("name") {
        return first_string(Some(name));
    }
    first_string(Some(value))
}

/// Reads an ordered list of strings, dropping empty entries.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_document() -> Value {
        json!({
            "id": "4f302d0cc3a7bc0ecf0b5325b0f295e7",
            "rights": "http://rightsstatements.org/vocab/NoC-US/1.0/",
            "provider": {"name": "National Archives"},
            "dataProvider": "Records Administration",
            "isShownAt": "https://catalog.example.org/id/123",
            "mediaMaster": ["https://media.example.org/1.jpg", "https://media.example.org/2.jpg"],
            "sourceResource": {
                "title": ["Letter to the Governor", "alternate"],
                "creator": "Smith, Jane",
                "description": "A letter.",
                "date": {"displayDate": "1901"},
                "identifier": "mss-001"
            }
        })
    }

    #[test]
    fn test_from_document_lifts_typed_fields() {
        let record = Record::from_document(sample_document()).unwrap();
        assert_eq!(record.id, "4f302d0cc3a7bc0ecf0b5325b0f295e7");
        assert_eq!(record.title.as_deref(), Some("Letter to the Governor"));
        assert_eq!(
            record.rights_uri.as_deref(),
            Some("http://rightsstatements.org/vocab/NoC-US/1.0/")
        );
        assert_eq!(record.provider_name.as_deref(), Some("National Archives"));
        assert_eq!(
            record.data_provider_name.as_deref(),
            Some("Records Administration")
        );
        assert_eq!(record.media_urls.len(), 2);
        assert!(record.manifest_url.is_none());
        assert_eq!(record.creator.as_deref(), Some("Smith, Jane"));
        assert_eq!(record.date.as_deref(), Some("1901"));
    }

    #[test]
    fn test_from_document_without_id_is_none() {
        assert!(Record::from_document(json!({"title": "no id"})).is_none());
        assert!(Record::from_document(json!({"id": ""})).is_none());
    }

    #[test]
    fn test_rights_as_array_takes_first() {
        let mut doc = sample_document();
        doc["rights"] = json!(["http://creativecommons.org/publicdomain/zero/1.0/", "other"]);
        let record = Record::from_document(doc).unwrap();
        assert_eq!(
            record.rights_uri.as_deref(),
            Some("http://creativecommons.org/publicdomain/zero/1.0/")
        );
    }

    #[test]
    fn test_set_discovered_manifest_updates_raw_document() {
        let mut record = Record::from_document(sample_document()).unwrap();
        assert!(!record.has_manifest());

        record.set_discovered_manifest("https://iiif.example.org/manifest.json");

        assert!(record.has_manifest());
        assert_eq!(
            record.raw["iiifManifest"],
            json!("https://iiif.example.org/manifest.json")
        );
    }

    #[test]
    fn test_media_urls_drop_blank_entries() {
        let mut doc = sample_document();
        doc["mediaMaster"] = json!(["  ", "https://media.example.org/1.jpg", ""]);
        let record = Record::from_document(doc).unwrap();
        assert_eq!(record.media_urls, vec!["https://media.example.org/1.jpg"]);
    }
}
