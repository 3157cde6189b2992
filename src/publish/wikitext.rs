//! Wikitext description document for uploaded files.
//!
//! The file page carries a human-readable summary built from the record's
//! descriptive fields. Every field is escaped individually before templating
//! so a stray `|` or bracket in source metadata cannot break out of the
//! template.

use crate::record::Record;

/// Builds the file-page description document for one record.
#[must_use]
pub fn description_document(record: &Record) -> String {
    let mut lines = vec![
        "== {{int:filedesc}} ==".to_string(),
        "{{Information".to_string(),
    ];

    lines.push(field("description", record.title.as_deref(), record.description.as_deref()));
    lines.push(format!("| author = {}", escape(record.creator.as_deref().unwrap_or(""))));
    lines.push(format!("| date = {}", escape(record.date.as_deref().unwrap_or(""))));
    lines.push(format!(
        "| source = {}",
        record
            .is_shown_at
            .as_deref()
            .map(|url| format!("[{url} {}]", escape(record.data_provider_name.as_deref().unwrap_or("source record"))))
            .unwrap_or_default()
    ));
    lines.push(format!(
        "| permission = {}",
        escape(record.rights_uri.as_deref().unwrap_or(""))
    ));
    lines.push(format!(
        "| other_fields = {}",
        escape(record.identifier.as_deref().unwrap_or(""))
    ));
    lines.push("}}".to_string());

    lines.join("\n")
}

/// Combines title and free-text description into one field.
fn field(name: &str, title: Option<&str>, description: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(title) = title {
        parts.push(format!("'''{}'''", escape(title)));
    }
    if let Some(description) = description {
        parts.push(escape(description));
    }
    format!("| {name} = {}", parts.join(". "))
}

/// Neutralizes tokens reserved by the markup language.
///
/// Pipes break template fields; brackets and braces open links and templates.
#[must_use]
pub fn escape(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '|' => '-',
            '[' | '{' => '(',
            ']' | '}' => ')',
            other => other,
        })
        .collect()
}
