//! Presentation API 3.0 manifest parser.
//!
//! Descends `items[*].items[0].items[0].body.id` (canvas, annotation page,
//! annotation, body). Unlike the 2.x parser, any structural mismatch (missing
//! key, wrong type, out-of-range index) aborts the entire parse and returns an
//! empty list: a partial result cannot be trusted because the page ordering
//! would be unverifiable.

use serde_json::Value;
use tracing::warn;

/// Extracts one image identifier per canvas, or nothing at all.
#[must_use]
pub fn parse(manifest: &Value) -> Vec<String> {
    let Some(canvases) = manifest.get("items").and_then(Value::as_array) else {
        warn!("v3 manifest has no items array");
        return Vec::new();
    };

    let mut urls = Vec::with_capacity(canvases.len());
    for (index, canvas) in canvases.iter().enumerate() {
        match canvas_body_id(canvas) {
            Some(url) => urls.push(url),
            None => {
                warn!(
                    canvas = index + 1,
                    "v3 canvas structure mismatch, discarding entire manifest"
                );
                return Vec::new();
            }
        }
    }
    urls
}

/// Reads `items[0].items[0].body.id` under one canvas.
fn canvas_body_id(canvas: &Value) -> Option<String> {
    let id = canvas
        .get("items")
        .and_then(Value::as_array)?
        .first()?
        .get("items")
        .and_then(Value::as_array)?
        .first()?
        .get("body")?
        .get("id")?
        .as_str()?
        .trim();
    (!id.is_empty()).then(|| id.to_string())
}
