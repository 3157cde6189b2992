//! Presentation API 2.x manifest parser.
//!
//! Descends `sequences[*].canvases[*].images[*].resource` (optionally through
//! a nested `service` object) to one image identifier per canvas, in canvas
//! order. Each canvas contributes exactly one slot: when a canvas's identifier
//! cannot be resolved, its slot holds an empty string so page numbering stays
//! aligned with the physical pages.
//!
//! A manifest with more than one sequence has no single authoritative page
//! order, so it is treated as ambiguous and yields an empty result.

use serde_json::Value;
use tracing::warn;

/// Extracts one image identifier per canvas.
#[must_use]
pub fn parse(manifest: &Value) -> Vec<String> {
    let Some(sequences) = manifest.get("sequences").and_then(Value::as_array) else {
        warn!("v2 manifest has no sequences array");
        return Vec::new();
    };

    if sequences.len() != 1 {
        warn!(
            sequences = sequences.len(),
            "v2 manifest is ambiguous: expected exactly one sequence"
        );
        return Vec::new();
    }

    let canvases = sequences[0]
        .get("canvases")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    canvases
        .iter()
        .enumerate()
        .map(|(index, canvas)| {
            canvas_image_id(canvas).unwrap_or_else(|| {
                warn!(canvas = index + 1, "canvas image identifier unresolved");
                String::new()
            })
        })
        .collect()
}

/// Finds the image identifier for one canvas.
///
/// The image-service `@id` is preferred because it is the maximizable service
/// base; the plain resource `@id` is the fallback.
fn canvas_image_id(canvas: &Value) -> Option<String> {
    let resource = canvas
        .get("images")
        .and_then(Value::as_array)?
        .first()?
        .get("resource")?;

    let service_id = resource
        .get("service")
        .and_then(|service| service.get("@id"))
        .and_then(Value::as_str);

    let id = service_id.or_else(|| resource.get("@id").and_then(Value::as_str))?;

    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canvas(service_id: Option<&str>, resource_id: Option<&str>) -> Value {
        let mut resource = serde_json::Map::new();
        if let Some(id) = resource_id {
            resource.insert("@id".to_string(), json!(id));
        }
        if let Some(id) = service_id {
            resource.insert("service".to_string(), json!({"@id": id}));
        }
        json!({"images": [{"resource": Value::Object(resource)}]})
    }

    #[test]
    fn test_parse_prefers_service_id_over_resource_id() {
        let manifest = json!({
            "sequences": [{
                "canvases": [canvas(
                    Some("https://images.example.org/iiif/page1"),
                    Some("https://images.example.org/page1.jpg"),
                )]
            }]
        });
        assert_eq!(parse(&manifest), vec!["https://images.example.org/iiif/page1"]);
    }

    #[test]
    fn test_parse_falls_back_to_resource_id() {
        let manifest = json!({
            "sequences": [{
                "canvases": [canvas(None, Some("https://images.example.org/page1.jpg"))]
            }]
        });
        assert_eq!(parse(&manifest), vec!["https://images.example.org/page1.jpg"]);
    }

    #[test]
    fn test_unresolvable_canvas_keeps_positional_slot() {
        let manifest = json!({
            "sequences": [{
                "canvases": [
                    canvas(None, Some("https://images.example.org/1.jpg")),
                    json!({"images": []}),
                    canvas(None, Some("https://images.example.org/3.jpg")),
                ]
            }]
        });
        let urls = parse(&manifest);
        assert_eq!(urls.len(), 3);
        assert_eq!(urls[0], "https://images.example.org/1.jpg");
        assert_eq!(urls[1], "");
        assert_eq!(urls[2], "https://images.example.org/3.jpg");
    }

    #[test]
    fn test_multiple_sequences_is_ambiguous() {
        let manifest = json!({
            "sequences": [
                {"canvases": [canvas(None, Some("https://a/1.jpg"))]},
                {"canvases": [canvas(None, Some("https://b/1.jpg"))]}
            ]
        });
        assert!(parse(&manifest).is_empty());
    }

    #[test]
    fn test_missing_sequences_is_empty() {
        assert!(parse(&json!({"label": "no sequences"})).is_empty());
    }

    #[test]
    fn test_empty_canvases_is_empty() {
        let manifest = json!({"sequences": [{"canvases": []}]});
        assert!(parse(&manifest).is_empty());
    }
}
