//! Parsing of vision backend output into an ExtractedIdentity

use serde_json::Value;
use tireguard_types::{Error, ExtractedIdentity, Result};

/// Values backends emit when they could not read a field
const UNREADABLE: &[&str] = &["", "?", "unknown", "n/a", "none", "null", "unreadable"];

/// Parse a backend response.
///
/// Accepts camelCase or snake_case keys and tread depth either as a number
/// or as text such as `"8.5mm"`. Unreadable markers become `None`.
pub fn parse_response(response: &str) -> Result<ExtractedIdentity> {
    let json_str = extract_json_from_response(response);

    let value: Value = serde_json::from_str(&json_str).map_err(|e| {
        let truncated: String = response.chars().take(200).collect();
        Error::ExtractionFailure(format!("unparseable response ({}): {}", e, truncated))
    })?;

    let object = value.as_object().ok_or_else(|| {
        Error::ExtractionFailure("response is not a JSON object".to_string())
    })?;

    let text = |keys: &[&str]| -> Option<String> {
        keys.iter()
            .filter_map(|k| object.get(*k))
            .find_map(|v| v.as_str().map(str::trim).map(str::to_string))
            .filter(|s| !UNREADABLE.contains(&s.to_lowercase().as_str()))
    };

    let tread_depth_mm = ["treadDepthMm", "tread_depth_mm", "treadDepth"]
        .iter()
        .filter_map(|k| object.get(*k))
        .find_map(depth_value);

    Ok(ExtractedIdentity {
        brand: text(&["brand"]),
        model: text(&["model"]),
        serial_or_dot: text(&["serialOrDot", "serial_or_dot", "serialOrDOT", "serial", "dot"]),
        tread_depth_mm,
        rim_descriptor: text(&["rimDescriptor", "rim_descriptor", "rim"]),
    })
}

fn depth_value(value: &Value) -> Option<f64> {
    let depth = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_end_matches("mm")
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok(),
        _ => None,
    }?;
    (depth.is_finite() && depth >= 0.0).then_some(depth)
}

/// Extract JSON from response (handles markdown code blocks)
pub fn extract_json_from_response(response: &str) -> String {
    let response = response.trim();

    if response.starts_with("```") {
        if let Some(end) = response.rfind("```") {
            let start = response.find('\n').map(|i| i + 1).unwrap_or(3);
            if start < end {
                return response[start..end].trim().to_string();
            }
        }
    }

    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if start < end {
                return response[start..=end].to_string();
            }
        }
    }

    response.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_markdown() {
        let response = "```json\n{\"test\": 123}\n```";
        assert_eq!(extract_json_from_response(response), "{\"test\": 123}");
    }

    #[test]
    fn test_extract_json_with_text() {
        let response = "Here is the result: {\"test\": 123} end";
        assert_eq!(extract_json_from_response(response), "{\"test\": 123}");
    }

    #[test]
    fn test_parse_full_response() {
        let identity = parse_response(
            r#"{"brand":"MICHELIN","model":"X MULTI D","serialOrDot":"DOT 4B2C 1223","treadDepthMm":14.5,"rimDescriptor":"22.5 steel"}"#,
        )
        .unwrap();
        assert_eq!(identity.brand.as_deref(), Some("MICHELIN"));
        assert_eq!(identity.serial_or_dot.as_deref(), Some("DOT 4B2C 1223"));
        assert_eq!(identity.tread_depth_mm, Some(14.5));
        assert!(identity.is_identified());
    }

    #[test]
    fn test_unreadable_markers_become_none() {
        let identity = parse_response(
            "```json\n{\"brand\":\"Bridgestone\",\"model\":\"unknown\",\"rim\":\"?\",\"tread_depth_mm\":\"8,5 mm\"}\n```",
        )
        .unwrap();
        assert_eq!(identity.brand.as_deref(), Some("Bridgestone"));
        assert!(identity.model.is_none());
        assert!(identity.rim_descriptor.is_none());
        assert_eq!(identity.tread_depth_mm, Some(8.5));
        assert!(!identity.is_identified());
    }

    #[test]
    fn test_garbage_is_extraction_failure() {
        let result = parse_response("the tire is black");
        assert!(matches!(result, Err(Error::ExtractionFailure(_))));
        assert!(matches!(parse_response("[1,2]"), Err(Error::ExtractionFailure(_))));
    }
}
