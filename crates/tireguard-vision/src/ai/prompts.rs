//! Prompt sent to the vision backend for one tire photo
//!
//! The JSON template carries placeholders only, so the model has to read
//! the sidewall instead of echoing example values.

const FINGERPRINT_TEMPLATE: &str = r#"{
  "brand": "<manufacturer as molded on the sidewall, or null>",
  "model": "<tread pattern / product line, or null>",
  "serialOrDot": "<DOT code or serial number, or null>",
  "treadDepthMm": <measured tread depth in millimetres, or null>,
  "rimDescriptor": "<rim size and material, e.g. diameter + steel/alloy, or null>"
}"#;

/// Build the extraction prompt for a single tire photograph
pub fn build_fingerprint_prompt() -> String {
    format!(
        r#"You are inspecting one photograph of a truck tire mounted on a wheel.

Read only what is visible in the image:
- brand: the manufacturer name molded on the sidewall
- model: the tread pattern or product line printed next to the brand
- serialOrDot: the DOT code (starts with "DOT") or any serial number
- treadDepthMm: tread depth in millimetres if a gauge or scale is visible
- rimDescriptor: rim diameter and material if legible

Rules:
- If a field cannot be read with confidence, output null. Never guess.
- Copy text exactly as molded (keep the manufacturer's spelling).
- Output a single JSON object and nothing else.

Output format:
{}"#,
        FINGERPRINT_TEMPLATE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_every_field() {
        let prompt = build_fingerprint_prompt();
        for field in ["brand", "model", "serialOrDot", "treadDepthMm", "rimDescriptor"] {
            assert!(prompt.contains(field), "missing {}", field);
        }
        assert!(prompt.contains("output null"));
    }
}
