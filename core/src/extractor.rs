use serde_json::Value;
use tracing::warn;

/// Pulls the first candidate's first text part out of a `generateContent` response.
///
/// Unexpected shapes (no candidates, safety-blocked output, error payloads) do not
/// fail: the whole body is returned serialized so the caller still gets a reply.
pub fn extract_reply(body: &Value) -> String {
    if let Some(text) = first_text(body) {
        return text.to_string();
    }

    warn!("Response did not contain candidate text, returning raw body");
    serde_json::to_string(body).unwrap_or_else(|_| body.to_string())
}

fn first_text(body: &Value) -> Option<&str> {
    body.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extracts_first_text() {
        let body = json!({"candidates":[{"content":{"parts":[{"text":"hi"}]}}]});
        assert_eq!(extract_reply(&body), "hi");
    }

    #[test]
    fn test_uses_first_candidate_and_part() {
        let body = json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "first"}, {"text": "second"}]}},
                {"content": {"parts": [{"text": "other"}]}}
            ],
            "usageMetadata": {"totalTokenCount": 12}
        });
        assert_eq!(extract_reply(&body), "first");
    }

    #[test]
    fn test_empty_object_degrades_to_raw() {
        assert_eq!(extract_reply(&json!({})), "{}");
    }

    #[test]
    fn test_empty_candidates_degrades_to_raw() {
        let body = json!({"candidates": []});
        assert_eq!(extract_reply(&body), r#"{"candidates":[]}"#);
    }

    #[test]
    fn test_safety_block_degrades_to_raw() {
        let body = json!({"candidates":[{"finishReason":"SAFETY"}]});
        let reply = extract_reply(&body);
        assert!(reply.contains("SAFETY"));
        let reparsed: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reparsed, body);
    }

    #[test]
    fn test_non_string_text_degrades_to_raw() {
        let body = json!({"candidates":[{"content":{"parts":[{"text": 42}]}}]});
        assert_eq!(extract_reply(&body), body.to_string());
    }
}
