//! Parsing of oracle responses
//!
//! Oracle output is raw text that is sometimes strict JSON, sometimes JSON
//! wrapped in markdown fences or prose, and sometimes garbage. Parsing
//! yields a tagged result so every consumer handles the unparseable path
//! explicitly instead of treating it as an exceptional condition.

use serde_json::Value;

/// Outcome of parsing an oracle response as JSON
#[derive(Debug, Clone, PartialEq)]
pub enum OracleJson {
    /// A JSON value was recovered from the response
    Parsed(Value),
    /// No JSON could be recovered; the raw text is kept for logging
    Unparseable(String),
}

impl OracleJson {
    /// The parsed value, if any
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::Unparseable(_) => None,
        }
    }
}

/// Recover a JSON value from oracle text.
///
/// Tries, in order: the whole response, the body of the first markdown code
/// fence, the outermost `{...}` slice, the outermost `[...]` slice.
#[must_use]
pub fn parse_json_output(text: &str) -> OracleJson {
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return OracleJson::Parsed(value);
    }

    if let Some(inner) = fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(inner.trim()) {
            return OracleJson::Parsed(value);
        }
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(slice) = bracket_slice(trimmed, open, close) {
            if let Ok(value) = serde_json::from_str::<Value>(slice) {
                return OracleJson::Parsed(value);
            }
        }
    }

    OracleJson::Unparseable(text.to_string())
}

/// Body of the first ``` fence, with an optional language tag stripped
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_ticks = &text[start + 3..];
    // Skip a language tag like `json` up to the end of that line
    let body_start = after_ticks.find('\n').map_or(0, |idx| idx + 1);
    let body = &after_ticks[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// Outermost `open ... close` slice of the text, if both brackets appear
fn bracket_slice(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Extract ranked article ids from a parsed oracle response.
///
/// Accepts both shapes the ranking oracle produces: bare id strings
/// (`["a1", "a2"]`) and id objects (`[{"_id": "a1"}, ...]`) with the id
/// under any of the common key names. Ids of unknown shape are skipped.
#[must_use]
pub fn extract_ranked_ids(value: &Value) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    let mut ids = Vec::new();
    for item in items {
        match item {
            Value::String(s) => ids.push(s.clone()),
            Value::Number(n) => ids.push(n.to_string()),
            Value::Object(map) => {
                let id = ["_id", "id", "article_id"]
                    .iter()
                    .find_map(|key| map.get(*key))
                    .and_then(|v| match v {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    });
                if let Some(id) = id {
                    ids.push(id);
                }
            }
            _ => {}
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let result = parse_json_output(r#"{"Person": ["Ada"]}"#);
        let value = result.into_value().unwrap();
        assert_eq!(value["Person"][0], "Ada");
    }

    #[test]
    fn parses_fenced_json() {
        let text = "Here you go:\n```json\n[\"a1\", \"a2\"]\n```\nHope that helps!";
        let value = parse_json_output(text).into_value().unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let text = "The entities are {\"Person\": [], \"Location\": [\"Oslo\"], \"Organization\": []} as requested.";
        let value = parse_json_output(text).into_value().unwrap();
        assert_eq!(value["Location"][0], "Oslo");
    }

    #[test]
    fn garbage_is_unparseable_and_keeps_raw_text() {
        let result = parse_json_output("I'm sorry, I cannot rank these articles.");
        assert_eq!(
            result,
            OracleJson::Unparseable("I'm sorry, I cannot rank these articles.".to_string())
        );
    }

    #[test]
    fn extracts_bare_string_ids() {
        let value: Value = serde_json::from_str(r#"["a1", "a2", "a3"]"#).unwrap();
        assert_eq!(extract_ranked_ids(&value), vec!["a1", "a2", "a3"]);
    }

    #[test]
    fn extracts_ids_from_objects_under_any_accepted_key() {
        let value: Value = serde_json::from_str(
            r#"[{"_id": "a1"}, {"id": "a2"}, {"article_id": "a3"}, {"title": "no id here"}]"#,
        )
        .unwrap();
        assert_eq!(extract_ranked_ids(&value), vec!["a1", "a2", "a3"]);
    }

    #[test]
    fn extracts_numeric_ids_as_strings() {
        let value: Value = serde_json::from_str(r#"[42, {"id": 7}]"#).unwrap();
        assert_eq!(extract_ranked_ids(&value), vec!["42", "7"]);
    }

    #[test]
    fn non_array_value_yields_no_ids() {
        let value: Value = serde_json::from_str(r#"{"ranked": ["a1"]}"#).unwrap();
        assert!(extract_ranked_ids(&value).is_empty());
    }
}
