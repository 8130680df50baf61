//! Recovers a JSON object from free-form vision model replies.
//!
//! Models wrap their answer in markdown fences, prepend reasoning blocks and
//! leave trailing commas behind. Extraction is an ordered chain of fallible
//! strategies; the first one that yields a JSON object wins.

use serde_json::Value;
use tracing::debug;

use crate::error::QuotaError;

const REASONING_TAGS: [(&str, &str); 2] = [
    ("<think>", "</think>"),
    ("<thinking>", "</thinking>"),
];
const FENCE: &str = "```";

type Strategy = fn(&str) -> Option<Value>;

const STRATEGIES: [(&str, Strategy); 4] = [
    ("fenced", fenced_block),
    ("balanced", balanced_object),
    ("repaired", repaired_object),
    ("whole", whole_text),
];

pub fn extract_json(text: &str) -> Result<Value, QuotaError> {
    if text.trim().is_empty() {
        return Err(QuotaError::Extraction {
            raw: text.to_string(),
        });
    }

    let cleaned = strip_reasoning(text);
    for (name, strategy) in STRATEGIES {
        if let Some(value) = strategy(&cleaned) {
            debug!(strategy = name, "extracted JSON object from model reply");
            return Ok(value);
        }
    }

    Err(QuotaError::Extraction {
        raw: text.to_string(),
    })
}

fn decode_object(candidate: &str) -> Option<Value> {
    serde_json::from_str::<Value>(candidate.trim())
        .ok()
        .filter(Value::is_object)
}

fn decode_object_or_repair(candidate: &str) -> Option<Value> {
    decode_object(candidate).or_else(|| decode_object(&strip_trailing_commas(candidate)))
}

/// Removes `<think>`/`<thinking>` spans (case-insensitive). A closing tag left
/// without an opener drops everything before it.
pub fn strip_reasoning(text: &str) -> String {
    let mut out = text.to_string();
    for (open, close) in REASONING_TAGS {
        out = strip_tag_spans(&out, open, close);
    }
    for (_, close) in REASONING_TAGS {
        let lower = out.to_ascii_lowercase();
        if let Some(idx) = lower.rfind(close) {
            out = out[idx + close.len()..].to_string();
        }
    }
    out.trim().to_string()
}

// ASCII lowercasing keeps byte offsets, so indices found in `lower` are valid in `rest`.
fn strip_tag_spans(text: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let lower = rest.to_ascii_lowercase();
        let Some(start) = lower.find(open) else {
            out.push_str(rest);
            break;
        };
        let body_start = start + open.len();
        let Some(body_len) = lower[body_start..].find(close) else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..start]);
        rest = &rest[body_start + body_len + close.len()..];
    }
    out
}

/// Contents of the first fenced block labeled `json` or left unlabeled.
pub fn first_json_fence(text: &str) -> Option<&str> {
    let mut rest = text;
    while let Some(open) = rest.find(FENCE) {
        let after = &rest[open + FENCE.len()..];
        let label_len = after
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(after.len());
        let label = &after[..label_len];
        let body = &after[label_len..];
        let close = body.find(FENCE)?;
        if label.is_empty() || label.eq_ignore_ascii_case("json") {
            return Some(&body[..close]);
        }
        rest = &body[close + FENCE.len()..];
    }
    None
}

fn fenced_block(text: &str) -> Option<Value> {
    first_json_fence(text).and_then(decode_object)
}

/// The span from the first `{` to its matching `}`, skipping braces inside
/// string literals.
pub fn balanced_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn balanced_object(text: &str) -> Option<Value> {
    balanced_span(text).and_then(decode_object)
}

fn repaired_object(text: &str) -> Option<Value> {
    let span = balanced_span(text)?;
    decode_object(&strip_trailing_commas(span))
}

fn whole_text(text: &str) -> Option<Value> {
    decode_object_or_repair(text)
}

/// Drops commas that directly precede `}` or `]`, ignoring string literals.
pub fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;

    for (idx, &ch) in chars.iter().enumerate() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            ',' => {
                let next = chars[idx + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{
        balanced_span, extract_json, first_json_fence, strip_reasoning, strip_trailing_commas,
    };
    use crate::error::QuotaError;
    use serde_json::json;

    #[test]
    fn fenced_json_is_recovered_exactly() {
        let reply = "Here you go:\n```json\n{\"current_session\":{\"percent_used\":42,\"resets_in\":\"3 hr\"},\"weekly_limits\":{\"percent_used\":null,\"resets\":\"Thu\"}}\n```\nAnything else?";
        let got = extract_json(reply).expect("extract");
        assert_eq!(
            got,
            json!({
                "current_session": {"percent_used": 42, "resets_in": "3 hr"},
                "weekly_limits": {"percent_used": null, "resets": "Thu"}
            })
        );
    }

    #[test]
    fn trailing_commas_inside_fence_are_repaired() {
        let reply = "```json\n{\"current_session\":{\"percent_used\":10,},}\n```";
        let got = extract_json(reply).expect("extract");
        assert_eq!(got, json!({"current_session": {"percent_used": 10}}));
    }

    #[test]
    fn reasoning_span_with_braces_is_discarded() {
        let reply = "<think>The header says {weird} and maybe {\"percent_used\": 99}</think>\n{\"current_session\":{\"percent_used\":7}}";
        let got = extract_json(reply).expect("extract");
        assert_eq!(got, json!({"current_session": {"percent_used": 7}}));
    }

    #[test]
    fn reasoning_tags_are_case_insensitive_and_multiline() {
        let reply = "<THINKING>\nstep one {\nstep two\n</Thinking>{\"ok\":true}";
        assert_eq!(strip_reasoning(reply), "{\"ok\":true}");
    }

    #[test]
    fn dangling_close_tag_drops_preceding_reasoning() {
        let reply = "let me look {at this}\n</think>\n{\"weekly_limits\":{\"percent_used\":55}}";
        let got = extract_json(reply).expect("extract");
        assert_eq!(got, json!({"weekly_limits": {"percent_used": 55}}));
    }

    #[test]
    fn first_fence_wins_when_several_are_present() {
        let reply = "```json\n{\"a\":1}\n```\n```json\n{\"a\":2}\n```";
        assert_eq!(extract_json(reply).expect("extract"), json!({"a": 1}));
    }

    #[test]
    fn non_json_fences_are_skipped() {
        let reply = "```python\nprint({'a': 1})\n```\n```json\n{\"a\":3}\n```";
        assert_eq!(first_json_fence(reply).map(str::trim), Some("{\"a\":3}"));
    }

    #[test]
    fn unlabeled_fence_is_accepted() {
        let reply = "```\n{\"a\":true}\n```";
        assert_eq!(extract_json(reply).expect("extract"), json!({"a": true}));
    }

    #[test]
    fn balanced_span_ignores_braces_in_strings() {
        let text = r#"prefix {"label":"}{ \"quoted\" }","n":1} suffix}"#;
        assert_eq!(
            balanced_span(text),
            Some(r#"{"label":"}{ \"quoted\" }","n":1}"#)
        );
    }

    #[test]
    fn unbalanced_object_has_no_span() {
        assert_eq!(balanced_span("{\"a\": {\"b\": 1}"), None);
    }

    #[test]
    fn prose_wrapped_object_is_found_by_brace_matching() {
        let reply = "The values are {\"current_session\": {\"percent_used\": 12, \"resets_in\": \"1 hr\"}} as shown.";
        let got = extract_json(reply).expect("extract");
        assert_eq!(got["current_session"]["percent_used"], json!(12));
    }

    #[test]
    fn whole_text_with_trailing_comma_in_array_is_repaired() {
        assert_eq!(
            strip_trailing_commas("{\"a\":[1,2,],\"b\":\"x, }\",}"),
            "{\"a\":[1,2],\"b\":\"x, }\"}"
        );
    }

    #[test]
    fn nulls_and_booleans_stay_native() {
        let got = extract_json("{\"a\":null,\"b\":false}").expect("extract");
        assert!(got["a"].is_null());
        assert_eq!(got["b"], json!(false));
    }

    #[test]
    fn empty_input_is_an_extraction_failure() {
        assert!(matches!(
            extract_json("   \n "),
            Err(QuotaError::Extraction { .. })
        ));
    }

    #[test]
    fn text_without_json_fails_and_keeps_raw_text() {
        let reply = "I could not read the screenshot, sorry.";
        match extract_json(reply) {
            Err(QuotaError::Extraction { raw }) => assert_eq!(raw, reply),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn scalar_json_is_not_an_object() {
        assert!(extract_json("42").is_err());
        assert!(extract_json("[1, 2]").is_err());
        assert!(extract_json("null").is_err());
    }
}
