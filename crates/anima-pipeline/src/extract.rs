//! Action extraction from free-form model output.
//!
//! A reply may interleave prose with structured action blocks: fenced code
//! blocks whose body is JSON, or bare JSON objects embedded mid-sentence.
//! The extractor recognizes both, tolerates malformed fragments (dropped
//! with a diagnostic), and normalizes the field-name variants it owns. It
//! performs no schema validation.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::types::{ActionRequest, MessageOrigin, Payload};

/// Key variants accepted for the action type name.
const ACTION_KEYS: &[&str] = &["action", "action_type", "type"];
/// Key variants accepted for the target interface.
const INTERFACE_KEYS: &[&str] = &["interface", "transport", "channel"];
/// Key variants accepted for a nested payload object.
const PAYLOAD_KEYS: &[&str] = &["payload", "params", "args", "data"];
/// Key variants accepted for scheduled-event provenance.
const EVENT_KEYS: &[&str] = &["event_id", "scheduled_event_id"];

static FENCED_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|action)?[ \t]*\n(.*?)```").expect("Invalid fence regex")
});

/// One dropped fragment and why it was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractDiagnostic {
    pub snippet: String,
    pub reason: String,
}

/// Everything extracted from one block of model output.
#[derive(Debug, Default)]
pub struct Extraction {
    pub requests: Vec<ActionRequest>,
    pub diagnostics: Vec<ExtractDiagnostic>,
}

/// Scans model output for structured action requests.
pub struct ActionExtractor;

impl ActionExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract zero, one, or many action requests from one reply, in the
    /// order the model produced them.
    pub fn extract(&self, text: &str, origin: Option<&MessageOrigin>) -> Extraction {
        let mut extraction = Extraction::default();
        // (document offset, candidate value, from a fenced block)
        let mut candidates: Vec<(usize, Value, bool)> = Vec::new();
        let mut masked = text.to_string();

        for captures in FENCED_BLOCK_RE.captures_iter(text) {
            let whole = captures.get(0).expect("capture 0 always present");
            let body = captures.get(1).map(|m| m.as_str()).unwrap_or("");

            match serde_json::from_str::<Value>(body.trim()) {
                Ok(Value::Array(items)) => {
                    for item in items {
                        candidates.push((whole.start(), item, true));
                    }
                }
                Ok(value) => candidates.push((whole.start(), value, true)),
                Err(e) => extraction.diagnostics.push(diagnostic(body, format!("invalid JSON: {}", e))),
            }

            // Blank the fenced region so the bare-object scan below does not
            // see it a second time.
            masked.replace_range(whole.range(), &" ".repeat(whole.range().len()));
        }

        // Bare JSON objects among prose. Parse failures here are ordinary
        // prose braces and stay silent; only objects that parse AND carry an
        // action key count.
        for (offset, fragment) in balanced_objects(&masked) {
            if let Ok(value) = serde_json::from_str::<Value>(fragment) {
                if value
                    .as_object()
                    .is_some_and(|obj| ACTION_KEYS.iter().any(|k| obj.contains_key(*k)))
                {
                    candidates.push((offset, value, false));
                }
            }
        }

        candidates.sort_by_key(|(offset, _, _)| *offset);

        for (_, value, fenced) in candidates {
            match normalize(value, origin) {
                Ok(request) => extraction.requests.push(request),
                Err((snippet, reason)) => {
                    // Bare fragments without an action key never reach here;
                    // a fenced block was explicit structure, so its defects
                    // are worth a diagnostic.
                    if fenced {
                        extraction.diagnostics.push(diagnostic(&snippet, reason));
                    }
                }
            }
        }

        for diag in &extraction.diagnostics {
            warn!(reason = %diag.reason, snippet = %diag.snippet, "Dropped malformed action fragment");
        }

        extraction
    }
}

impl Default for ActionExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn one parsed candidate into an action request, normalizing the key
/// variants the extractor owns. Errors carry (snippet, reason).
fn normalize(
    value: Value,
    origin: Option<&MessageOrigin>,
) -> Result<ActionRequest, (String, String)> {
    let snippet = || truncate(&value.to_string(), 120);

    let Value::Object(mut obj) = value.clone() else {
        return Err((snippet(), "not a JSON object".to_string()));
    };

    let action = take_string(&mut obj, ACTION_KEYS)
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| (snippet(), "missing action name".to_string()))?;

    let interface = take_string(&mut obj, INTERFACE_KEYS).filter(|i| !i.trim().is_empty());

    let mut payload = Payload::new();
    for key in PAYLOAD_KEYS {
        if let Some(Value::Object(_)) = obj.get(*key) {
            if let Some(Value::Object(map)) = obj.remove(*key) {
                payload = map;
            }
            break;
        }
    }

    let mut event_id = None;
    for key in EVENT_KEYS {
        if let Some(Value::String(raw)) = obj.get(*key) {
            if let Ok(id) = Uuid::parse_str(raw) {
                event_id = Some(id);
                obj.remove(*key);
                break;
            }
        }
    }

    // Remaining top-level keys fold into the payload without clobbering
    // anything the nested payload already set.
    for (key, val) in obj {
        payload.entry(key).or_insert(val);
    }

    let mut request = ActionRequest::new(action);
    request.interface = interface;
    request.payload = payload;
    request.event_id = event_id;
    request.origin = origin.cloned();
    Ok(request)
}

/// First present key among `keys` holding a string, removed from the map.
fn take_string(obj: &mut serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(Value::String(_)) = obj.get(*key) {
            if let Some(Value::String(s)) = obj.remove(*key) {
                return Some(s);
            }
        }
    }
    None
}

/// Top-level brace-balanced `{...}` spans, string- and escape-aware.
fn balanced_objects(text: &str) -> Vec<(usize, &str)> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' if depth > 0 => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        spans.push((start, &text[start..=i]));
                    }
                }
            }
            _ => {}
        }
    }
    spans
}

fn diagnostic(snippet: &str, reason: String) -> ExtractDiagnostic {
    ExtractDiagnostic {
        snippet: truncate(snippet.trim(), 120),
        reason,
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &s[..cut])
    }
}
