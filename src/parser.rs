//! Extraction of the location payload from free-form model output.
//!
//! The backend cannot enforce an output schema while grounding tools are
//! active, so the reply is treated as untrusted text. [`parse`] looks for a
//! ```` ```json ```` fence first and otherwise scans for top-level balanced
//! `{...}` spans, accepting the first one that parses and looks like a
//! location payload. Whatever parses is mapped leniently into
//! [`LocationData`]; missing fields render as gaps rather than failing the
//! whole lookup.

use crate::models::LocationData;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no JSON object found in response")]
    NoJsonFound,

    /// `candidate` is the text that was handed to the JSON parser.
    #[error("malformed JSON payload: {reason}")]
    MalformedJson { reason: String, candidate: String },
}

impl ParseError {
    fn malformed(reason: impl Into<String>, candidate: &str) -> Self {
        Self::MalformedJson {
            reason: reason.into(),
            candidate: candidate.to_string(),
        }
    }
}

/// Parses a raw model reply into [`LocationData`].
///
/// A tagged fence is authoritative: if one is present its interior is the
/// only candidate. Without a fence, every top-level balanced span is tried in
/// order and the first object carrying one of
/// [`LocationData::RECOGNIZED_FIELDS`] wins, so a complete object followed by
/// a stray unmatched `{` still succeeds.
///
/// The recognized-field check only applies to unfenced spans, where it tells
/// the payload apart from incidental braces in prose. A fenced object is
/// taken as the payload even when empty, so ```` ```json {} ``` ```` yields an
/// all-empty record while a bare `{}` is rejected as `MalformedJson` with
/// reason "object carries no location fields".
pub fn parse(raw: &str) -> Result<LocationData, ParseError> {
    if let Some(candidate) = fenced_json(raw) {
        debug!("Found fenced JSON block ({} bytes)", candidate.len());
        let value: Value = serde_json::from_str(candidate)
            .map_err(|e| ParseError::malformed(e.to_string(), candidate))?;
        return match value.as_object() {
            Some(obj) => Ok(LocationData::from_object(obj)),
            None => Err(ParseError::malformed("payload is not a JSON object", candidate)),
        };
    }

    let Some(first_brace) = raw.find('{') else {
        return Err(ParseError::NoJsonFound);
    };

    let spans = balanced_spans(raw);
    debug!("No fence, scanning {} balanced span(s)", spans.len());

    let mut last_failure = None;
    for span in &spans {
        match serde_json::from_str::<Value>(span) {
            Ok(Value::Object(obj)) if LocationData::has_recognized_field(&obj) => {
                return Ok(LocationData::from_object(&obj));
            }
            Ok(_) => {
                last_failure.get_or_insert_with(|| {
                    ParseError::malformed("object carries no location fields", span)
                });
            }
            Err(e) => last_failure = Some(ParseError::malformed(e.to_string(), span)),
        }
    }

    Err(last_failure
        .unwrap_or_else(|| ParseError::malformed("unbalanced braces", &raw[first_brace..])))
}

/// Interior of the first ```` ```json ```` fence that has a closing fence.
fn fenced_json(raw: &str) -> Option<&str> {
    let mut offset = 0;
    while let Some(pos) = raw[offset..].find(FENCE) {
        let tag_start = offset + pos + FENCE.len();
        let rest = &raw[tag_start..];
        let tagged = rest
            .as_bytes()
            .get(..4)
            .is_some_and(|tag| tag.eq_ignore_ascii_case(b"json"))
            && !rest
                .as_bytes()
                .get(4)
                .is_some_and(|b| b.is_ascii_alphanumeric());

        if tagged {
            let body_start = tag_start + 4;
            return raw[body_start..]
                .find(FENCE)
                .map(|end| raw[body_start..body_start + end].trim());
        }
        offset = tag_start;
    }
    None
}

/// Every top-level balanced `{...}` span, in order of appearance.
///
/// Single pass over the text keeping a stack of open brace offsets. Braces
/// inside JSON string literals are ignored. A closed span counts as top-level
/// when every brace enclosing it is still open at the end of the text, so
/// stray unmatched braces in prose don't swallow a later complete object.
fn balanced_spans(raw: &str) -> Vec<&str> {
    // (start, end, innermost enclosing open brace at close time)
    let mut closed: Vec<(usize, usize, Option<usize>)> = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in raw.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if !open.is_empty() => in_string = true,
            '{' => open.push(i),
            '}' => {
                if let Some(start) = open.pop() {
                    closed.push((start, i + 1, open.last().copied()));
                }
            }
            _ => {}
        }
    }

    // Whatever is left on the stack was never closed.
    closed
        .into_iter()
        .filter(|(_, _, parent)| parent.map_or(true, |p| open.binary_search(&p).is_ok()))
        .map(|(start, end, _)| &raw[start..end])
        .collect()
}
