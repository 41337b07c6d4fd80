//! Best-effort recovery of a JSON object from model output.

use serde_json::{Map, Value};

/// Find the first JSON object in `text`.
///
/// Tries, in order: the whole text, the contents of a ``` fence, then the
/// first balanced `{...}` span (string-aware) that parses.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let trimmed = text.trim();
    if let Some(obj) = parse_object(trimmed) {
        return Some(obj);
    }

    if let Some(fenced) = fenced_block(trimmed)
        && let Some(obj) = parse_object(fenced)
    {
        return Some(obj);
    }

    let mut from = 0;
    while let Some(rel) = trimmed[from..].find('{') {
        let start = from + rel;
        if let Some(end) = balanced_end(&trimmed[start..])
            && let Some(obj) = parse_object(&trimmed[start..start + end])
        {
            return Some(obj);
        }
        from = start + 1;
    }
    None
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    // Skip an info string such as `json`.
    let body_start = after_open.find('\n').map_or(0, |i| i + 1);
    let body = &after_open[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

/// Byte length of the balanced object starting at `text[0] == '{'`.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Read a string field, treating blanks as absent.
pub fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Read a list of strings, skipping non-string entries.
pub fn string_list(map: &Map<String, Value>, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}
