use std::borrow::Cow;

const MAX_API_ERROR_CHARS: usize = 200;
const REDACTED: &str = "[REDACTED]";

/// Token prefixes that identify a credential on their own.
const TOKEN_PREFIXES: [&str; 6] = ["sk-", "ya29.", "AIza", "1//", "ghp_", "hf_"];

/// Markers whose following token is a credential.
const VALUE_MARKERS: [&str; 9] = [
    "Bearer ",
    "bearer ",
    "key=",
    "api_key=",
    "access_token=",
    "refresh_token=",
    "\"access_token\":\"",
    "\"api_key\":\"",
    "_sso.key=",
];

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+' | '/' | '=' | '%')
}

fn redact_after(text: &mut String, marker: &str, keep_marker: bool) {
    let mut from = 0;
    while let Some(rel) = text[from..].find(marker) {
        let start = from + rel;
        let value_start = start + marker.len();
        let value_end = text[value_start..]
            .char_indices()
            .find(|(_, c)| !is_token_char(*c))
            .map_or(text.len(), |(i, _)| value_start + i);

        if value_end == value_start {
            from = value_start;
            continue;
        }

        let replace_from = if keep_marker { value_start } else { start };
        text.replace_range(replace_from..value_end, REDACTED);
        from = replace_from + REDACTED.len();
    }
}

/// Redact API keys, OAuth tokens and session cookies from error text before
/// it reaches logs or reply bodies.
pub fn scrub_secret_patterns(input: &str) -> Cow<'_, str> {
    let suspicious = TOKEN_PREFIXES
        .iter()
        .chain(VALUE_MARKERS.iter())
        .any(|pattern| input.contains(pattern));
    if !suspicious {
        return Cow::Borrowed(input);
    }

    let mut scrubbed = input.to_string();
    for prefix in TOKEN_PREFIXES {
        redact_after(&mut scrubbed, prefix, false);
    }
    for marker in VALUE_MARKERS {
        redact_after(&mut scrubbed, marker, true);
    }
    Cow::Owned(scrubbed)
}

/// Scrub secrets and cap length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);
    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed.into_owned();
    }

    let truncated: String = scrubbed.chars().take(MAX_API_ERROR_CHARS).collect();
    format!("{truncated}...")
}

/// Read a failed response body and turn it into a sanitized `(status, message)` pair.
pub async fn read_error_body(response: reqwest::Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());
    (status, sanitize_api_error(&body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_is_borrowed() {
        let out = scrub_secret_patterns("quota exceeded for project");
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn redacts_google_api_key_in_url() {
        let out = scrub_secret_patterns(
            "error sending request for url (https://x/v1beta/models/m:generateContent?key=AIzaSyD-secret)",
        );
        assert!(!out.contains("AIzaSyD-secret"));
        assert!(out.contains("key=[REDACTED]"));
    }

    #[test]
    fn redacts_bearer_and_oauth_tokens() {
        let out = scrub_secret_patterns("Authorization: Bearer ya29.a0Af-token rejected");
        assert!(!out.contains("a0Af-token"));
        assert!(out.contains("rejected"));
    }

    #[test]
    fn redacts_bookface_cookie() {
        let out = scrub_secret_patterns("cookie _sso.key=abc123def; path=/");
        assert_eq!(out, "cookie _sso.key=[REDACTED]; path=/");
    }

    #[test]
    fn sanitize_truncates_long_bodies() {
        let long = "x".repeat(500);
        let out = sanitize_api_error(&long);
        assert_eq!(out.chars().count(), MAX_API_ERROR_CHARS + 3);
        assert!(out.ends_with("..."));
    }
}
