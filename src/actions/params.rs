//! Parameter access and domain handling shared by the actions.

use serde_json::{Map, Value};

pub type Parameters = Map<String, Value>;

/// Lowercase, trim, drop scheme, `www.`, port, path and query.
/// Returns `None` when what remains does not look like a domain.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let raw = raw.trim().trim_end_matches('.');
    if raw.is_empty() || raw.contains('@') {
        return None;
    }

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let parsed = url::Url::parse(&with_scheme).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    looks_like_domain(host).then(|| host.to_string())
}

fn looks_like_domain(host: &str) -> bool {
    let Some((_, tld)) = host.rsplit_once('.') else {
        return false;
    };
    tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
        && host
            .split('.')
            .all(|label| !label.is_empty() && !label.starts_with('-') && !label.ends_with('-'))
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

/// First domain-looking token in free text, normalized. Email addresses are skipped.
pub fn find_domain_in_text(text: &str) -> Option<String> {
    text.split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '(' | ')' | '<' | '>' | '"' | '\'' | '[' | ']'))
        .map(|token| token.trim_matches(|c: char| matches!(c, '.' | ':' | '!' | '?')))
        .filter(|token| token.contains('.') && !token.contains('@'))
        .find_map(normalize_domain)
}

/// A trimmed, non-empty string parameter. Numbers are stringified.
pub fn param_str(params: &Parameters, key: &str) -> Option<String> {
    match params.get(key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Boolean parameter; accepts JSON booleans and the usual string spellings.
pub fn param_bool(params: &Parameters, key: &str, default: bool) -> bool {
    match params.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "y" => true,
            "false" | "no" | "0" | "n" => false,
            _ => default,
        },
        Some(Value::Number(n)) => n.as_u64().map_or(default, |v| v != 0),
        _ => default,
    }
}

pub fn param_u64(params: &Parameters, key: &str) -> Option<u64> {
    match params.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: serde_json::Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn normalize_strips_scheme_www_and_path() {
        assert_eq!(normalize_domain("https://www.Acme.com/about?x=1").as_deref(), Some("acme.com"));
        assert_eq!(normalize_domain("  ACME.com  ").as_deref(), Some("acme.com"));
        assert_eq!(normalize_domain("acme.com/").as_deref(), Some("acme.com"));
        assert_eq!(normalize_domain("app.acme.co.uk").as_deref(), Some("app.acme.co.uk"));
    }

    #[test]
    fn normalize_rejects_non_domains() {
        assert!(normalize_domain("Acme Inc").is_none());
        assert!(normalize_domain("acme").is_none());
        assert!(normalize_domain("nick@acme.com").is_none());
        assert!(normalize_domain("192.168.0.1").is_none());
        assert!(normalize_domain("").is_none());
    }

    #[test]
    fn finds_domain_in_prose() {
        assert_eq!(
            find_domain_in_text("Add Acme Inc (acme.com)").as_deref(),
            Some("acme.com")
        );
        assert_eq!(
            find_domain_in_text("Actually the domain is https://www.globex.io/.").as_deref(),
            Some("globex.io")
        );
        assert!(find_domain_in_text("ping me at nick@friale.com. Thanks.").is_none());
    }

    #[test]
    fn param_accessors() {
        let p = params(json!({
            "company": "  Acme  ",
            "blank": " ",
            "force": "yes",
            "pages": "3",
            "days": 30
        }));
        assert_eq!(param_str(&p, "company").as_deref(), Some("Acme"));
        assert!(param_str(&p, "blank").is_none());
        assert!(param_bool(&p, "force", false));
        assert!(!param_bool(&p, "missing", false));
        assert_eq!(param_u64(&p, "pages"), Some(3));
        assert_eq!(param_u64(&p, "days"), Some(30));
    }
}
