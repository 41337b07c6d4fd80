//! Forwarded-thread parsing for `ANALYZE_THREAD`.

use crate::collaborators::types::{ThreadMessage, TimelineEntry};
use crate::router::extract_address;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashSet};

const MAX_BODY_CHARS: usize = 2000;
const UNKNOWN: &str = "Unknown";

/// Sender domains that never identify a company.
const FREEMAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "googlemail.com",
    "icloud.com",
    "me.com",
    "friale.com",
    "aol.com",
    "protonmail.com",
    "mail.com",
    "live.com",
    "msn.com",
];

/// `---------- Forwarded message ---------` in its usual client variants.
pub fn is_forward_delimiter(line: &str) -> bool {
    let line = line.trim();
    let lower = line.to_lowercase();
    if lower.starts_with("begin forwarded message") {
        return true;
    }
    let leading = line.chars().take_while(|c| *c == '-').count();
    let trailing = line.chars().rev().take_while(|c| *c == '-').count();
    leading >= 5 && trailing >= 5 && lower.contains("forwarded message")
}

fn strip_quote(line: &str) -> &str {
    let mut rest = line.trim_start();
    while let Some(stripped) = rest.strip_prefix('>') {
        rest = stripped.trim_start();
    }
    rest
}

fn header_value<'a>(line: &'a str, names: &[&str]) -> Option<&'a str> {
    let (name, value) = line.split_once(':')?;
    names
        .iter()
        .any(|n| name.trim().eq_ignore_ascii_case(n))
        .then_some(value.trim())
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[derive(Default)]
struct Draft {
    from: String,
    date: String,
    subject: String,
    body: Vec<String>,
    in_headers: bool,
}

impl Draft {
    fn finish(self) -> Option<ThreadMessage> {
        let body = self.body.join("\n").trim().to_string();
        if self.from.is_empty() && body.is_empty() {
            return None;
        }
        let or_unknown = |s: String| if s.is_empty() { UNKNOWN.to_string() } else { s };
        Some(ThreadMessage {
            from: or_unknown(self.from),
            date: or_unknown(self.date),
            subject: or_unknown(self.subject),
            body: truncate_chars(&body, MAX_BODY_CHARS),
        })
    }
}

fn messages_in_part(part: &[&str]) -> Vec<ThreadMessage> {
    let mut messages = Vec::new();
    let mut current: Option<Draft> = None;

    for raw in part {
        let line = strip_quote(raw);

        if let Some(from) = header_value(line, &["From"]) {
            if let Some(done) = current.take().and_then(Draft::finish) {
                messages.push(done);
            }
            current = Some(Draft {
                from: from.to_string(),
                in_headers: true,
                ..Draft::default()
            });
            continue;
        }

        let Some(draft) = current.as_mut() else {
            continue;
        };

        if draft.in_headers {
            if let Some(date) = header_value(line, &["Date", "Sent"]) {
                draft.date = date.to_string();
                continue;
            }
            if let Some(subject) = header_value(line, &["Subject"]) {
                draft.subject = subject.to_string();
                continue;
            }
            if header_value(line, &["To", "Cc", "Bcc", "Reply-To"]).is_some() {
                continue;
            }
            draft.in_headers = false;
            if line.is_empty() {
                continue;
            }
        }
        draft.body.push(line.to_string());
    }

    if let Some(done) = current.and_then(Draft::finish) {
        messages.push(done);
    }
    messages
}

/// Split a forwarded body into individual messages, in text order.
///
/// Re-forwarded copies of the same message are merged away. A body without
/// recognizable headers becomes a single `Unknown` message.
pub fn parse_thread(body: &str) -> Vec<ThreadMessage> {
    let mut parts: Vec<Vec<&str>> = vec![Vec::new()];
    for line in body.lines() {
        if is_forward_delimiter(strip_quote(line)) {
            parts.push(Vec::new());
        } else if let Some(part) = parts.last_mut() {
            part.push(line);
        }
    }

    let parsed: Vec<ThreadMessage> = parts.iter().flat_map(|p| messages_in_part(p)).collect();
    if parsed.is_empty() && !body.trim().is_empty() {
        return vec![ThreadMessage {
            from: UNKNOWN.into(),
            date: UNKNOWN.into(),
            subject: UNKNOWN.into(),
            body: truncate_chars(body.trim(), MAX_BODY_CHARS),
        }];
    }
    merge_messages(&[], parsed)
}

/// Existing messages first, then new ones whose signature is not yet present.
pub fn merge_messages(existing: &[ThreadMessage], new: Vec<ThreadMessage>) -> Vec<ThreadMessage> {
    let mut seen: HashSet<String> = existing.iter().map(ThreadMessage::signature).collect();
    let mut merged = existing.to_vec();
    for message in new {
        if seen.insert(message.signature()) {
            merged.push(message);
        }
    }
    merged
}

/// Most common non-freemail sender domain; ties go to the first seen.
pub fn extract_domain(messages: &[ThreadMessage]) -> Option<String> {
    let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for (order, message) in messages.iter().enumerate() {
        let Some(domain) = extract_address(&message.from)
            .and_then(|a| a.rsplit_once('@').map(|(_, d)| d.to_string()))
        else {
            continue;
        };
        if FREEMAIL_DOMAINS.contains(&domain.as_str()) {
            continue;
        }
        counts.entry(domain).or_insert((0, order)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, oa)), (_, (cb, ob))| ca.cmp(cb).then(ob.cmp(oa)))
        .map(|(domain, _)| domain)
}

/// Best-effort date parse for timeline ordering. Accepts RFC 2822, RFC 3339,
/// `YYYY-MM-DD`, `Mar 3, 2025` and Gmail's `Mon, Mar 3, 2025 at 10:00 AM`.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M") {
        return Some(dt);
    }

    let (day_part, time_part) = match raw.split_once(" at ") {
        Some((d, t)) => (d.trim(), Some(t.trim())),
        None => (raw, None),
    };
    let day_part = day_part.trim_end_matches(',');

    let date = ["%Y-%m-%d", "%a, %b %d, %Y", "%b %d, %Y", "%B %d, %Y", "%d %b %Y", "%d %B %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day_part, fmt).ok())?;

    let time = time_part
        .and_then(|t| chrono::NaiveTime::parse_from_str(t, "%I:%M %p").ok())
        .unwrap_or_default();
    Some(date.and_time(time))
}

/// Chronological order; entries with unparseable dates keep their relative
/// order after the dated ones.
pub fn sort_timeline(entries: &mut [TimelineEntry]) {
    entries.sort_by_cached_key(|entry| {
        let date = parse_date(&entry.date);
        (date.is_none(), date)
    });
}
