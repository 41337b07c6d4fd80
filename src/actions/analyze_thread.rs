use super::add_company::CompanyAdder;
use super::memo::folder_name;
use super::name::ActionName;
use super::result::ActionResult;
use super::thread::{extract_domain, merge_messages, parse_thread, sort_timeline};
use super::traits::{Action, ActionRequest};
use crate::collaborators::traits::normalize_ledger_key;
use crate::collaborators::types::{DocumentContent, Relationship, ThreadMessage, TimelineEntry};
use crate::collaborators::{DocumentStore, RelationshipStore};
use crate::providers::Oracle;
use crate::router::{extract_json_object, str_field, string_list};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value, json};
use std::sync::Arc;

const TIMELINE_TITLE: &str = "Timeline";
const MAX_PROMPT_CHARS: usize = 15_000;
const ANALYSIS_TEMPERATURE: f64 = 0.2;
const SUMMARY_REPLY_CHARS: usize = 500;

#[derive(Debug, Default)]
struct ThreadAnalysis {
    company_name: Option<String>,
    introducer_name: Option<String>,
    introducer_email: Option<String>,
    introducer_context: Option<String>,
    contacts: Vec<String>,
    timeline: Vec<TimelineEntry>,
    summary: String,
    key_topics: Vec<String>,
    sentiment: String,
    next_steps: String,
}

fn text_or_list(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(_)) => string_list(map, key).join("; "),
        _ => String::new(),
    }
}

impl ThreadAnalysis {
    fn from_json(map: &Map<String, Value>) -> Self {
        let owned = |m: &Map<String, Value>, k: &str| str_field(m, k).map(str::to_string);
        let introducer = map.get("introducer").and_then(Value::as_object);

        let contacts = map
            .get("contacts")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(|c| {
                        let name = str_field(c, "name")?;
                        let mut line = format!("**{name}**");
                        if let Some(email) = str_field(c, "email") {
                            line.push_str(&format!(" ({email})"));
                        }
                        if let Some(role) = str_field(c, "role") {
                            line.push_str(&format!(" - {role}"));
                        }
                        Some(line)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let timeline = map
            .get("timeline")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(|t| {
                        Some(TimelineEntry {
                            date: str_field(t, "date").unwrap_or("Unknown date").to_string(),
                            event: str_field(t, "event")?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            company_name: owned(map, "company_name"),
            introducer_name: introducer.and_then(|i| owned(i, "name")),
            introducer_email: introducer.and_then(|i| owned(i, "email")),
            introducer_context: introducer.and_then(|i| owned(i, "context")),
            contacts,
            timeline,
            summary: text_or_list(map, "summary"),
            key_topics: string_list(map, "key_topics"),
            sentiment: text_or_list(map, "sentiment"),
            next_steps: text_or_list(map, "next_steps"),
        }
    }

    /// Used when the oracle reply has no JSON: one event per parsed message.
    fn from_messages(messages: &[ThreadMessage]) -> Self {
        Self {
            timeline: messages
                .iter()
                .map(|m| TimelineEntry {
                    date: m.date.clone(),
                    event: format!("{} ({})", m.subject, m.from),
                })
                .collect(),
            ..Self::default()
        }
    }

    fn render(&self, company: &str) -> DocumentContent {
        let or = |text: &str, fallback: &str| {
            if text.trim().is_empty() {
                fallback.to_string()
            } else {
                text.to_string()
            }
        };

        let introduction = match &self.introducer_name {
            Some(name) => {
                let mut text = format!("**{name}**");
                if let Some(email) = &self.introducer_email {
                    text.push_str(&format!(" ({email})"));
                }
                if let Some(context) = &self.introducer_context {
                    text.push('\n');
                    text.push_str(context);
                }
                text
            }
            None => "No introducer identified".to_string(),
        };
        let contacts = self
            .contacts
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n");

        DocumentContent::new(TIMELINE_TITLE)
            .section(None::<String>, format!("# Timeline: {company}"))
            .section(Some("Introduction"), introduction)
            .section(Some("Contacts"), or(&contacts, "No contacts identified"))
            .section(Some("Summary"), or(&self.summary, "No summary available"))
            .section(
                Some("Timeline"),
                or(&render_timeline(&self.timeline, "- "), "No timeline events identified"),
            )
            .section(Some("Key Topics"), or(&self.key_topics.join(", "), "None identified"))
            .section(Some("Sentiment"), or(&self.sentiment, "Neutral"))
            .section(Some("Next Steps"), or(&self.next_steps, "None identified"))
    }
}

fn render_timeline(entries: &[TimelineEntry], bullet: &str) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let marker = if bullet.is_empty() {
                format!("{}. ", i + 1)
            } else {
                bullet.to_string()
            };
            format!("{marker}**{}**: {}", e.date, e.event)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn analysis_prompt(domain: &str, messages: &[ThreadMessage]) -> String {
    let thread: String = messages
        .iter()
        .map(|m| {
            format!(
                "From: {}\nDate: {}\nSubject: {}\n\n{}",
                m.from, m.date, m.subject, m.body
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
        .chars()
        .take(MAX_PROMPT_CHARS)
        .collect();

    format!(
        "Analyze this email thread with {domain} and summarize the relationship.\n\n\
         EMAIL THREAD:\n{thread}\n\n\
         Reply with JSON only:\n\
         {{\n\
           \"company_name\": \"company name, inferred from the domain or emails\",\n\
           \"introducer\": {{\"name\": \"who made the introduction\", \"email\": \"their email\", \"context\": \"how and why\"}},\n\
           \"contacts\": [{{\"name\": \"...\", \"email\": \"...\", \"role\": \"...\"}}],\n\
           \"timeline\": [{{\"date\": \"YYYY-MM-DD\", \"event\": \"what happened\"}}],\n\
           \"summary\": \"2-3 paragraph relationship summary\",\n\
           \"key_topics\": [\"topic\"],\n\
           \"sentiment\": \"positive | neutral | negative\",\n\
           \"next_steps\": \"follow-ups needed\"\n\
         }}\n\n\
         Messages may be quoted newest-first. Give each timeline event the date of the message \
         it comes from, and watch for introductions (\"introducing you to\", \"wanted to connect you with\")."
    )
}

/// Builds or extends a relationship timeline from a forwarded thread.
pub struct AnalyzeThreadAction {
    relationships: Arc<dyn RelationshipStore>,
    documents: Arc<dyn DocumentStore>,
    adder: CompanyAdder,
    oracle: Oracle,
}

impl AnalyzeThreadAction {
    pub fn new(
        relationships: Arc<dyn RelationshipStore>,
        documents: Arc<dyn DocumentStore>,
        adder: CompanyAdder,
        oracle: Oracle,
    ) -> Self {
        Self {
            relationships,
            documents,
            adder,
            oracle,
        }
    }
}

#[async_trait]
impl Action for AnalyzeThreadAction {
    fn name(&self) -> ActionName {
        ActionName::AnalyzeThread
    }

    fn description(&self) -> &str {
        "Analyze a forwarded email thread to create a relationship timeline and summary. Use when email contains forwarded messages."
    }

    async fn execute(&self, request: &ActionRequest<'_>) -> anyhow::Result<ActionResult> {
        let Some(email) = request.email.filter(|e| !e.body.trim().is_empty()) else {
            return Ok(ActionResult::failure("No email body to analyze"));
        };

        let new_messages = parse_thread(&email.body);
        if new_messages.is_empty() {
            return Ok(ActionResult::failure(
                "Could not parse any emails from the forwarded thread",
            ));
        }
        let Some(domain) = extract_domain(&new_messages) else {
            return Ok(ActionResult::failure(
                "Could not determine the company domain from the email thread",
            ));
        };
        let key = normalize_ledger_key(&domain);

        let existing = self.relationships.get(&key).await?;
        let all_messages = match &existing {
            Some(rel) => merge_messages(&rel.messages, new_messages.clone()),
            None => new_messages.clone(),
        };
        let added = all_messages.len() - existing.as_ref().map_or(0, |r| r.messages.len());

        let reply = match self
            .oracle
            .generate_with(&analysis_prompt(&domain, &all_messages), ANALYSIS_TEMPERATURE)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                return Ok(ActionResult::failure(format!("Could not analyze the thread: {e:#}")));
            }
        };
        let mut analysis = match extract_json_object(&reply) {
            Some(map) => ThreadAnalysis::from_json(&map),
            None => {
                tracing::warn!(domain = %domain, "thread analysis was not JSON, using message headers");
                ThreadAnalysis::from_messages(&all_messages)
            }
        };
        sort_timeline(&mut analysis.timeline);

        let company = existing
            .as_ref()
            .map(|r| r.company_name.clone())
            .or_else(|| analysis.company_name.clone())
            .unwrap_or_else(|| domain.clone());

        let folder_id = self
            .documents
            .ensure_folder(&folder_name(&company, &domain))
            .await?;
        if existing.is_none()
            && let Err(e) = self.adder.add(&company, &domain, "thread").await
        {
            tracing::warn!(company = %company, "could not add company to the sheet: {e:#}");
        }

        let document_id = match existing.as_ref().and_then(|r| r.document_id.clone()) {
            Some(id) => id,
            None => {
                self.documents
                    .create_document(&folder_id, TIMELINE_TITLE)
                    .await?
            }
        };
        self.documents
            .write_content(&document_id, &analysis.render(&company))
            .await?;

        self.relationships
            .upsert(&Relationship {
                key: key.clone(),
                company_name: company.clone(),
                domain: domain.clone(),
                messages: all_messages.clone(),
                timeline: analysis.timeline.clone(),
                summary: analysis.summary.clone(),
                document_id: Some(document_id.clone()),
                updated_at: Utc::now(),
            })
            .await?;

        tracing::info!(domain = %domain, messages = all_messages.len(), "thread analyzed");

        let timeline: Vec<Value> = analysis
            .timeline
            .iter()
            .map(|e| json!({"date": e.date, "event": e.event}))
            .collect();
        let mut result = ActionResult::ok()
            .with("company", company)
            .with("domain", domain)
            .with("message_count", all_messages.len())
            .with("new_messages", added)
            .with("updated", existing.is_some())
            .with("summary", analysis.summary)
            .with("timeline", timeline)
            .with("document_url", self.documents.document_url(&document_id));
        if let Some(name) = analysis.introducer_name {
            result = result.with("introducer", name);
        }
        if let Some(context) = analysis.introducer_context {
            result = result.with("introducer_context", context);
        }
        Ok(result)
    }

    fn format_response(&self, result: &ActionResult) -> String {
        if !result.success {
            return format!("Failed to analyze thread: {}", result.error_text());
        }

        let updated = result.flag("updated");
        let mut reply = format!(
            "{}\n\n**Company:** {}\n**Domain:** {}\n",
            if updated { "Timeline updated!" } else { "Timeline created!" },
            result.text("company").unwrap_or("(unknown)"),
            result.text("domain").unwrap_or("(unknown)"),
        );
        if updated {
            reply.push_str(&format!(
                "**Total messages:** {} (+{} new)",
                result.count("message_count"),
                result.count("new_messages")
            ));
        } else {
            reply.push_str(&format!(
                "**Messages analyzed:** {}",
                result.count("message_count")
            ));
        }
        if let Some(name) = result.text("introducer") {
            reply.push_str(&format!("\n**Introduced by:** {name}"));
            if let Some(context) = result.text("introducer_context") {
                reply.push_str(&format!(" ({context})"));
            }
        }

        let timeline: Vec<TimelineEntry> = result
            .list("timeline")
            .into_iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect();
        if !timeline.is_empty() {
            reply.push_str("\n\n**Timeline:**\n");
            reply.push_str(&render_timeline(&timeline, ""));
        }

        if let Some(summary) = result.text("summary") {
            let mut short: String = summary.chars().take(SUMMARY_REPLY_CHARS).collect();
            if short.len() < summary.len() {
                short.push_str("...");
            }
            reply.push_str(&format!("\n\n**Summary:**\n{short}"));
        }
        if let Some(url) = result.text("document_url") {
            reply.push_str(&format!("\n\n**Full timeline:** {url}"));
        }
        reply.push_str("\n\nForward more threads to add to this relationship history.");
        reply
    }
}
