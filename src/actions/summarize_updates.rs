use super::memo::folder_name;
use super::name::ActionName;
use super::params::{normalize_domain, param_str, param_u64};
use super::result::ActionResult;
use super::traits::{Action, ActionRequest};
use crate::collaborators::types::{DocumentContent, UpdateEmail};
use crate::collaborators::{DocumentStore, SheetSource, UpdatesSource};
use crate::providers::Oracle;
use crate::router::{extract_json_object, str_field, string_list};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::sync::Arc;

const SUMMARY_TITLE: &str = "Updates Summary";
const DEFAULT_DAYS: u64 = 365;
const MAX_EMAILS: usize = 100;
const MAX_BODY_CHARS: usize = 3000;
const MAX_PROMPT_CHARS: usize = 30_000;
const MAX_HIGHLIGHTS: usize = 5;
const SUMMARY_REPLY_CHARS: usize = 600;

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn date_label(email: &UpdateEmail) -> String {
    email
        .date
        .map_or_else(|| "Unknown".to_string(), |d| d.format("%Y-%m-%d").to_string())
}

fn summary_prompt(company: &str, domain: &str, newest_first: &[&UpdateEmail]) -> String {
    let sections: String = newest_first
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let label = match i {
                0 => "[MOST RECENT] ",
                1..=4 => "[RECENT] ",
                _ => "",
            };
            format!(
                "{label}Date: {}\nSubject: {}\n\n{}",
                date_label(e),
                e.subject,
                truncate(&e.body, MAX_BODY_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!(
        "Summarize these {} update emails from {company} ({domain}). The most recent email \
         reflects the current state; weigh recent information over old.\n\n\
         EMAILS (most recent first):\n{}\n\n\
         Reply with JSON only:\n\
         {{\"summary\": \"2-3 paragraph executive summary\", \
         \"current_status\": \"where the company stands now\", \
         \"highlights\": [\"...\"], \"themes\": [\"...\"], \
         \"sentiment\": \"positive | neutral | negative | mixed\", \
         \"trajectory\": \"growing | stable | declining | unclear\"}}",
        newest_first.len(),
        truncate(&sections, MAX_PROMPT_CHARS)
    )
}

/// Digest of a company's update emails over a time window.
pub struct SummarizeUpdatesAction {
    sheet: Arc<dyn SheetSource>,
    updates: Arc<dyn UpdatesSource>,
    documents: Arc<dyn DocumentStore>,
    oracle: Oracle,
}

impl SummarizeUpdatesAction {
    pub fn new(
        sheet: Arc<dyn SheetSource>,
        updates: Arc<dyn UpdatesSource>,
        documents: Arc<dyn DocumentStore>,
        oracle: Oracle,
    ) -> Self {
        Self {
            sheet,
            updates,
            documents,
            oracle,
        }
    }

    /// Domain from the parameter, else the sheet row, else `{company}.com`.
    async fn resolve(&self, company: Option<&str>, domain: Option<&str>) -> (String, String) {
        if let Some(domain) = domain.and_then(normalize_domain) {
            let company = company.map_or_else(|| domain.clone(), str::to_string);
            return (company, domain);
        }
        let company = company.unwrap_or_default();
        match self.sheet.find_row(company).await {
            Ok(Some(row)) => {
                if let Some(domain) = normalize_domain(&row.domain) {
                    return (row.company, domain);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("sheet lookup failed, guessing domain: {e:#}"),
        }
        let guessed = format!("{}.com", company.to_lowercase().replace(' ', ""));
        (company.to_string(), guessed)
    }
}

#[async_trait]
impl Action for SummarizeUpdatesAction {
    fn name(&self) -> ActionName {
        ActionName::SummarizeUpdates
    }

    fn description(&self) -> &str {
        "Summarize update emails from a company. Use when asked \"how is [company] doing?\" or for a summary of a company's updates."
    }

    fn parameter_hint(&self) -> Option<&str> {
        Some(r#"{"company": "Company Name", "domain": "company.com (optional)", "days": 365}"#)
    }

    async fn execute(&self, request: &ActionRequest<'_>) -> anyhow::Result<ActionResult> {
        let company = param_str(request.parameters, "company");
        let domain = param_str(request.parameters, "domain");
        if company.is_none() && domain.is_none() {
            return Ok(ActionResult::failure("Missing company name or domain"));
        }
        if company.is_none()
            && let Some(raw) = domain.as_deref().filter(|d| normalize_domain(d).is_none())
        {
            return Ok(ActionResult::failure(format!("'{raw}' does not look like a domain")));
        }
        let days = param_u64(request.parameters, "days").unwrap_or(DEFAULT_DAYS);

        let (company, domain) = self.resolve(company.as_deref(), domain.as_deref()).await;
        let days_i64 = i64::try_from(days).unwrap_or(i64::MAX).min(36_500);
        let since = Utc::now() - Duration::days(days_i64);

        let mut emails = match self.updates.fetch_updates(&domain, since, MAX_EMAILS).await {
            Ok(emails) => emails,
            Err(e) => {
                return Ok(ActionResult::failure(format!(
                    "Could not fetch update emails: {e:#}"
                )));
            }
        };

        let base = ActionResult::ok()
            .with("company", company.as_str())
            .with("domain", domain.as_str())
            .with("days", days)
            .with("email_count", emails.len());
        if emails.is_empty() {
            return Ok(base);
        }

        emails.sort_by_key(|e| e.date);
        let first = date_label(&emails[0]);
        let last = date_label(&emails[emails.len() - 1]);
        let newest_first: Vec<&UpdateEmail> = emails.iter().rev().collect();

        let reply = match self
            .oracle
            .generate_with(&summary_prompt(&company, &domain, &newest_first), 0.2)
            .await
        {
            Ok(reply) => reply,
            Err(e) => return Ok(ActionResult::failure(format!("Could not summarize updates: {e:#}"))),
        };
        let digest = extract_json_object(&reply);
        let field = |key: &str| {
            digest
                .as_ref()
                .and_then(|d| str_field(d, key))
                .unwrap_or_default()
                .to_string()
        };
        let list = |key: &str| {
            digest
                .as_ref()
                .map(|d| string_list(d, key))
                .unwrap_or_default()
        };

        let summary = if digest.is_some() {
            field("summary")
        } else {
            reply.trim().to_string()
        };
        let highlights = list("highlights");
        let sentiment = field("sentiment");
        let trajectory = field("trajectory");

        let or_none = |text: String| {
            if text.is_empty() {
                "None identified".to_string()
            } else {
                text
            }
        };
        let bullets = |items: &[String]| {
            if items.is_empty() {
                "None identified".to_string()
            } else {
                items.iter().map(|h| format!("- {h}")).collect::<Vec<_>>().join("\n")
            }
        };
        let content = DocumentContent::new(SUMMARY_TITLE)
            .section(None::<String>, format!("# Updates Summary: {company}"))
            .section(
                Some("Overview"),
                format!(
                    "- **Domain:** {domain}\n- **Emails Analyzed:** {}\n- **Date Range:** {first} to {last}\n\
                     - **Overall Sentiment:** {}\n- **Trajectory:** {}",
                    emails.len(),
                    if sentiment.is_empty() { "Unknown" } else { sentiment.as_str() },
                    if trajectory.is_empty() { "Unknown" } else { trajectory.as_str() },
                ),
            )
            .section(Some("Current Status"), or_none(field("current_status")))
            .section(Some("Executive Summary"), summary.clone())
            .section(Some("Highlights"), bullets(&highlights))
            .section(Some("Themes"), bullets(&list("themes")));

        let folder_id = self
            .documents
            .ensure_folder(&folder_name(&company, &domain))
            .await?;
        let document_id = self
            .documents
            .create_document(&folder_id, SUMMARY_TITLE)
            .await?;
        self.documents.write_content(&document_id, &content).await?;

        tracing::info!(company = %company, emails = emails.len(), "updates summarized");
        Ok(base
            .with("first_date", first)
            .with("last_date", last)
            .with("summary", summary)
            .with(
                "highlights",
                highlights
                    .into_iter()
                    .take(MAX_HIGHLIGHTS)
                    .map(Value::from)
                    .collect::<Vec<_>>(),
            )
            .with("sentiment", sentiment)
            .with("trajectory", trajectory)
            .with("document_url", self.documents.document_url(&document_id)))
    }

    fn format_response(&self, result: &ActionResult) -> String {
        if !result.success {
            return format!("Failed to summarize updates: {}", result.error_text());
        }
        let company = result.text("company").unwrap_or("(unknown)");
        let domain = result.text("domain").unwrap_or("(unknown)");

        if result.count("email_count") == 0 {
            return format!(
                "No update emails found from **{company}** ({domain}) in the last {} days.",
                result.count("days")
            );
        }

        let mut reply = format!(
            "Updates summary for **{company}** ({domain})\n\n\
             **Emails analyzed:** {} ({} to {})",
            result.count("email_count"),
            result.text("first_date").unwrap_or("?"),
            result.text("last_date").unwrap_or("?"),
        );
        if let Some(trajectory) = result.text("trajectory") {
            reply.push_str(&format!("\n**Trajectory:** {trajectory}"));
        }
        if let Some(sentiment) = result.text("sentiment") {
            reply.push_str(&format!("\n**Sentiment:** {sentiment}"));
        }
        if let Some(summary) = result.text("summary") {
            let mut short = truncate(summary, SUMMARY_REPLY_CHARS);
            if short.len() < summary.len() {
                short.push_str("...");
            }
            reply.push_str(&format!("\n\n{short}"));
        }
        let highlights: Vec<&str> = result
            .list("highlights")
            .into_iter()
            .filter_map(Value::as_str)
            .collect();
        if !highlights.is_empty() {
            reply.push_str("\n\n**Highlights:**");
            for h in highlights {
                reply.push_str(&format!("\n- {h}"));
            }
        }
        if let Some(url) = result.text("document_url") {
            reply.push_str(&format!("\n\n**Full summary:** {url}"));
        }
        reply
    }
}
