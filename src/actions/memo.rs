//! Per-company memo generation shared by the batch trigger and explicit
//! regeneration.

use crate::collaborators::types::{
    DocumentContent, LedgerMetadata, Relationship, STATUS_MEMO_CREATED, STATUS_MEMO_REGENERATED,
    SheetField, company_key,
};
use crate::collaborators::{Collaborators, DocumentStore, Ledger, RelationshipStore, SheetSource};
use std::fmt::Write as _;
use crate::providers::Oracle;
use anyhow::Context;
use std::sync::Arc;

pub const MEMO_DOCUMENT_TITLE: &str = "Initial Brief";
const MAX_CONTEXT_EVENTS: usize = 10;

/// One company to write a memo for. `row` is set when the company came
/// from the sheet so its status can be updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoTarget {
    pub company: String,
    pub domain: String,
    pub row: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoMode {
    /// Skip companies the ledger already has.
    Batch,
    /// Clear the ledger entry first and write a fresh memo.
    Regenerate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoOutcome {
    Written {
        document_id: String,
        folder_id: String,
        url: String,
    },
    /// Already processed, or another run holds the claim.
    Skipped,
}

pub fn folder_name(company: &str, domain: &str) -> String {
    let domain = domain.trim();
    format!(
        "{} ({})",
        company.trim(),
        if domain.is_empty() { "no-domain" } else { domain }
    )
}

/// Brief prompt for `company`. A stored relationship from thread analysis
/// is appended as context.
pub fn memo_prompt(company: &str, domain: &str, relationship: Option<&Relationship>) -> String {
    let website = if domain.trim().is_empty() {
        "Not provided"
    } else {
        domain.trim()
    };
    let mut prompt = format!(
        "You are a research analyst. Compile a factual research brief on the company below. \
         State facts only: no opinions, assessments or recommendations.\n\n\
         Company: {company}\n\
         Website: {website}\n\n\
         Use what you know about the company. Write \"Not found\" only where you have no \
         information at all.\n\n\
         Structure the brief as:\n\n\
         # {company} Research Brief\n\n\
         ## Company Overview\n\
         What they do, website, founding year and location, headquarters, company size.\n\n\
         ## Founders & Team\n\
         Each founder or key executive with title and verified background. Do not invent people.\n\n\
         ## Product & Service\n\
         What the product does, key features, target customers, public pricing.\n\n\
         ## Traction & Metrics\n\
         Only explicitly reported users, customers, revenue, growth, partnerships and funding. \
         If none, write \"No public traction data found.\"\n\n\
         ## Online Presence\n\
         Social profiles, press coverage, community activity.\n\n\
         ## Background\n\
         Company history, pivots, notable milestones.\n\n\
         ## Additional Information\n\
         Anything else factual and relevant."
    );
    if let Some(relationship) = relationship {
        push_relationship_context(&mut prompt, relationship);
    }
    prompt
}

fn push_relationship_context(prompt: &mut String, relationship: &Relationship) {
    if relationship.summary.trim().is_empty() && relationship.timeline.is_empty() {
        return;
    }
    prompt.push_str("\n\n=== RELATIONSHIP & EMAIL HISTORY (from forwarded emails) ===\n");
    if !relationship.summary.trim().is_empty() {
        let _ = write!(
            prompt,
            "\nRelationship summary:\n{}\n",
            relationship.summary.trim()
        );
    }
    if !relationship.timeline.is_empty() {
        prompt.push_str("\nCommunication timeline:\n");
        for entry in relationship.timeline.iter().take(MAX_CONTEXT_EVENTS) {
            let _ = writeln!(prompt, "- [{}] {}", entry.date, entry.event);
        }
    }
}

/// Claim → relationship → generate → folder → document → write → mark → status.
#[derive(Clone)]
pub struct MemoPipeline {
    sheet: Arc<dyn SheetSource>,
    ledger: Arc<dyn Ledger>,
    documents: Arc<dyn DocumentStore>,
    relationships: Arc<dyn RelationshipStore>,
    oracle: Oracle,
}

impl MemoPipeline {
    pub fn new(collaborators: &Collaborators) -> Self {
        Self {
            sheet: Arc::clone(&collaborators.sheet),
            ledger: Arc::clone(&collaborators.ledger),
            documents: Arc::clone(&collaborators.documents),
            relationships: Arc::clone(&collaborators.relationships),
            oracle: collaborators.oracle.clone(),
        }
    }

    pub fn sheet(&self) -> &Arc<dyn SheetSource> {
        &self.sheet
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub async fn run(&self, target: &MemoTarget, mode: MemoMode) -> anyhow::Result<MemoOutcome> {
        let key = company_key(&target.company, &target.domain);
        anyhow::ensure!(!key.is_empty(), "company has neither a name nor a domain");

        match mode {
            MemoMode::Batch => {
                if self.ledger.is_processed(&key).await? {
                    tracing::debug!(key = %key, "already processed");
                    return Ok(MemoOutcome::Skipped);
                }
            }
            MemoMode::Regenerate => {
                self.ledger.clear(&key).await?;
            }
        }

        if !self.ledger.try_claim(&key).await? {
            tracing::info!(key = %key, "claimed by another run");
            return Ok(MemoOutcome::Skipped);
        }

        match self.write_memo(target, &key).await {
            Ok(outcome) => {
                self.update_status(target, mode).await;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(release_err) = self.ledger.release(&key).await {
                    tracing::warn!(key = %key, "failed to release claim: {release_err:#}");
                }
                Err(e)
            }
        }
    }

    /// A failed generation leaves no document behind. A failed relationship
    /// lookup only drops the extra context.
    async fn write_memo(&self, target: &MemoTarget, key: &str) -> anyhow::Result<MemoOutcome> {
        let relationship = match self.relationships.get(key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(key = %key, "relationship lookup failed: {e:#}");
                None
            }
        };
        let memo = self
            .oracle
            .generate(&memo_prompt(
                &target.company,
                &target.domain,
                relationship.as_ref(),
            ))
            .await
            .context("generate memo")?;

        let folder_id = self
            .documents
            .ensure_folder(&folder_name(&target.company, &target.domain))
            .await
            .context("create company folder")?;
        let document_id = self
            .documents
            .create_document(&folder_id, MEMO_DOCUMENT_TITLE)
            .await
            .context("create memo document")?;

        self.documents
            .write_content(
                &document_id,
                &DocumentContent::from_text(MEMO_DOCUMENT_TITLE, memo),
            )
            .await
            .context("write memo")?;

        self.ledger
            .mark_processed(
                key,
                &LedgerMetadata {
                    company: target.company.clone(),
                    document_id: Some(document_id.clone()),
                    folder_id: Some(folder_id.clone()),
                },
            )
            .await
            .context("mark processed")?;

        tracing::info!(company = %target.company, document_id = %document_id, "memo written");
        Ok(MemoOutcome::Written {
            url: self.documents.document_url(&document_id),
            document_id,
            folder_id,
        })
    }

    async fn update_status(&self, target: &MemoTarget, mode: MemoMode) {
        let Some(row) = target.row else {
            return;
        };
        let status = match mode {
            MemoMode::Batch => STATUS_MEMO_CREATED,
            MemoMode::Regenerate => STATUS_MEMO_REGENERATED,
        };
        if let Err(e) = self
            .sheet
            .update_row_field(row, SheetField::Status, status)
            .await
        {
            tracing::warn!(row, "failed to update sheet status: {e:#}");
        }
    }
}
