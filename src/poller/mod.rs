//! Inbox poller: unread mail → router → threaded reply → mark read and archive.

use crate::config::Config;
use crate::error::TransportError;
use crate::health;
use crate::providers::{build_http_client, read_error_body};
use crate::router::{EmailRouter, InboundEmail, extract_address};
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const COMPONENT: &str = "poller";
const MIN_POLL_SECS: u64 = 10;

/// One message pulled from the mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxMessage {
    pub id: String,
    pub thread_id: Option<String>,
    /// RFC 5322 `Message-ID`, used for `In-Reply-To`.
    pub message_id: Option<String>,
    pub email: InboundEmail,
}

#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Ids of messages matching `query`, at most `max`.
    async fn list_unread(&self, query: &str, max: usize) -> anyhow::Result<Vec<String>>;

    async fn fetch(&self, id: &str) -> anyhow::Result<MailboxMessage>;

    /// Reply in the same thread as `original`.
    async fn send_reply(&self, original: &MailboxMessage, body: &str) -> anyhow::Result<()>;

    /// Mark read and archive.
    async fn mark_handled(&self, id: &str) -> anyhow::Result<()>;
}

/// Produces reply text for an inbound email.
#[async_trait]
pub trait ReplySource: Send + Sync {
    async fn reply_to(&self, email: &InboundEmail) -> anyhow::Result<String>;
}

#[async_trait]
impl ReplySource for EmailRouter {
    async fn reply_to(&self, email: &InboundEmail) -> anyhow::Result<String> {
        Ok(self.handle(email).await.reply_text)
    }
}

/// Routes through a running gateway's `POST /email`.
pub struct GatewayReplies {
    client: reqwest::Client,
    url: String,
}

#[derive(Deserialize)]
struct GatewayReply {
    reply_text: String,
}

impl GatewayReplies {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: format!("{}/email", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl ReplySource for GatewayReplies {
    async fn reply_to(&self, email: &InboundEmail) -> anyhow::Result<String> {
        let response = self
            .client
            .post(&self.url)
            .json(email)
            .send()
            .await
            .with_context(|| format!("POST {}", self.url))?;

        // 403 still carries the rejection reply.
        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::FORBIDDEN {
            let (code, body) = read_error_body(response).await;
            return Err(TransportError::Gateway(format!("{code}: {body}")).into());
        }
        let reply: GatewayReply = response
            .json()
            .await
            .context("gateway reply was not the expected JSON")?;
        Ok(reply.reply_text)
    }
}

/// Counts for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub seen: usize,
    pub replied: usize,
    pub skipped_own: usize,
    pub failed: usize,
}

enum Disposition {
    Replied,
    OwnMessage,
}

pub struct Poller {
    mailbox: Arc<dyn Mailbox>,
    replies: Arc<dyn ReplySource>,
    agent_address: Option<String>,
    query: String,
    max: usize,
}

impl Poller {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        replies: Arc<dyn ReplySource>,
        agent_address: Option<&str>,
        query: impl Into<String>,
        max: usize,
    ) -> Self {
        Self {
            mailbox,
            replies,
            agent_address: agent_address.and_then(extract_address),
            query: query.into(),
            max: max.max(1),
        }
    }

    /// Replies come from `router` unless `email.gateway_url` is set.
    pub fn from_config(config: &Config, mailbox: Arc<dyn Mailbox>, router: EmailRouter) -> Self {
        let replies: Arc<dyn ReplySource> = match &config.email.gateway_url {
            Some(url) => Arc::new(GatewayReplies::new(build_http_client(), url)),
            None => Arc::new(router),
        };
        Self::new(
            mailbox,
            replies,
            config.email.agent_address.as_deref(),
            config.email.poll_query.clone(),
            usize::try_from(config.email.max_poll).unwrap_or(usize::MAX),
        )
    }

    /// Handle every unread message once. Only listing failures abort the sweep.
    pub async fn sweep(&self) -> anyhow::Result<SweepReport> {
        let ids = self.mailbox.list_unread(&self.query, self.max).await?;
        let mut report = SweepReport {
            seen: ids.len(),
            ..SweepReport::default()
        };

        for id in &ids {
            match self.handle(id).await {
                Ok(Disposition::Replied) => report.replied += 1,
                Ok(Disposition::OwnMessage) => report.skipped_own += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(message = %id, "failed to handle message: {e:#}");
                }
            }
        }

        if report.seen > 0 {
            tracing::info!(
                seen = report.seen,
                replied = report.replied,
                skipped_own = report.skipped_own,
                failed = report.failed,
                "inbox sweep finished"
            );
        }
        Ok(report)
    }

    async fn handle(&self, id: &str) -> anyhow::Result<Disposition> {
        let message = self.mailbox.fetch(id).await?;

        if self.agent_address.is_some() && message.email.sender_address() == self.agent_address {
            tracing::debug!(message = %id, "skipping our own message");
            self.mailbox.mark_handled(id).await?;
            return Ok(Disposition::OwnMessage);
        }

        tracing::info!(message = %id, from = %message.email.from, subject = %message.email.subject, "handling email");
        let reply = self.replies.reply_to(&message.email).await?;
        self.mailbox.send_reply(&message, &reply).await?;
        self.mailbox.mark_handled(id).await?;
        Ok(Disposition::Replied)
    }

    /// Sweep every `interval` until the task is dropped.
    pub async fn run(&self, interval: Duration) -> anyhow::Result<()> {
        let interval = interval.max(Duration::from_secs(MIN_POLL_SECS));
        let mut ticker = tokio::time::interval(interval);
        tracing::info!(interval_secs = interval.as_secs(), query = %self.query, "poller started");

        loop {
            ticker.tick().await;
            match self.sweep().await {
                Ok(report) if report.failed == 0 => health::mark_component_ok(COMPONENT),
                Ok(report) => health::mark_component_error(
                    COMPONENT,
                    format!("{} of {} messages failed", report.failed, report.seen),
                ),
                Err(e) => {
                    health::mark_component_error(COMPONENT, format!("{e:#}"));
                    tracing::warn!("inbox sweep failed: {e:#}");
                }
            }
        }
    }
}
