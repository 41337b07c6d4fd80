use super::GoogleApi;
use crate::collaborators::traits::UpdatesSource;
use crate::collaborators::types::UpdateEmail;
use crate::error::{CollaboratorError, TransportError};
use crate::poller::{Mailbox, MailboxMessage};
use crate::router::InboundEmail;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use lettre::message::header::ContentType;
use mail_parser::MessageParser;
use serde::Deserialize;
use serde_json::{Value, json};

const COLLABORATOR: &str = "gmail";
const MAX_LIST: usize = 100;

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: String,
    #[serde(rename = "threadId", default)]
    thread_id: Option<String>,
    #[serde(default)]
    raw: String,
}

/// Headers and plain-text body pulled out of an RFC 5322 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMail {
    pub message_id: Option<String>,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub date: Option<DateTime<Utc>>,
    pub body: String,
}

fn render_address(address: Option<&mail_parser::Address<'_>>) -> String {
    let Some(addr) = address.and_then(mail_parser::Address::first) else {
        return String::new();
    };
    match (addr.name(), addr.address()) {
        (Some(name), Some(email)) => format!("{name} <{email}>"),
        (None, Some(email)) => email.to_string(),
        (Some(name), None) => name.to_string(),
        (None, None) => String::new(),
    }
}

pub fn parse_raw_message(bytes: &[u8]) -> anyhow::Result<ParsedMail> {
    let message = MessageParser::default()
        .parse(bytes)
        .ok_or_else(|| CollaboratorError::Malformed {
            collaborator: COLLABORATOR,
            message: "unparseable RFC 5322 message".into(),
        })?;

    Ok(ParsedMail {
        message_id: message.message_id().map(str::to_string),
        from: render_address(message.from()),
        to: render_address(message.to()),
        subject: message.subject().unwrap_or_default().to_string(),
        date: message
            .date()
            .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0)),
        body: message
            .body_text(0)
            .map(|b| b.into_owned())
            .unwrap_or_default(),
    })
}

fn decode_raw(raw: &str) -> anyhow::Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(raw.trim_end_matches('='))
        .map_err(|e| {
            CollaboratorError::Malformed {
                collaborator: COLLABORATOR,
                message: format!("raw payload is not base64url: {e}"),
            }
            .into()
        })
}

/// Gmail REST client: the inbox the poller drains and the history
/// `SUMMARIZE_UPDATES` reads from.
pub struct GmailClient {
    api: GoogleApi,
    agent_address: Option<String>,
}

impl GmailClient {
    pub fn new(api: GoogleApi, agent_address: Option<String>) -> Self {
        Self {
            api,
            agent_address: agent_address.filter(|a| !a.trim().is_empty()),
        }
    }

    fn messages_url(&self, tail: &[&str]) -> anyhow::Result<reqwest::Url> {
        let mut segments = vec!["gmail", "v1", "users", "me", "messages"];
        segments.extend_from_slice(tail);
        GoogleApi::url(&self.api.endpoints().gmail, &segments)
    }

    async fn list_ids(&self, query: &str, max: usize) -> anyhow::Result<Vec<String>> {
        let mut url = self.messages_url(&[])?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("maxResults", &max.clamp(1, MAX_LIST).to_string());
        let list: MessageList = self.api.send_json(COLLABORATOR, self.api.get(url)).await?;
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn get_raw(&self, id: &str) -> anyhow::Result<(RawMessage, ParsedMail)> {
        let mut url = self.messages_url(&[id])?;
        url.query_pairs_mut().append_pair("format", "raw");
        let raw: RawMessage = self.api.send_json(COLLABORATOR, self.api.get(url)).await?;
        let parsed = parse_raw_message(&decode_raw(&raw.raw)?)?;
        Ok((raw, parsed))
    }
}

#[async_trait]
impl UpdatesSource for GmailClient {
    async fn fetch_updates(
        &self,
        domain: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<UpdateEmail>> {
        let query = format!("from:@{domain} after:{}", since.format("%Y/%m/%d"));
        let ids = self.list_ids(&query, limit).await?;

        let mut updates = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_raw(&id).await {
                Ok((_, mail)) => updates.push(UpdateEmail {
                    from: mail.from,
                    subject: mail.subject,
                    date: mail.date,
                    body: mail.body,
                }),
                Err(e) => tracing::warn!(id = %id, "skipping unreadable update email: {e:#}"),
            }
        }
        Ok(updates)
    }
}

fn mailbox_error(operation: &'static str, err: &anyhow::Error) -> anyhow::Error {
    TransportError::Mailbox {
        operation,
        message: format!("{err:#}"),
    }
    .into()
}

#[async_trait]
impl Mailbox for GmailClient {
    async fn list_unread(&self, query: &str, max: usize) -> anyhow::Result<Vec<String>> {
        self.list_ids(query, max)
            .await
            .map_err(|e| mailbox_error("list", &e))
    }

    async fn fetch(&self, id: &str) -> anyhow::Result<MailboxMessage> {
        let (raw, mail) = self
            .get_raw(id)
            .await
            .map_err(|e| mailbox_error("fetch", &e))?;
        Ok(MailboxMessage {
            id: raw.id,
            thread_id: raw.thread_id,
            message_id: mail.message_id,
            email: InboundEmail::new(mail.from, mail.to, mail.subject, mail.body),
        })
    }

    async fn send_reply(&self, original: &MailboxMessage, body: &str) -> anyhow::Result<()> {
        let from = self
            .agent_address
            .as_deref()
            .ok_or(CollaboratorError::NotConfigured {
                collaborator: COLLABORATOR,
                field: "email.agent_address",
            })?;

        let subject = if original.email.subject.to_lowercase().starts_with("re:") {
            original.email.subject.clone()
        } else {
            format!("Re: {}", original.email.subject)
        };

        let mut builder = lettre::Message::builder()
            .from(from.parse()?)
            .to(original.email.from.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);
        if let Some(message_id) = &original.message_id {
            let reference = format!("<{}>", message_id.trim_matches(['<', '>']));
            builder = builder
                .in_reply_to(reference.clone())
                .references(reference);
        }
        let message = builder.body(body.to_string())?;

        let mut payload = json!({ "raw": URL_SAFE_NO_PAD.encode(message.formatted()) });
        if let Some(thread_id) = &original.thread_id {
            payload["threadId"] = json!(thread_id);
        }

        let request = self.api.post(self.messages_url(&["send"])?).json(&payload);
        let _: Value = self
            .api
            .send_json(COLLABORATOR, request)
            .await
            .map_err(|e| mailbox_error("send", &e))?;
        Ok(())
    }

    async fn mark_handled(&self, id: &str) -> anyhow::Result<()> {
        let request = self
            .api
            .post(self.messages_url(&[id, "modify"])?)
            .json(&json!({ "removeLabelIds": ["UNREAD", "INBOX"] }));
        let _: Value = self
            .api
            .send_json(COLLABORATOR, request)
            .await
            .map_err(|e| mailbox_error("modify", &e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::google::GoogleEndpoints;
    use chrono::TimeZone;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RAW: &str = "From: Jane Doe <jane@acme.com>\r\n\
To: keel@friale.com\r\n\
Subject: March update\r\n\
Message-ID: <abc123@acme.com>\r\n\
Date: Mon, 3 Mar 2025 10:00:00 +0000\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
MRR grew 20% this month.\r\n";

    fn client(server: &MockServer, agent: Option<&str>) -> GmailClient {
        let api = GoogleApi::new(
            reqwest::Client::new(),
            "tok",
            GoogleEndpoints::uniform(&server.uri()),
        );
        GmailClient::new(api, agent.map(str::to_string))
    }

    #[test]
    fn parses_headers_and_body() {
        let mail = parse_raw_message(RAW.as_bytes()).unwrap();
        assert_eq!(mail.from, "Jane Doe <jane@acme.com>");
        assert_eq!(mail.subject, "March update");
        assert_eq!(mail.message_id.as_deref(), Some("abc123@acme.com"));
        assert_eq!(
            mail.date,
            Some(Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap())
        );
        assert!(mail.body.contains("MRR grew 20%"));
    }

    #[test]
    fn decodes_padded_base64url() {
        let encoded = base64::engine::general_purpose::URL_SAFE.encode(b"hi?");
        assert_eq!(decode_raw(&encoded).unwrap(), b"hi?");
    }

    async fn mount_message(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m-1"))
            .and(query_param("format", "raw"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m-1",
                "threadId": "t-1",
                "raw": URL_SAFE_NO_PAD.encode(RAW)
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fetch_updates_queries_sender_domain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .and(query_param("q", "from:@acme.com after:2025/01/01"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "m-1" }] })),
            )
            .mount(&server)
            .await;
        mount_message(&server).await;

        let since = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let updates = client(&server, None)
            .fetch_updates("acme.com", since, 100)
            .await
            .unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].subject, "March update");
    }

    #[tokio::test]
    async fn reply_threads_and_marks_read() {
        let server = MockServer::start().await;
        mount_message(&server).await;
        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/send"))
            .and(body_partial_json(json!({ "threadId": "t-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "sent" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/m-1/modify"))
            .and(body_partial_json(json!({ "removeLabelIds": ["UNREAD", "INBOX"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let gmail = client(&server, Some("keel@friale.com"));
        let message = gmail.fetch("m-1").await.unwrap();
        assert_eq!(message.email.sender_domain().as_deref(), Some("acme.com"));
        gmail.send_reply(&message, "Done!").await.unwrap();
        gmail.mark_handled("m-1").await.unwrap();
    }

    #[tokio::test]
    async fn reply_requires_agent_address() {
        let server = MockServer::start().await;
        mount_message(&server).await;
        let gmail = client(&server, None);
        let message = gmail.fetch("m-1").await.unwrap();
        let err = gmail.send_reply(&message, "x").await.unwrap_err();
        assert!(err.to_string().contains("agent_address"));
    }
}
