//! Accelerator feed scraper for the `SCRAPE_YC` action.

use super::traits::ScrapeSource;
use super::types::ScrapedCompany;
use crate::config::BookfaceConfig;
use crate::error::CollaboratorError;
use crate::providers::read_error_body;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;

const BASE_URL: &str = "https://bookface.ycombinator.com";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";
const COLLABORATOR: &str = "bookface";

#[derive(Debug, Default, Deserialize)]
struct FeedCompany {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    name: String,
    #[serde(default)]
    batch: String,
}

#[derive(Debug, Default, Deserialize)]
struct FeedUser {
    #[serde(default)]
    companies: Vec<FeedCompany>,
}

#[derive(Debug, Default, Deserialize)]
struct FeedPost {
    #[serde(default)]
    user: Option<FeedUser>,
}

#[derive(Debug, Default, Deserialize)]
struct FeedPage {
    #[serde(default)]
    posts: Vec<FeedPost>,
    #[serde(default)]
    next_cursor: Option<String>,
}

fn id_text(id: &Value) -> Option<String> {
    match id {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct BookfaceClient {
    client: Client,
    base_url: String,
    cookie: Option<String>,
    max_pages: u32,
    rate_limit: Duration,
}

impl BookfaceClient {
    pub fn new(client: Client, config: &BookfaceConfig) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
            cookie: config.cookie.clone().filter(|c| !c.trim().is_empty()),
            max_pages: config.max_pages.max(1),
            rate_limit: Duration::from_millis(config.rate_limit_ms),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn fetch_page(&self, cookie: &str, cursor: Option<&str>) -> anyhow::Result<FeedPage> {
        let mut query = vec![
            ("feed", "recent"),
            ("filter_posts", "false"),
            ("omit_channels", "false"),
            ("comment_post_score_mode", "off"),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }

        let response = self
            .client
            .get(format!("{}/feed-v2.json", self.base_url))
            .query(&query)
            .header("accept", "application/json")
            .header("cookie", cookie)
            .header("user-agent", USER_AGENT)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = read_error_body(response).await;
            return Err(CollaboratorError::Request {
                collaborator: COLLABORATOR,
                status,
                message,
            }
            .into());
        }

        response.json::<FeedPage>().await.map_err(|e| {
            CollaboratorError::Malformed {
                collaborator: COLLABORATOR,
                message: e.to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl ScrapeSource for BookfaceClient {
    /// Walk the recent feed and collect companies whose batch matches
    /// exactly, de-duplicated by id in first-seen order.
    async fn list_companies(
        &self,
        batch: &str,
        max_pages: Option<u32>,
    ) -> anyhow::Result<Vec<ScrapedCompany>> {
        let cookie = self
            .cookie
            .as_deref()
            .ok_or(CollaboratorError::NotConfigured {
                collaborator: COLLABORATOR,
                field: "bookface.cookie",
            })?;
        let max_pages = max_pages.unwrap_or(self.max_pages).max(1);

        let mut seen = BTreeSet::new();
        let mut companies = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;

        while pages < max_pages {
            if pages > 0 && !self.rate_limit.is_zero() {
                tokio::time::sleep(self.rate_limit).await;
            }
            tracing::debug!(page = pages + 1, max_pages, "fetching feed page");

            let page = self.fetch_page(cookie, cursor.as_deref()).await?;
            if page.posts.is_empty() {
                break;
            }

            for company in page
                .posts
                .into_iter()
                .filter_map(|p| p.user)
                .flat_map(|u| u.companies)
                .filter(|c| c.batch == batch)
            {
                let Some(id) = id_text(&company.id) else {
                    continue;
                };
                if !seen.insert(id.clone()) {
                    continue;
                }
                companies.push(ScrapedCompany {
                    id,
                    name: company.name.trim().to_string(),
                    domain: String::new(),
                    batch: company.batch,
                });
            }

            pages += 1;
            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::info!(batch, pages, found = companies.len(), "scraped feed");
        Ok(companies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, cookie: Option<&str>) -> BookfaceClient {
        let config = BookfaceConfig {
            cookie: cookie.map(str::to_string),
            max_pages: 3,
            rate_limit_ms: 0,
        };
        BookfaceClient::new(Client::new(), &config).with_base_url(&server.uri())
    }

    fn post(companies: Value) -> Value {
        json!({ "user": { "full_name": "Founder", "companies": companies } })
    }

    #[tokio::test]
    async fn paginates_filters_and_dedups() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed-v2.json"))
            .and(query_param("cursor", "c2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "posts": [post(json!([
                    { "id": 1, "name": "Acme", "batch": "W26" },
                    { "id": 3, "name": "Initech", "batch": "W26" }
                ]))]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/feed-v2.json"))
            .and(header("cookie", "_sso.key=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "posts": [
                    post(json!([
                        { "id": 1, "name": "Acme", "batch": "W26" },
                        { "id": 2, "name": "Globex", "batch": "S25" }
                    ])),
                    { "title": "no user" }
                ],
                "next_cursor": "c2"
            })))
            .mount(&server)
            .await;

        let companies = client(&server, Some("_sso.key=abc"))
            .list_companies("W26", None)
            .await
            .unwrap();
        let names: Vec<_> = companies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Acme", "Initech"]);
        assert!(companies.iter().all(|c| c.domain.is_empty()));
        assert_eq!(companies[0].id, "1");
    }

    #[tokio::test]
    async fn stops_after_max_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed-v2.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "posts": [post(json!([{ "id": "x", "name": "Acme", "batch": "W26" }]))],
                "next_cursor": "again"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let companies = client(&server, Some("c"))
            .list_companies("W26", Some(2))
            .await
            .unwrap();
        assert_eq!(companies.len(), 1);
    }

    #[tokio::test]
    async fn missing_cookie_is_not_configured() {
        let server = MockServer::start().await;
        let err = client(&server, None)
            .list_companies("W26", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CollaboratorError>(),
            Some(CollaboratorError::NotConfigured { .. })
        ));
    }

    #[tokio::test]
    async fn upstream_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("login required"))
            .mount(&server)
            .await;
        let err = client(&server, Some("c"))
            .list_companies("W26", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
