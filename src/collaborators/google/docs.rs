use super::GoogleApi;
use crate::collaborators::traits::DocumentStore;
use crate::collaborators::types::DocumentContent;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const DOCUMENT_MIME: &str = "application/vnd.google-apps.document";

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct StructuralElement {
    #[serde(rename = "endIndex", default)]
    end_index: u64,
}

#[derive(Debug, Default, Deserialize)]
struct Body {
    #[serde(default)]
    content: Vec<StructuralElement>,
}

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    body: Body,
}

/// Folders through Drive v3, document bodies through Docs v1.
pub struct GoogleDocuments {
    api: GoogleApi,
    parent_folder_id: Option<String>,
}

impl GoogleDocuments {
    pub fn new(api: GoogleApi, parent_folder_id: Option<String>) -> Self {
        Self {
            api,
            parent_folder_id: parent_folder_id.filter(|p| !p.trim().is_empty()),
        }
    }

    fn files_url(&self) -> anyhow::Result<reqwest::Url> {
        GoogleApi::url(&self.api.endpoints().drive, &["drive", "v3", "files"])
    }

    async fn create_file(
        &self,
        name: &str,
        mime_type: &str,
        parent: Option<&str>,
    ) -> anyhow::Result<String> {
        let mut metadata = json!({ "name": name, "mimeType": mime_type });
        if let Some(parent) = parent {
            metadata["parents"] = json!([parent]);
        }
        let request = self.api.post(self.files_url()?).json(&metadata);
        let file: DriveFile = self.api.send_json("drive", request).await?;
        Ok(file.id)
    }
}

/// Escape a value for a Drive `q` string literal.
fn quote_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl DocumentStore for GoogleDocuments {
    async fn ensure_folder(&self, name: &str) -> anyhow::Result<String> {
        let mut query = format!(
            "name = '{}' and mimeType = '{FOLDER_MIME}' and trashed = false",
            quote_query(name)
        );
        if let Some(parent) = &self.parent_folder_id {
            query.push_str(&format!(" and '{}' in parents", quote_query(parent)));
        }

        let mut url = self.files_url()?;
        url.query_pairs_mut()
            .append_pair("q", &query)
            .append_pair("fields", "files(id,name)");
        let existing: FileList = self.api.send_json("drive", self.api.get(url)).await?;

        if let Some(folder) = existing.files.into_iter().next() {
            return Ok(folder.id);
        }

        let id = self
            .create_file(name, FOLDER_MIME, self.parent_folder_id.as_deref())
            .await?;
        tracing::info!(folder = name, id = %id, "created drive folder");
        Ok(id)
    }

    async fn create_document(&self, folder_id: &str, template: &str) -> anyhow::Result<String> {
        self.create_file(template, DOCUMENT_MIME, Some(folder_id))
            .await
    }

    async fn write_content(
        &self,
        document_id: &str,
        content: &DocumentContent,
    ) -> anyhow::Result<()> {
        let doc_url = GoogleApi::url(
            &self.api.endpoints().docs,
            &["v1", "documents", document_id],
        )?;
        let current: Document = self.api.send_json("docs", self.api.get(doc_url)).await?;

        // A fresh document has a single trailing newline (endIndex 2) that cannot be deleted.
        let end = current
            .body
            .content
            .iter()
            .map(|e| e.end_index)
            .max()
            .unwrap_or(1);

        let mut requests = Vec::new();
        if end > 2 {
            requests.push(json!({
                "deleteContentRange": { "range": { "startIndex": 1, "endIndex": end - 1 } }
            }));
        }
        requests.push(json!({
            "insertText": { "location": { "index": 1 }, "text": content.render() }
        }));

        let update_url = GoogleApi::url(
            &self.api.endpoints().docs,
            &["v1", "documents", &format!("{document_id}:batchUpdate")],
        )?;
        let request = self
            .api
            .post(update_url)
            .json(&json!({ "requests": requests }));
        let _: Value = self.api.send_json("docs", request).await?;
        Ok(())
    }

    async fn probe(&self) -> anyhow::Result<()> {
        let mut url = GoogleApi::url(&self.api.endpoints().drive, &["drive", "v3", "about"])?;
        url.query_pairs_mut().append_pair("fields", "user");
        let _: Value = self.api.send_json("drive", self.api.get(url)).await?;
        Ok(())
    }
}
