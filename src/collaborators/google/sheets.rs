use super::GoogleApi;
use crate::collaborators::traits::SheetSource;
use crate::collaborators::types::{STATUS_NEW, SheetField, SheetRow};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

const COLLABORATOR: &str = "sheets";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Deal-flow sheet backed by the Sheets v4 values API.
///
/// Columns are `Company | Domain | Status | Source`; row 1 is a header.
pub struct GoogleSheet {
    api: GoogleApi,
    spreadsheet_id: String,
    range: String,
}

impl GoogleSheet {
    pub fn new(api: GoogleApi, spreadsheet_id: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            api,
            spreadsheet_id: spreadsheet_id.into(),
            range: range.into(),
        }
    }

    /// Tab name from an A1 range (`Index!A:D` → `Index`).
    fn sheet_name(&self) -> &str {
        self.range
            .split_once('!')
            .map_or(self.range.as_str(), |(name, _)| name)
    }

    fn values_url(&self, range: &str) -> anyhow::Result<reqwest::Url> {
        GoogleApi::url(
            &self.api.endpoints().sheets,
            &["v4", "spreadsheets", &self.spreadsheet_id, "values", range],
        )
    }
}

fn cell(row: &[Value], index: usize) -> String {
    match row.get(index) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn rows_from_values(values: &[Vec<Value>]) -> Vec<SheetRow> {
    values
        .iter()
        .enumerate()
        .skip(1)
        .map(|(index, raw)| SheetRow {
            row: index + 1,
            company: cell(raw, 0),
            domain: cell(raw, 1),
            status: cell(raw, 2),
            source: cell(raw, 3),
        })
        .filter(|row| !row.company.is_empty() || !row.domain.is_empty())
        .collect()
}

#[async_trait]
impl SheetSource for GoogleSheet {
    async fn list_rows(&self) -> anyhow::Result<Vec<SheetRow>> {
        let url = self.values_url(&self.range)?;
        let body: ValueRange = self.api.send_json(COLLABORATOR, self.api.get(url)).await?;
        Ok(rows_from_values(&body.values))
    }

    async fn append_row(&self, company: &str, domain: &str, source: &str) -> anyhow::Result<()> {
        let mut url = self.values_url(&format!("{}:append", self.range))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let request = self
            .api
            .post(url)
            .json(&json!({ "values": [[company, domain, STATUS_NEW, source]] }));
        let _: Value = self.api.send_json(COLLABORATOR, request).await?;
        tracing::info!(company, domain, source, "appended sheet row");
        Ok(())
    }

    async fn update_row_field(
        &self,
        row: usize,
        field: SheetField,
        value: &str,
    ) -> anyhow::Result<()> {
        anyhow::ensure!(row >= 2, "row {row} is the header or out of range");
        let target = format!("{}!{}{row}", self.sheet_name(), field.column());
        let mut url = self.values_url(&target)?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");

        let request = self
            .api
            .put(url)
            .json(&json!({ "range": target, "values": [[value]] }));
        let _: Value = self.api.send_json(COLLABORATOR, request).await?;
        tracing::debug!(row, ?field, "updated sheet cell");
        Ok(())
    }
}
