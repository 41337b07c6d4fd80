use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// The fixed set of intents the classifier may emit.
///
/// `Unknown` is the distinguished "nothing to do" value; it is never
/// registered and never executed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionName {
    GenerateMemos,
    AddCompany,
    UpdateCompany,
    RegenerateMemo,
    AnalyzeThread,
    SummarizeUpdates,
    #[strum(serialize = "SCRAPE_YC")]
    #[serde(rename = "SCRAPE_YC")]
    ScrapeYc,
    HealthCheck,
    #[strum(to_string = "NONE", serialize = "UNKNOWN")]
    #[serde(rename = "NONE", alias = "UNKNOWN")]
    Unknown,
}

impl ActionName {
    /// Lenient parse of oracle output: tolerates case, spaces and dashes,
    /// and maps anything unrecognised to `Unknown`.
    pub fn parse_lenient(raw: &str) -> Self {
        let normalized = raw.trim().replace([' ', '-'], "_");
        normalized.parse().unwrap_or(Self::Unknown)
    }

    pub fn is_unknown(self) -> bool {
        self == Self::Unknown
    }
}
