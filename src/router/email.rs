use serde::{Deserialize, Serialize};

/// One inbound request as delivered by the transport. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEmail {
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

impl InboundEmail {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Bare address of the sender, e.g. `nick@friale.com` from
    /// `"Nick F" <Nick@Friale.com>`.
    pub fn sender_address(&self) -> Option<String> {
        extract_address(&self.from)
    }

    /// Lowercased domain of the sender address.
    pub fn sender_domain(&self) -> Option<String> {
        self.sender_address()
            .and_then(|addr| addr.rsplit_once('@').map(|(_, d)| d.to_string()))
            .filter(|d| !d.is_empty())
    }
}

/// Pull the address out of an RFC 5322 `From` value. Lowercased.
pub fn extract_address(raw: &str) -> Option<String> {
    let candidate = match (raw.rfind('<'), raw.rfind('>')) {
        (Some(open), Some(close)) if open < close => &raw[open + 1..close],
        _ => raw,
    };
    let candidate = candidate.trim().trim_matches('"').to_lowercase();

    let (local, domain) = candidate.rsplit_once('@')?;
    if local.is_empty()
        || domain.is_empty()
        || !domain.contains('.')
        || candidate.chars().any(char::is_whitespace)
    {
        return None;
    }
    Some(candidate)
}

/// Sender-domain gate. Exact domain match, case-insensitive; an empty list
/// admits nobody.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    domains: Vec<String>,
}

impl Allowlist {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().trim().trim_start_matches('@').to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn permits(&self, email: &InboundEmail) -> bool {
        email
            .sender_domain()
            .is_some_and(|domain| self.domains.iter().any(|allowed| *allowed == domain))
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }
}
