use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Keel state directory - computed from home, not serialized
    #[serde(skip)]
    pub state_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Which collaborator implementations to wire up.
    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub google: GoogleConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub bookface: BookfaceConfig,
}

// ── Backend ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process sheet and document store, SQLite ledger. Useful for local runs.
    #[default]
    Memory,
    /// Google Sheets / Drive / Docs / Gmail over REST.
    Google,
}

// ── Gateway ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway port (default: 8080)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Upper bound on a single action run before the router gives up on it
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_action_timeout_secs() -> u64 {
    600
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
            action_timeout_secs: default_action_timeout_secs(),
        }
    }
}

// ── Email ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Sender domains allowed to trigger actions. Empty means nobody.
    #[serde(default = "default_allowed_domains")]
    pub allowed_domains: Vec<String>,
    /// The agent's own address; mail from it is never routed (loop prevention).
    #[serde(default)]
    pub agent_address: Option<String>,
    /// Force forwarded/quoted threads to thread analysis before classification.
    #[serde(default = "default_true")]
    pub thread_heuristic: bool,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_poll_query")]
    pub poll_query: String,
    #[serde(default = "default_max_poll")]
    pub max_poll: u32,
    /// When set, the poller forwards mail to this gateway (`POST /email`)
    /// instead of routing in-process.
    #[serde(default)]
    pub gateway_url: Option<String>,
}

fn default_allowed_domains() -> Vec<String> {
    vec!["friale.com".into()]
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_poll_query() -> String {
    "is:unread in:inbox".into()
}

fn default_max_poll() -> u32 {
    10
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            allowed_domains: default_allowed_domains(),
            agent_address: None,
            thread_heuristic: true,
            poll_interval_secs: default_poll_interval_secs(),
            poll_query: default_poll_query(),
            max_poll: default_max_poll(),
            gateway_url: None,
        }
    }
}

// ── Provider ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// "gemini", "openai", "openrouter", or "custom:<base-url>"
    #[serde(default = "default_provider_name")]
    pub name: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature for memo and digest generation
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Sampling temperature for intent classification
    #[serde(default = "default_classify_temperature")]
    pub classify_temperature: f64,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider_name() -> String {
    "gemini".into()
}

fn default_model() -> String {
    "gemini-2.0-flash".into()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_classify_temperature() -> f64 {
    0.1
}

fn default_provider_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            classify_temperature: default_classify_temperature(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

// ── Google ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// OAuth bearer token with Sheets, Drive, Docs and Gmail scopes
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default = "default_sheet_range")]
    pub sheet_range: String,
    #[serde(default)]
    pub drive_parent_folder_id: Option<String>,
}

fn default_sheet_range() -> String {
    "Index!A:D".into()
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            spreadsheet_id: None,
            sheet_range: default_sheet_range(),
            drive_parent_folder_id: None,
        }
    }
}

// ── Ledger ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// SQLite file; `~` is expanded
    #[serde(default = "default_ledger_path")]
    pub path: String,
    /// Logical collection name for processed companies
    #[serde(default = "default_ledger_collection")]
    pub collection: String,
}

fn default_ledger_path() -> String {
    "~/.keel/ledger.db".into()
}

fn default_ledger_collection() -> String {
    "processed_domains".into()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
            collection: default_ledger_collection(),
        }
    }
}

impl LedgerConfig {
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).into_owned())
    }
}

// ── Bookface ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookfaceConfig {
    #[serde(default)]
    pub cookie: Option<String>,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
}

fn default_max_pages() -> u32 {
    3
}

fn default_rate_limit_ms() -> u64 {
    2000
}

impl Default for BookfaceConfig {
    fn default() -> Self {
        Self {
            cookie: None,
            max_pages: default_max_pages(),
            rate_limit_ms: default_rate_limit_ms(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        let keel_dir = home.join(".keel");

        Self {
            state_dir: keel_dir.clone(),
            config_path: keel_dir.join("config.toml"),
            backend: BackendKind::default(),
            gateway: GatewayConfig::default(),
            email: EmailConfig::default(),
            provider: ProviderConfig::default(),
            google: GoogleConfig::default(),
            ledger: LedgerConfig::default(),
            bookface: BookfaceConfig::default(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let keel_dir = home.join(".keel");
        let config_path = keel_dir.join("config.toml");

        if !keel_dir.exists() {
            fs::create_dir_all(&keel_dir).context("Failed to create .keel directory")?;
        }

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            // Set computed paths that are skipped during serialization
            config.config_path.clone_from(&config_path);
            config.state_dir.clone_from(&keel_dir);
            config
        } else {
            let config = Self {
                config_path: config_path.clone(),
                state_dir: keel_dir.clone(),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        // API Key: KEEL_API_KEY or API_KEY
        if let Ok(key) = std::env::var("KEEL_API_KEY").or_else(|_| std::env::var("API_KEY"))
            && !key.is_empty()
        {
            self.provider.api_key = Some(key);
        }

        if let Ok(provider) = std::env::var("KEEL_PROVIDER")
            && !provider.is_empty()
        {
            self.provider.name = provider;
        }

        if let Ok(model) = std::env::var("KEEL_MODEL")
            && !model.is_empty()
        {
            self.provider.model = model;
        }

        // Gateway port: KEEL_PORT or PORT
        if let Ok(port_str) = std::env::var("KEEL_PORT").or_else(|_| std::env::var("PORT"))
            && let Ok(port) = port_str.parse::<u16>()
        {
            self.gateway.port = port;
        }

        if let Ok(host) = std::env::var("KEEL_HOST")
            && !host.is_empty()
        {
            self.gateway.host = host;
        }

        if let Ok(domains) = std::env::var("KEEL_ALLOWED_DOMAINS") {
            let parsed: Vec<String> = domains
                .split(',')
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect();
            if !parsed.is_empty() {
                self.email.allowed_domains = parsed;
            }
        }

        if let Ok(id) = std::env::var("SPREADSHEET_ID")
            && !id.is_empty()
        {
            self.google.spreadsheet_id = Some(id);
        }

        if let Ok(id) = std::env::var("DRIVE_PARENT_FOLDER_ID")
            && !id.is_empty()
        {
            self.google.drive_parent_folder_id = Some(id);
        }

        if let Ok(token) = std::env::var("GOOGLE_ACCESS_TOKEN")
            && !token.is_empty()
        {
            self.google.access_token = Some(token);
        }

        if let Ok(cookie) = std::env::var("BOOKFACE_COOKIE")
            && !cookie.is_empty()
        {
            self.bookface.cookie = Some(cookie);
        }

        if let Ok(collection) = std::env::var("FIRESTORE_COLLECTION")
            && !collection.is_empty()
        {
            self.ledger.collection = collection;
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::Validation("gateway.port must be non-zero".into()));
        }
        if self.gateway.action_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "gateway.action_timeout_secs must be non-zero".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature)
            || !(0.0..=2.0).contains(&self.provider.classify_temperature)
        {
            return Err(ConfigError::Validation(
                "provider temperatures must be within 0.0..=2.0".into(),
            ));
        }
        if self.backend == BackendKind::Google && self.google.access_token.is_none() {
            return Err(ConfigError::Validation(
                "backend = \"google\" requires google.access_token (or GOOGLE_ACCESS_TOKEN)"
                    .into(),
            ));
        }
        Ok(())
    }
}
