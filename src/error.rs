use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `Keel`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum KeelError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── LLM / Provider ──────────────────────────────────────────────────
    #[error("llm: {0}")]
    Llm(#[from] LlmError),

    // ── Actions / Registry ──────────────────────────────────────────────
    #[error("action: {0}")]
    Action(#[from] ActionError),

    // ── External collaborators ──────────────────────────────────────────
    #[error("collaborator: {0}")]
    Collaborator(#[from] CollaboratorError),

    // ── Transport (gateway / mailbox) ───────────────────────────────────
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── LLM / Provider errors ──────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider {provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("provider {provider} authentication failed: {message}")]
    Auth { provider: String, message: String },

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("provider {provider} returned an empty response")]
    EmptyResponse { provider: String },
}

// ─── Action errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("action {name} registered twice")]
    DuplicateRegistration { name: String },

    #[error("action name {name} is reserved and cannot be registered")]
    ReservedName { name: String },

    #[error("action {name} is not registered")]
    NotRegistered { name: String },

    #[error("action {name} timed out after {secs}s")]
    TimedOut { name: String, secs: u64 },

    #[error("action {name} panicked: {message}")]
    Panicked { name: String, message: String },
}

// ─── Collaborator errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{collaborator} is not configured: missing {field}")]
    NotConfigured {
        collaborator: &'static str,
        field: &'static str,
    },

    #[error("{collaborator} request failed ({status}): {message}")]
    Request {
        collaborator: &'static str,
        status: u16,
        message: String,
    },

    #[error("{collaborator} returned malformed data: {message}")]
    Malformed {
        collaborator: &'static str,
        message: String,
    },

    #[error("sqlx: {0}")]
    Sqlx(String),
}

// ─── Transport errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("gateway: {0}")]
    Gateway(String),

    #[error("mailbox {operation} failed: {message}")]
    Mailbox {
        operation: &'static str,
        message: String,
    },
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, KeelError>;
