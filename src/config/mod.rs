pub mod schema;

pub use schema::{
    BackendKind, BookfaceConfig, Config, EmailConfig, GatewayConfig, GoogleConfig, LedgerConfig,
    ProviderConfig,
};
