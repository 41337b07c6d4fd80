pub mod compatible;
pub mod factory;
pub mod gemini;
mod gemini_types;
pub mod http_client;
pub mod oracle;
pub mod scrub;
pub mod traits;

pub use factory::{create_oracle, create_provider};
pub use http_client::{build_http_client, build_http_client_with_timeout};
pub use oracle::Oracle;
pub use scrub::{read_error_body, sanitize_api_error, scrub_secret_patterns};
pub use traits::Provider;
