#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod actions;
pub mod app;
pub mod cli;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod poller;
pub mod providers;
pub mod router;

pub use actions::{Action, ActionName, ActionRegistry, ActionResult, default_registry};
pub use config::Config;
pub use error::{KeelError, Result};
pub use router::{EmailRouter, InboundEmail, RouterReply};
