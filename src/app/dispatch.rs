use crate::actions::{ActionName, Parameters};
use crate::cli::{Cli, Commands};
use crate::collaborators::build_mailbox;
use crate::config::Config;
use crate::poller::Poller;
use crate::router::InboundEmail;
use anyhow::Result;
use serde_json::Value;
use std::time::Duration;

use super::build_email_router;

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Serve { port, host } => {
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            crate::gateway::run_gateway(&host, port, config).await
        }

        Commands::Run { force } => {
            let router = build_email_router(&config).await?;
            let mut parameters = Parameters::new();
            parameters.insert("force".into(), Value::Bool(force));
            let result = router
                .run_action(ActionName::GenerateMemos, &parameters)
                .await?;
            println!("{}", router.render(ActionName::GenerateMemos, &result));
            Ok(())
        }

        Commands::Email {
            from,
            subject,
            body,
        } => {
            let router = build_email_router(&config).await?;
            let to = config.email.agent_address.clone().unwrap_or_default();
            let reply = router
                .handle(&InboundEmail::new(from, to, subject, body))
                .await;
            tracing::info!(action = %reply.action, outcome = ?reply.outcome, "email handled");
            println!("{}", reply.reply_text);
            Ok(())
        }

        Commands::Poll { once } => {
            let router = build_email_router(&config).await?;
            let mailbox = build_mailbox(&config)?;
            let poller = Poller::from_config(&config, mailbox, router);
            if once {
                let report = poller.sweep().await?;
                println!(
                    "Seen {}, replied {}, skipped (own) {}, failed {}",
                    report.seen, report.replied, report.skipped_own, report.failed
                );
                Ok(())
            } else {
                let interval = Duration::from_secs(config.email.poll_interval_secs);
                tokio::select! {
                    result = poller.run(interval) => result,
                    _ = tokio::signal::ctrl_c() => {
                        crate::health::mark_component_error("poller", "shutdown requested");
                        Ok(())
                    }
                }
            }
        }

        Commands::Health => {
            let router = build_email_router(&config).await?;
            let result = router
                .run_action(ActionName::HealthCheck, &Parameters::new())
                .await?;
            println!("{}", router.render(ActionName::HealthCheck, &result));
            Ok(())
        }

        Commands::Actions => {
            let router = build_email_router(&config).await?;
            for action in router.registry().list() {
                println!("{:<18} {}", action.name().to_string(), action.description());
                if let Some(hint) = action.parameter_hint() {
                    println!("{:<18} params: {hint}", "");
                }
            }
            Ok(())
        }
    }
}
