use clap::{Parser, Subcommand};

/// `Keel` - email-driven deal-flow agent.
#[derive(Parser, Debug)]
#[command(name = "keel")]
#[command(version)]
#[command(
    about = "Routes inbound emails to deal-flow actions: memos, sheet updates, thread timelines.",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP gateway (POST /email, POST /run, GET /health)
    Serve {
        /// Port to listen on (defaults to gateway.port; 0 picks a free port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to gateway.host)
        #[arg(long)]
        host: Option<String>,
    },

    /// Generate memos for every unprocessed row in the sheet
    Run {
        /// Regenerate memos for all rows, even processed ones
        #[arg(long)]
        force: bool,
    },

    /// Route a single email from the command line and print the reply
    Email {
        /// Sender, e.g. "Nick <nick@friale.com>"
        #[arg(long)]
        from: String,

        #[arg(long, default_value = "")]
        subject: String,

        #[arg(long, default_value = "")]
        body: String,
    },

    /// Poll the inbox, answer unread requests and archive them
    Poll {
        /// Sweep once and exit
        #[arg(long)]
        once: bool,
    },

    /// Probe the sheet, ledger, document store and language model
    Health,

    /// List the actions the router can dispatch to
    Actions,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_has_no_flag_conflicts() {
        Cli::command().debug_assert();
    }

    #[test]
    fn email_subcommand_parses() {
        let cli = Cli::parse_from([
            "keel", "email", "--from", "nick@friale.com", "--subject", "add", "--body", "acme.com",
        ]);
        match cli.command {
            Commands::Email { from, subject, body } => {
                assert_eq!(from, "nick@friale.com");
                assert_eq!(subject, "add");
                assert_eq!(body, "acme.com");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_force_defaults_off() {
        let cli = Cli::parse_from(["keel", "run"]);
        assert!(matches!(cli.command, Commands::Run { force: false }));
    }
}
