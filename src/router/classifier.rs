use super::command::Command;
use super::email::InboundEmail;
use super::extract::extract_json_object;
use crate::actions::thread::is_forward_delimiter;
use crate::actions::{ActionName, ActionRegistry};
use crate::providers::Oracle;
use std::fmt::Write as _;

const BODY_PROMPT_CHARS: usize = 3000;
pub const DEFAULT_CLASSIFY_TEMPERATURE: f64 = 0.1;

/// Maps an email to a `Command` by asking the oracle, with a pre-filter that
/// sends forwarded threads straight to thread analysis.
#[derive(Clone)]
pub struct IntentClassifier {
    oracle: Oracle,
    temperature: f64,
    thread_heuristic: bool,
}

impl IntentClassifier {
    pub fn new(oracle: Oracle) -> Self {
        Self {
            oracle,
            temperature: DEFAULT_CLASSIFY_TEMPERATURE,
            thread_heuristic: true,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_thread_heuristic(mut self, enabled: bool) -> Self {
        self.thread_heuristic = enabled;
        self
    }

    /// Never fails: oracle errors and unreadable output come back as `Unknown`.
    pub async fn classify(&self, registry: &ActionRegistry, email: &InboundEmail) -> Command {
        if self.thread_heuristic
            && registry.get(ActionName::AnalyzeThread).is_some()
            && looks_like_forwarded_thread(&email.body)
            && !subject_names_command(registry, &email.subject)
        {
            tracing::debug!("forwarded thread detected, skipping classification");
            return Command::new(ActionName::AnalyzeThread)
                .with_reasoning("Forwarded email thread detected");
        }

        let prompt = build_prompt(registry, email);
        let reply = match self.oracle.generate_with(&prompt, self.temperature).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("classification failed: {e:#}");
                return Command::unknown("I had trouble understanding that request.");
            }
        };

        let Some(decision) = extract_json_object(&reply) else {
            tracing::warn!(reply_chars = reply.len(), "classifier reply had no JSON object");
            return Command::unknown("The request could not be interpreted.");
        };
        let command = Command::from_json(&decision);
        if !command.action.is_unknown() && registry.get(command.action).is_none() {
            return Command::unknown(format!("{} is not available here.", command.action));
        }
        command
    }
}

/// A forward delimiter anywhere in the body, or at least two `On ... wrote:`
/// attributions. A single attribution is an ordinary reply.
pub fn looks_like_forwarded_thread(body: &str) -> bool {
    let mut attributions = 0;
    for line in body.lines() {
        let line = line.trim_start_matches(['>', ' ']).trim();
        if is_forward_delimiter(line) {
            return true;
        }
        if line.starts_with("On ") && line.ends_with("wrote:") {
            attributions += 1;
        }
    }
    attributions >= 2
}

fn subject_names_command(registry: &ActionRegistry, subject: &str) -> bool {
    let subject = subject.to_uppercase().replace([' ', '-'], "_");
    registry
        .names()
        .into_iter()
        .filter(|name| *name != ActionName::AnalyzeThread)
        .any(|name| subject.contains(name.as_ref()))
}

fn truncate_chars(text: &str, max: usize) -> &str {
    text.char_indices().nth(max).map_or(text, |(i, _)| &text[..i])
}

pub fn build_prompt(registry: &ActionRegistry, email: &InboundEmail) -> String {
    let from = if email.from.is_empty() {
        "Unknown"
    } else {
        email.from.as_str()
    };
    let subject = if email.subject.is_empty() {
        "No subject"
    } else {
        email.subject.as_str()
    };

    let mut prompt = format!(
        "You are Keel, an AI assistant that processes emails and takes actions for a venture capital firm.\n\n\
         Available actions:\n{actions}\n- {none}: No action needed - not a valid command or unclear request\n\n\
         Email:\nFrom: {from}\nSubject: {subject}\nBody:\n{body}\n\n\
         The email may contain earlier Keel replies and the user's corrections to them. \
         If the user corrects information Keel already recorded (\"Actually the domain is ...\"), \
         use UPDATE_COMPANY rather than ADD_COMPANY. Take company names from the main body, not from signatures.\n\n\
         Parameters per action:\n",
        actions = registry.describe(),
        none = ActionName::Unknown,
        body = truncate_chars(&email.body, BODY_PROMPT_CHARS),
    );
    for action in registry.list() {
        let hint = action.parameter_hint().unwrap_or("{}");
        let _ = writeln!(prompt, "- {}: {hint}", action.name());
    }
    prompt.push_str(
        "\nRespond with JSON only (no markdown):\n\
         {\"action\": \"ACTION_NAME\", \"reasoning\": \"Brief explanation\", \"parameters\": {}, \"also_do\": null}\n\
         `also_do` is an optional second action to run after the first succeeds.",
    );
    prompt
}
