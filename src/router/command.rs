use super::extract::str_field;
use crate::actions::{ActionName, Parameters};
use serde::Serialize;
use serde_json::{Map, Value};

/// Classifier output: which action to run and with what.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub action: ActionName,
    pub parameters: Parameters,
    pub reasoning: Option<String>,
    /// Follow-up run only when `action` succeeds.
    pub also_do: Option<ActionName>,
}

impl Command {
    pub fn new(action: ActionName) -> Self {
        Self {
            action,
            parameters: Parameters::new(),
            reasoning: None,
            also_do: None,
        }
    }

    /// `Unknown` carrying the reason as both reasoning and a `reason` parameter.
    pub fn unknown(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let mut parameters = Parameters::new();
        parameters.insert("reason".into(), Value::String(reason.clone()));
        Self {
            action: ActionName::Unknown,
            parameters,
            reasoning: Some(reason),
            also_do: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Read `{action, reasoning, parameters, also_do}` leniently. Unrecognised
    /// names become `Unknown`; a non-object `parameters` is dropped.
    pub fn from_json(map: &Map<String, Value>) -> Self {
        let action = str_field(map, "action").map_or(ActionName::Unknown, ActionName::parse_lenient);
        let parameters = match map.get("parameters") {
            Some(Value::Object(params)) => params
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => Parameters::new(),
        };
        let also_do = str_field(map, "also_do")
            .map(ActionName::parse_lenient)
            .filter(|name| !name.is_unknown() && *name != action);

        Self {
            action,
            parameters,
            reasoning: str_field(map, "reasoning").map(ToString::to_string),
            also_do,
        }
    }
}
