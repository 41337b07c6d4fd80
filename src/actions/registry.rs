use super::name::ActionName;
use super::traits::Action;
use crate::error::ActionError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Frozen name → action mapping. Built once at startup through
/// [`ActionRegistryBuilder`]; there is no way to mutate it afterwards.
pub struct ActionRegistry {
    actions: BTreeMap<ActionName, Arc<dyn Action>>,
}

#[derive(Default)]
pub struct ActionRegistryBuilder {
    actions: BTreeMap<ActionName, Arc<dyn Action>>,
}

impl ActionRegistryBuilder {
    /// Register an action. Two actions under one name, or anything under the
    /// reserved `NONE` name, is a configuration error.
    pub fn register(self, action: impl Action + 'static) -> Result<Self, ActionError> {
        self.register_arc(Arc::new(action))
    }

    pub fn register_arc(mut self, action: Arc<dyn Action>) -> Result<Self, ActionError> {
        let name = action.name();
        if name.is_unknown() {
            return Err(ActionError::ReservedName {
                name: name.to_string(),
            });
        }
        if self.actions.contains_key(&name) {
            return Err(ActionError::DuplicateRegistration {
                name: name.to_string(),
            });
        }
        self.actions.insert(name, action);
        Ok(self)
    }

    pub fn build(self) -> ActionRegistry {
        ActionRegistry {
            actions: self.actions,
        }
    }
}

impl ActionRegistry {
    pub fn builder() -> ActionRegistryBuilder {
        ActionRegistryBuilder::default()
    }

    pub fn get(&self, name: ActionName) -> Option<&Arc<dyn Action>> {
        self.actions.get(&name)
    }

    /// Registered actions in declaration order of [`ActionName`].
    pub fn list(&self) -> impl Iterator<Item = &Arc<dyn Action>> {
        self.actions.values()
    }

    pub fn names(&self) -> Vec<ActionName> {
        self.actions.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// `- NAME: description` lines, used by the classifier prompt and help replies.
    pub fn describe(&self) -> String {
        self.list()
            .map(|action| format!("- {}: {}", action.name(), action.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::result::ActionResult;
    use crate::actions::traits::ActionRequest;
    use async_trait::async_trait;

    struct Stub(ActionName, &'static str);

    #[async_trait]
    impl Action for Stub {
        fn name(&self) -> ActionName {
            self.0
        }

        fn description(&self) -> &str {
            self.1
        }

        async fn execute(&self, _request: &ActionRequest<'_>) -> anyhow::Result<ActionResult> {
            Ok(ActionResult::ok())
        }

        fn format_response(&self, _result: &ActionResult) -> String {
            "done".into()
        }
    }

    #[test]
    fn lookup_and_listing_are_ordered() {
        let registry = ActionRegistry::builder()
            .register(Stub(ActionName::HealthCheck, "check health"))
            .unwrap()
            .register(Stub(ActionName::AddCompany, "add a company"))
            .unwrap()
            .build();

        assert_eq!(registry.len(), 2);
        assert!(registry.get(ActionName::AddCompany).is_some());
        assert!(registry.get(ActionName::ScrapeYc).is_none());
        assert_eq!(
            registry.names(),
            vec![ActionName::AddCompany, ActionName::HealthCheck]
        );
        assert_eq!(
            registry.describe(),
            "- ADD_COMPANY: add a company\n- HEALTH_CHECK: check health"
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let err = ActionRegistry::builder()
            .register(Stub(ActionName::AddCompany, "one"))
            .unwrap()
            .register(Stub(ActionName::AddCompany, "two"))
            .err()
            .unwrap();
        assert!(matches!(err, ActionError::DuplicateRegistration { .. }));
    }

    #[test]
    fn unknown_name_cannot_be_registered() {
        let err = ActionRegistry::builder()
            .register(Stub(ActionName::Unknown, "noop"))
            .err()
            .unwrap();
        assert!(matches!(err, ActionError::ReservedName { .. }));
    }
}
