use crate::support::{Harness, ScriptedProvider, from_partner};
use keel::ActionName;
use keel::router::RouteOutcome;

const ADD_ACME: &str =
    r#"{"action": "ADD_COMPANY", "reasoning": "new company", "parameters": {"company": "Acme", "domain": "https://www.Acme.com/about"}}"#;

#[tokio::test]
async fn adding_the_same_company_twice_appends_once() {
    let harness = Harness::new(ScriptedProvider::replying(ADD_ACME));

    let first = harness
        .router
        .handle(&from_partner("New deal", "Please add Acme (acme.com)"))
        .await;
    assert_eq!(first.action, ActionName::AddCompany);
    assert_eq!(first.outcome, RouteOutcome::Completed);
    assert!(first.reply_text.starts_with("Company added"), "{}", first.reply_text);

    let second = harness
        .router
        .handle(&from_partner("New deal", "Please add Acme (acme.com)"))
        .await;
    assert!(second.success);
    assert!(second.reply_text.contains("already exists"), "{}", second.reply_text);

    let rows = harness.sheet.snapshot();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].domain, "acme.com");
    assert_eq!(rows[0].status, "New");
}

#[tokio::test]
async fn invalid_domain_is_a_clean_failure() {
    let harness = Harness::new(ScriptedProvider::replying(
        r#"{"action": "ADD_COMPANY", "parameters": {"company": "Acme", "domain": "not a domain"}}"#,
    ));

    let reply = harness
        .router
        .handle(&from_partner("add", "add Acme please"))
        .await;
    assert_eq!(reply.outcome, RouteOutcome::Failed);
    assert!(reply.reply_text.starts_with("Failed to add company"), "{}", reply.reply_text);
    assert!(harness.sheet.snapshot().is_empty());
}
