use crate::support::{Harness, OfflineLedger, ScriptedProvider, from_partner};
use keel::ActionName;
use std::sync::Arc;

#[tokio::test]
async fn failing_ledger_is_one_unhealthy_entry() {
    let harness = Harness::build(
        ScriptedProvider::replying(r#"{"action": "HEALTH_CHECK"}"#),
        &[],
        Some(Arc::new(OfflineLedger)),
    );

    let reply = harness
        .router
        .handle(&from_partner("status", "health"))
        .await;
    assert_eq!(reply.action, ActionName::HealthCheck);
    assert!(reply.success);
    assert!(reply.reply_text.contains("3 healthy / 1 unhealthy"), "{}", reply.reply_text);
    assert!(reply.reply_text.contains("ledger: UNHEALTHY (ledger unreachable)"));
    assert!(!reply.reply_text.contains("sheet: UNHEALTHY"));
}
