use crate::support::{Harness, ScriptedProvider, from_partner};
use keel::router::{InboundEmail, REJECTED_REPLY, RouteOutcome};

#[tokio::test]
async fn disallowed_sender_never_reaches_the_oracle() {
    let harness = Harness::new(ScriptedProvider::replying(r#"{"action": "GENERATE_MEMOS"}"#));

    for from in [
        "mallory@evil.io",
        "Nick <nick@friale.com.evil.io>",
        "nick@sub.friale.com",
        "not-an-address",
    ] {
        let reply = harness
            .router
            .handle(&InboundEmail::new(from, "keel@friale.com", "memos", "run memos"))
            .await;
        assert_eq!(reply.outcome, RouteOutcome::Rejected, "{from}");
        assert_eq!(reply.reply_text, REJECTED_REPLY);
    }
    assert_eq!(harness.provider.calls(), 0);
    assert!(harness.sheet.snapshot().is_empty());
}

#[tokio::test]
async fn unknown_intent_lists_commands_and_runs_nothing() {
    let harness = Harness::with_rows(
        ScriptedProvider::replying(r#"{"action": "NONE", "reasoning": "Looks like a lunch invite"}"#),
        &[("Acme", "acme.com", "New")],
    );

    let reply = harness
        .router
        .handle(&from_partner("lunch?", "Are you free Thursday?"))
        .await;
    assert_eq!(reply.outcome, RouteOutcome::NotUnderstood);
    assert!(reply.reply_text.contains("couldn't identify a specific action"));
    assert!(reply.reply_text.contains("Looks like a lunch invite"));
    assert!(reply.reply_text.contains("Generate investment memos"));
    assert_eq!(harness.provider.calls(), 1);
    assert_eq!(harness.sheet.snapshot()[0].status, "New");
}

#[tokio::test]
async fn oracle_outage_still_produces_a_reply() {
    let harness = Harness::new(ScriptedProvider::replying("unused").then_fail("connection reset"));

    let reply = harness
        .router
        .handle(&from_partner("add", "add acme.com"))
        .await;
    assert_eq!(reply.outcome, RouteOutcome::NotUnderstood);
    assert!(!reply.reply_text.is_empty());
}
