use crate::support::{Harness, ScriptedProvider, from_partner};
use keel::ActionName;

const ROWS: [(&str, &str, &str); 5] = [
    ("Acme", "acme.com", "New"),
    ("Globex", "globex.io", ""),
    ("Initech", "initech.com", "New"),
    ("Umbrella", "umbrella.co", "New"),
    ("Hooli", "hooli.xyz", ""),
];

#[tokio::test]
async fn one_failing_row_does_not_abort_the_batch() {
    let provider = ScriptedProvider::replying("A thorough memo.")
        .then(r#"{"action": "GENERATE_MEMOS", "parameters": {"force": false}}"#)
        .then("Memo one")
        .then("Memo two")
        .then_fail("model overloaded");
    let harness = Harness::with_rows(provider, &ROWS);

    let reply = harness
        .router
        .handle(&from_partner("memos", "run the memos please"))
        .await;
    assert_eq!(reply.action, ActionName::GenerateMemos);
    assert!(reply.success);
    assert!(reply.reply_text.contains("- Memos created: 4"), "{}", reply.reply_text);
    assert!(reply.reply_text.contains("- Errors: 1"));

    let statuses: Vec<String> = harness
        .sheet
        .snapshot()
        .into_iter()
        .map(|row| row.status)
        .collect();
    assert_eq!(
        statuses,
        ["Memo Created", "Memo Created", "Error", "Memo Created", "Memo Created"]
    );
    assert_eq!(harness.documents.document_count(), 4);
}

#[tokio::test]
async fn second_run_skips_processed_rows() {
    let provider = ScriptedProvider::replying("memo text")
        .then(r#"{"action": "GENERATE_MEMOS"}"#);
    let harness = Harness::with_rows(provider, &ROWS[..2]);

    let first = harness.router.handle(&from_partner("memos", "go")).await;
    assert!(first.reply_text.contains("- Memos created: 2"));

    let again = harness
        .router
        .run_action(ActionName::GenerateMemos, &keel::actions::Parameters::new())
        .await
        .unwrap();
    assert_eq!(again.count("attempted"), 0);
    assert!(
        harness
            .router
            .render(ActionName::GenerateMemos, &again)
            .starts_with("No new companies to process.")
    );
}

#[tokio::test]
async fn failed_row_is_picked_up_by_the_next_run() {
    let provider = ScriptedProvider::replying("A thorough memo.")
        .then(r#"{"action": "GENERATE_MEMOS"}"#)
        .then("Memo one")
        .then("Memo two")
        .then_fail("model overloaded");
    let harness = Harness::with_rows(provider, &ROWS);

    let first = harness.router.handle(&from_partner("memos", "go")).await;
    assert!(first.reply_text.contains("- Errors: 1"), "{}", first.reply_text);
    assert_eq!(harness.sheet.snapshot()[2].status, "Error");

    let again = harness
        .router
        .run_action(ActionName::GenerateMemos, &keel::actions::Parameters::new())
        .await
        .unwrap();
    assert_eq!(again.count("attempted"), 1);
    assert_eq!(again.count("processed"), 1);
    assert_eq!(again.count("errors"), 0);
    assert_eq!(harness.sheet.snapshot()[2].status, "Memo Created");
    assert_eq!(harness.documents.document_count(), 5);
}
