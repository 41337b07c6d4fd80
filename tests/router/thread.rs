use crate::support::{Harness, ScriptedProvider, from_partner};
use keel::ActionName;
use keel::collaborators::RelationshipStore;

// Three messages quoted newest first, each stamped in its body.
const FORWARDED: &str = "See below, worth a look.\n\n\
---------- Forwarded message ---------\n\
From: Jane Roe <jane@acme.com>\n\
Date: Thu, 13 Mar 2025 16:20:00 +0000\n\
Subject: Re: Acme x Friale\n\
\n\
[2025-03-13 16:20 UTC] Deck attached, talk Monday.\n\
\n\
---------- Forwarded message ---------\n\
From: Priya Shah <priya@acme.com>\n\
Date: Tue, 11 Mar 2025 10:45:00 +0000\n\
Subject: Re: Acme x Friale\n\
\n\
[2025-03-11 10:45 UTC] Happy to share our metrics once the deck is ready.\n\
\n\
---------- Forwarded message ---------\n\
From: Sam Lee <sam@gmail.com>\n\
Date: Mon, 10 Mar 2025 08:05:00 +0000\n\
Subject: Acme x Friale\n\
\n\
[2025-03-10 08:05 UTC] Nick, introducing you to Jane, CEO of Acme.\n";

// Events come back out of order; the timeline must still read oldest first.
const ANALYSIS: &str = r#"```json
{
  "company_name": "Acme",
  "introducer": {"name": "Sam Lee", "context": "angel investor"},
  "timeline": [
    {"date": "March 13, 2025", "event": "Jane sends the deck"},
    {"date": "March 10, 2025", "event": "Sam introduces Jane"},
    {"date": "March 11, 2025", "event": "Priya offers metrics"}
  ],
  "summary": "Intro from Sam; metrics offered; deck received."
}
```"#;

#[tokio::test]
async fn forwarded_thread_yields_a_chronological_timeline() {
    let harness = Harness::new(ScriptedProvider::replying(ANALYSIS));

    let reply = harness
        .router
        .handle(&from_partner("Fwd: Acme x Friale", FORWARDED))
        .await;
    assert_eq!(reply.action, ActionName::AnalyzeThread);
    assert!(reply.success, "{}", reply.reply_text);
    // The forwarded-thread pre-filter skips classification.
    assert_eq!(harness.provider.calls(), 1);

    let text = &reply.reply_text;
    assert!(text.contains("1. **March 10, 2025**: Sam introduces Jane"), "{text}");
    assert!(text.contains("2. **March 11, 2025**: Priya offers metrics"), "{text}");
    assert!(text.contains("3. **March 13, 2025**: Jane sends the deck"), "{text}");

    let stored = harness
        .relationships
        .get("acme.com")
        .await
        .unwrap()
        .expect("relationship stored under the company domain");
    assert_eq!(stored.messages.len(), 3);
    let events: Vec<&str> = stored.timeline.iter().map(|e| e.event.as_str()).collect();
    assert_eq!(
        events,
        ["Sam introduces Jane", "Priya offers metrics", "Jane sends the deck"]
    );
    assert_eq!(harness.documents.document_count(), 1);
}
