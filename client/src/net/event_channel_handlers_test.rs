use super::*;
use crate::net::types::{Conversation, Message};

fn message(id: &str, text: &str) -> Message {
    serde_json::from_value(serde_json::json!({"uniqueId": id, "text": text})).expect("message")
}

fn inbound(event: Event) -> InboundEvent {
    InboundEvent { event, user_id: None, organization_id: Some("org-1".to_owned()) }
}

fn seeded(ids: &[&str]) -> Stores {
    let stores = Stores::default();
    stores.inbox.update(|inbox| inbox.load(ids.iter().map(|id| Conversation::new(*id)).collect()));
    stores
}

#[test]
fn new_message_appends_to_known_conversation_once() {
    let stores = seeded(&["c1", "c2"]);
    stores.inbox.update(|inbox| inbox.append_message("c1", message("m0", "earlier")));
    let before_len = stores.inbox.with(|i| i.conversation("c1").expect("c1").messages.len());

    let applied = dispatch_event(
        inbound(Event::NewMessage(NewMessagePayload { conversation_id: "c1".to_owned(), message: message("m1", "hi") })),
        &stores,
    );

    assert!(applied);
    stores.inbox.with(|inbox| {
        let c1 = inbox.conversation("c1").expect("c1");
        assert_eq!(c1.messages.len(), before_len + 1);
        assert_eq!(c1.messages.last().map(|m| m.unique_id.as_str()), Some("m1"));
        assert!(inbox.conversation("c2").expect("c2").messages.is_empty());
    });
}

#[test]
fn new_message_for_unknown_conversation_changes_nothing() {
    let stores = seeded(&["c1"]);
    let before = stores.inbox.get();

    let applied = dispatch_event(
        inbound(Event::NewMessage(NewMessagePayload { conversation_id: "zz".to_owned(), message: message("m1", "hi") })),
        &stores,
    );

    assert!(!applied);
    assert_eq!(stores.inbox.get(), before);
}

#[test]
fn new_conversation_lands_at_head_once() {
    let stores = seeded(&["c1", "c2"]);
    for _ in 0..2 {
        let applied = dispatch_event(
            inbound(Event::NewConversation(NewConversationPayload { conversation: Conversation::new("c3") })),
            &stores,
        );
        assert!(applied);
    }

    let ids: Vec<String> = stores.inbox.with(|i| i.conversations.iter().map(|c| c.id.clone()).collect());
    assert_eq!(ids, ["c3", "c1", "c2"]);
}

#[test]
fn error_event_raises_exactly_one_notification() {
    let stores = Stores::default();
    let applied = dispatch_event(inbound(Event::Error(ErrorPayload { message: "boom".to_owned() })), &stores);

    assert!(applied);
    let ui = stores.ui.get();
    assert_eq!(ui.notifications.len(), 1);
    assert_eq!(ui.notifications[0].message, "boom");
}

#[test]
fn reload_required_sets_flag() {
    let stores = Stores::default();
    assert!(dispatch_event(inbound(Event::ReloadRequired(ReloadRequiredPayload::default())), &stores));
    assert!(stores.ui.with(|ui| ui.reload_required));
}

#[test]
fn shallow_kinds_are_acknowledged_without_mutation() {
    let stores = seeded(&["c1"]);
    let inbox_before = stores.inbox.get();
    let ui_before = stores.ui.get();

    let events = [
        Event::ChatAssignment(AssignmentPayload { conversation_id: "c1".to_owned(), assigned_to: Some("a1".to_owned()) }),
        Event::ChatUnAssignment(AssignmentPayload { conversation_id: "c1".to_owned(), assigned_to: None }),
        Event::ConversationClosed(ConversationClosedPayload { conversation_id: "c1".to_owned() }),
        Event::CampaignProgress(CampaignProgressPayload {
            campaign_id: "cmp-1".to_owned(),
            sent: 1,
            delivered: 1,
            failed: 0,
            total: 2,
        }),
        Event::NewNotification(NotificationPayload { title: Some("t".to_owned()), message: Some("m".to_owned()) }),
    ];
    for event in events {
        assert!(dispatch_event(inbound(event), &stores));
    }

    assert_eq!(stores.inbox.get(), inbox_before);
    assert_eq!(stores.ui.get(), ui_before);
}
