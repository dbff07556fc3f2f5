use super::*;

fn message(id: &str) -> Message {
    serde_json::from_value(serde_json::json!({"uniqueId": id})).expect("message")
}

fn inbox(ids: &[&str]) -> InboxState {
    let mut state = InboxState::default();
    state.load(ids.iter().map(|id| Conversation::new(*id)).collect());
    state
}

#[test]
fn default_inbox_is_empty() {
    let state = InboxState::default();
    assert!(state.is_empty());
    assert_eq!(state.len(), 0);
}

#[test]
fn append_message_targets_only_matching_conversation() {
    let mut state = inbox(&["c1", "c2"]);
    assert!(state.append_message("c2", message("m1")));

    assert_eq!(state.conversation("c2").expect("c2").messages.len(), 1);
    assert!(state.conversation("c1").expect("c1").messages.is_empty());
}

#[test]
fn append_message_preserves_arrival_order() {
    let mut state = inbox(&["c1"]);
    for id in ["m1", "m2", "m3"] {
        assert!(state.append_message("c1", message(id)));
    }
    let ids: Vec<_> = state.conversation("c1").expect("c1").messages.iter().map(|m| m.unique_id.as_str()).collect();
    assert_eq!(ids, ["m1", "m2", "m3"]);
}

#[test]
fn append_message_to_unknown_conversation_is_a_no_op() {
    let mut state = inbox(&["c1"]);
    let before = state.clone();
    assert!(!state.append_message("missing", message("m1")));
    assert_eq!(state, before);
}

#[test]
fn prepend_conversation_puts_new_record_at_head() {
    let mut state = inbox(&["c1", "c2"]);
    state.prepend_conversation(Conversation::new("c3"));
    let ids: Vec<_> = state.conversations.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["c3", "c1", "c2"]);
}

#[test]
fn prepend_conversation_replaces_existing_record_once() {
    let mut state = inbox(&["c1", "c2"]);
    let mut updated = Conversation::new("c2");
    updated.unread_count = 4;
    state.prepend_conversation(updated);

    let ids: Vec<_> = state.conversations.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["c2", "c1"]);
    assert_eq!(state.conversation("c2").expect("c2").unread_count, 4);
}

#[test]
fn load_replaces_collection() {
    let mut state = inbox(&["c1"]);
    state.load(vec![Conversation::new("c9")]);
    assert!(state.conversation("c1").is_none());
    assert!(state.conversation("c9").is_some());
}
