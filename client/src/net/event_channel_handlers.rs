//! Per-kind event handlers for `event_channel`.
//!
//! Each validated event is routed to exactly one handler. Handlers return
//! `true` when the event was applied or acknowledged and `false` when it
//! referred to state this client does not hold.
//!
//! Assignment, unassignment, closure, campaign progress and generic
//! notifications are acknowledged and logged only; they do not mutate
//! local state.

#[cfg(test)]
#[path = "event_channel_handlers_test.rs"]
mod event_channel_handlers_test;

use crate::net::events::{
    AssignmentPayload, CampaignProgressPayload, ConversationClosedPayload, ErrorPayload, Event, InboundEvent,
    NewConversationPayload, NewMessagePayload, NotificationPayload, ReloadRequiredPayload,
};
use crate::state::Stores;

pub(crate) fn dispatch_event(inbound: InboundEvent, stores: &Stores) -> bool {
    tracing::debug!(
        kind = %inbound.event.kind(),
        conversation_id = inbound.event.conversation_id(),
        user_id = inbound.user_id.as_deref(),
        organization_id = inbound.organization_id.as_deref(),
        "dispatching event"
    );

    match inbound.event {
        Event::NewNotification(payload) => handle_notification(&payload),
        Event::NewMessage(payload) => handle_new_message(payload, stores),
        Event::ChatAssignment(payload) => handle_assignment(&payload, true),
        Event::ChatUnAssignment(payload) => handle_assignment(&payload, false),
        Event::Error(payload) => handle_error(payload, stores),
        Event::ReloadRequired(payload) => handle_reload_required(&payload, stores),
        Event::ConversationClosed(payload) => handle_conversation_closed(&payload),
        Event::NewConversation(payload) => handle_new_conversation(payload, stores),
        Event::CampaignProgress(payload) => handle_campaign_progress(&payload),
    }
}

fn handle_new_message(payload: NewMessagePayload, stores: &Stores) -> bool {
    let NewMessagePayload { conversation_id, message } = payload;
    let message_id = message.unique_id.clone();
    let applied = stores.inbox.update(|inbox| inbox.append_message(&conversation_id, message));
    if applied {
        tracing::debug!(%conversation_id, %message_id, "message appended");
    } else {
        tracing::debug!(%conversation_id, %message_id, "message for conversation not held locally");
    }
    applied
}

fn handle_new_conversation(payload: NewConversationPayload, stores: &Stores) -> bool {
    let conversation_id = payload.conversation.id.clone();
    stores.inbox.update(|inbox| inbox.prepend_conversation(payload.conversation));
    tracing::debug!(%conversation_id, "conversation prepended");
    true
}

fn handle_assignment(payload: &AssignmentPayload, assigned: bool) -> bool {
    tracing::info!(
        conversation_id = %payload.conversation_id,
        assigned_to = payload.assigned_to.as_deref(),
        assigned,
        "chat assignment changed"
    );
    true
}

fn handle_conversation_closed(payload: &ConversationClosedPayload) -> bool {
    tracing::info!(conversation_id = %payload.conversation_id, "conversation closed");
    true
}

fn handle_campaign_progress(payload: &CampaignProgressPayload) -> bool {
    tracing::info!(
        campaign_id = %payload.campaign_id,
        sent = payload.sent,
        delivered = payload.delivered,
        failed = payload.failed,
        total = payload.total,
        "campaign progress"
    );
    true
}

fn handle_notification(payload: &NotificationPayload) -> bool {
    tracing::info!(title = payload.title.as_deref(), message = payload.message.as_deref(), "notification received");
    true
}

fn handle_error(payload: ErrorPayload, stores: &Stores) -> bool {
    tracing::warn!(message = %payload.message, "server pushed error");
    stores.ui.update(|ui| ui.push_notification(payload.message));
    true
}

fn handle_reload_required(payload: &ReloadRequiredPayload, stores: &Stores) -> bool {
    tracing::info!(reason = payload.reason.as_deref(), "server requested reload");
    stores.ui.update(|ui| ui.reload_required = true);
    true
}
