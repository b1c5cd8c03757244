use serde::Serialize;

use crate::error::StaleTask;
use crate::message::{DeliveryStatus, Message, MessageId, SessionTime};
use crate::prechat::VisitorIdentity;
use crate::visibility::Visibility;

/// Mutable state of one mounted widget.
///
/// Only the controller mutates it; everything public here is a read accessor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetSession {
    visibility: Visibility,
    visitor: Option<VisitorIdentity>,
    messages: Vec<Message>,
    pending_replies: usize,
    unread_count: u32,
    last_message_time: Option<SessionTime>,
    next_message_id: u64,
}

/// Closed-state bubble contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreadPreview {
    pub unread_count: u32,
    pub last_agent_text: Option<String>,
    pub last_message_time: Option<SessionTime>,
}

/// Outcome of an agent message landing in the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AgentArrival {
    pub id: MessageId,
    pub unread_count: Option<u32>,
}

impl WidgetSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_open(&self) -> bool {
        self.visibility.is_open()
    }

    pub fn form_completed(&self) -> bool {
        self.visitor.is_some()
    }

    pub fn visitor(&self) -> Option<&VisitorIdentity> {
        self.visitor.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id() == id)
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// True while at least one simulated reply is still pending.
    pub fn typing(&self) -> bool {
        self.pending_replies > 0
    }

    pub fn pending_replies(&self) -> usize {
        self.pending_replies
    }

    pub fn unread_count(&self) -> u32 {
        self.unread_count
    }

    pub fn last_message_time(&self) -> Option<SessionTime> {
        self.last_message_time
    }

    /// Bubble preview, only meaningful while the panel is closed.
    pub fn preview(&self) -> Option<UnreadPreview> {
        if self.is_open() {
            return None;
        }

        let last_agent_text = self
            .messages
            .iter()
            .rev()
            .find(|message| matches!(message, Message::Agent(_)))
            .map(|message| message.text().to_string());

        Some(UnreadPreview {
            unread_count: self.unread_count,
            last_agent_text,
            last_message_time: self.last_message_time,
        })
    }

    /// Sets visibility; returns the unread count it cleared when this opened the panel.
    pub(crate) fn set_visibility(&mut self, visibility: Visibility) -> Option<u32> {
        let opening = !self.visibility.is_open() && visibility.is_open();
        self.visibility = visibility;

        if opening {
            let cleared = std::mem::take(&mut self.unread_count);
            return Some(cleared);
        }

        None
    }

    pub(crate) fn complete_form(&mut self, visitor: VisitorIdentity) {
        self.visitor = Some(visitor);
    }

    pub(crate) fn push_user(&mut self, text: String, now: SessionTime) -> MessageId {
        let id = self.allocate_id();
        self.messages.push(Message::user_sending(id, text, now));
        self.last_message_time = Some(now);
        id
    }

    pub(crate) fn push_agent(&mut self, text: String, now: SessionTime) -> AgentArrival {
        let id = self.allocate_id();
        self.messages.push(Message::agent(id, text, now));
        self.last_message_time = Some(now);

        let unread_count = if self.is_open() {
            None
        } else {
            self.unread_count = self.unread_count.saturating_add(1);
            Some(self.unread_count)
        };

        AgentArrival { id, unread_count }
    }

    pub(crate) fn advance_status(
        &mut self,
        id: MessageId,
        to: DeliveryStatus,
    ) -> Result<DeliveryStatus, StaleTask> {
        let message = self
            .messages
            .iter_mut()
            .find(|message| message.id() == id)
            .ok_or(StaleTask::MessageMissing)?;

        message.advance_status(to).map_err(StaleTask::Status)
    }

    pub(crate) fn begin_reply(&mut self) {
        self.pending_replies = self.pending_replies.saturating_add(1);
    }

    /// Marks one pending reply as answered; returns true when typing stopped.
    pub(crate) fn finish_reply(&mut self) -> bool {
        let was_typing = self.typing();
        self.pending_replies = self.pending_replies.saturating_sub(1);
        was_typing && !self.typing()
    }

    fn allocate_id(&mut self) -> MessageId {
        self.next_message_id = self.next_message_id.saturating_add(1);
        MessageId::new(self.next_message_id)
    }
}
