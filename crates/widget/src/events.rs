use serde::Serialize;

use crate::error::InputRejection;
use crate::message::{DeliveryStatus, MessageId, Sender, SessionTime};
use crate::prechat::{PreChatForm, VisitorIdentity};
use crate::visibility::Visibility;

/// Interaction coming from the page hosting the widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
    /// Floating bubble, shown only while closed.
    BubbleClicked,
    /// Panel header; toggles minimization.
    HeaderClicked,
    CloseClicked,
    PreChatSubmitted(PreChatForm),
    ComposerChanged(String),
    SendClicked,
    EnterPressed { shift: bool },
    AttachmentClicked,
    EmojiClicked,
}

/// What an accepted event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventApplied {
    Visibility(Visibility),
    FormCompleted { welcome_id: MessageId },
    ComposerUpdated,
    NewlineInserted,
    MessageSent(MessageId),
}

pub type DispatchResult = Result<EventApplied, InputRejection>;

/// State change notification delivered to subscribed listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetChange {
    VisibilityChanged {
        visibility: Visibility,
    },
    FormCompleted {
        visitor: VisitorIdentity,
    },
    MessageAppended {
        id: MessageId,
        sender: Sender,
        sent_at: SessionTime,
    },
    StatusAdvanced {
        id: MessageId,
        status: DeliveryStatus,
    },
    TypingChanged {
        typing: bool,
    },
    UnreadChanged {
        unread_count: u32,
    },
    /// The conversation was discarded and a new generation started.
    SessionReset,
    Unmounted,
}
