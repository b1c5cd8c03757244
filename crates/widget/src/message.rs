use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Milliseconds elapsed since the widget was mounted.
///
/// The core never reads a wall clock; whoever drives the controller decides what "now" is.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionTime(pub u64);

impl SessionTime {
    pub const ZERO: Self = Self(0);

    /// Converts an elapsed duration, saturating at `u64::MAX` milliseconds.
    pub fn from_duration(elapsed: Duration) -> Self {
        Self(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
    }

    pub const fn as_duration(self) -> Duration {
        Duration::from_millis(self.0)
    }

    /// Returns the instant `delay` after this one.
    pub fn after(self, delay: Duration) -> Self {
        Self(self.0.saturating_add(Self::from_duration(delay).0))
    }
}

impl fmt::Display for SessionTime {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}ms", self.0)
    }
}

/// Stable identifier for one message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "msg-{}", self.0)
    }
}

/// Which side of the conversation produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Agent,
}

/// Simulated transport progress of a visitor message.
///
/// Variants are declared in progression order so `Ord` matches the lifecycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Delivered,
}

impl DeliveryStatus {
    /// Returns the status that directly follows this one, if any.
    pub const fn successor(self) -> Option<Self> {
        match self {
            Self::Sending => Some(Self::Sent),
            Self::Sent => Some(Self::Delivered),
            Self::Delivered => None,
        }
    }

    /// Applies one status step.
    ///
    /// Only the direct successor is accepted; anything else leaves the status untouched.
    pub fn advance_to(self, next: Self) -> StatusTransitionResult {
        if next <= self {
            return Err(StatusTransitionRejection::Regression {
                current: self,
                attempted: next,
            });
        }

        match self.successor() {
            Some(successor) if successor == next => Ok(next),
            _ => Err(StatusTransitionRejection::Skip {
                current: self,
                attempted: next,
            }),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
        };
        formatter.write_str(label)
    }
}

/// Rejection reason for illegal delivery status steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransitionRejection {
    Regression {
        current: DeliveryStatus,
        attempted: DeliveryStatus,
    },
    Skip {
        current: DeliveryStatus,
        attempted: DeliveryStatus,
    },
    /// Agent messages have no delivery lifecycle.
    NotAUserMessage,
}

pub type StatusTransitionResult = Result<DeliveryStatus, StatusTransitionRejection>;

/// Message typed by the visitor in the composer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    pub id: MessageId,
    pub text: String,
    pub sent_at: SessionTime,
    pub status: DeliveryStatus,
}

/// Message produced by the simulated agent side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: MessageId,
    pub text: String,
    pub sent_at: SessionTime,
}

/// One entry in the conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "sender", rename_all = "snake_case")]
pub enum Message {
    User(UserMessage),
    Agent(AgentMessage),
}

impl Message {
    /// Creates a visitor message that has not left the composer yet.
    pub fn user_sending(id: MessageId, text: impl Into<String>, sent_at: SessionTime) -> Self {
        Self::User(UserMessage {
            id,
            text: text.into(),
            sent_at,
            status: DeliveryStatus::Sending,
        })
    }

    pub fn agent(id: MessageId, text: impl Into<String>, sent_at: SessionTime) -> Self {
        Self::Agent(AgentMessage {
            id,
            text: text.into(),
            sent_at,
        })
    }

    pub fn id(&self) -> MessageId {
        match self {
            Self::User(message) => message.id,
            Self::Agent(message) => message.id,
        }
    }

    pub fn sender(&self) -> Sender {
        match self {
            Self::User(_) => Sender::User,
            Self::Agent(_) => Sender::Agent,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::User(message) => &message.text,
            Self::Agent(message) => &message.text,
        }
    }

    pub fn sent_at(&self) -> SessionTime {
        match self {
            Self::User(message) => message.sent_at,
            Self::Agent(message) => message.sent_at,
        }
    }

    /// Delivery status, present only for visitor messages.
    pub fn status(&self) -> Option<DeliveryStatus> {
        match self {
            Self::User(message) => Some(message.status),
            Self::Agent(_) => None,
        }
    }

    /// Moves a visitor message one step along its delivery lifecycle.
    pub fn advance_status(&mut self, next: DeliveryStatus) -> StatusTransitionResult {
        match self {
            Self::User(message) => {
                message.status = message.status.advance_to(next)?;
                Ok(message.status)
            }
            Self::Agent(_) => Err(StatusTransitionRejection::NotAUserMessage),
        }
    }
}
