#![deny(unsafe_code)]

//! Headless core of the ChatSaaS embeddable chat widget.
//!
//! The controller owns visibility, the pre-chat gate, the simulated thread and the unread
//! counter. It has no clock and no renderer: the host reports elapsed time and reads state
//! back through snapshots or change listeners.

pub mod composer;
/// Widget options, layered from defaults, a JSON file and the environment.
pub mod config;
pub mod controller;
/// Loader snippet for embedding the widget on third-party pages.
pub mod embed;
pub mod error;
/// Page interactions in, state change notifications out.
pub mod events;
/// Message entities and delivery status lifecycle.
pub mod message;
pub mod prechat;
pub mod scheduler;
pub mod session;
pub mod visibility;

pub use composer::{Composer, EnterAction};
pub use config::{WidgetConfig, WidgetPosition, WidgetTimings};
pub use controller::{ChangeListener, WidgetController, WidgetSnapshot};
pub use embed::{DEFAULT_SCRIPT_URL, render_snippet};
pub use error::{InputRejection, StaleTask, WidgetError, WidgetResult};
pub use events::{DispatchResult, EventApplied, WidgetChange, WidgetEvent};
pub use message::{
    AgentMessage, DeliveryStatus, Message, MessageId, Sender, SessionTime,
    StatusTransitionRejection, UserMessage,
};
pub use prechat::{PreChatForm, VisitorIdentity};
pub use scheduler::{Generation, ScheduledTask, TaskId, TaskKind, TaskQueue};
pub use session::{UnreadPreview, WidgetSession};
pub use visibility::{Visibility, VisibilityRejection, VisibilityTransition};
