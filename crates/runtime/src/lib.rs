#![deny(unsafe_code)]

/// Runtime errors surfaced to callers of [`WidgetHandle`].
pub mod error;
/// One tokio task per mounted widget, driving timers on the runtime clock.
pub mod widget;

pub use error::{RuntimeError, RuntimeResult};
pub use widget::{CHANGE_BUFFER, COMMAND_BUFFER, WidgetHandle};
