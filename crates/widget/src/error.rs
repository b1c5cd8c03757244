use std::path::PathBuf;

use snafu::Snafu;

use crate::message::StatusTransitionRejection;
use crate::visibility::VisibilityRejection;

/// Failures around widget configuration. Widget interactions never produce these.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WidgetError {
    #[snafu(display("failed to extract widget config on `{stage}`: {source}"))]
    ExtractConfig {
        stage: &'static str,
        #[snafu(source(from(figment::Error, Box::new)))]
        source: Box<figment::Error>,
    },
    #[snafu(display("failed to create config directory at {path:?} on `{stage}`: {source}"))]
    CreateConfigDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize widget config on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write widget config at {path:?} on `{stage}`: {source}"))]
    WriteConfig {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace widget config from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameConfig {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

pub type WidgetResult<T> = Result<T, WidgetError>;

/// Why a trigger was declined without touching session state.
///
/// These are UI validation outcomes, not faults: callers are free to drop them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputRejection {
    EmptyName,
    EmptyEmail,
    MalformedEmail,
    EmptyMessage,
    /// The pre-chat gate was already passed for this session.
    FormAlreadyCompleted,
    /// The composer is not rendered until the pre-chat gate is passed.
    FormNotCompleted,
    /// The form or composer is hidden because the panel is closed or minimized.
    PanelHidden,
    Visibility(VisibilityRejection),
    /// Attachment and emoji controls are clickable but have no behavior.
    InertControl,
    Unmounted,
}

impl From<VisibilityRejection> for InputRejection {
    fn from(value: VisibilityRejection) -> Self {
        Self::Visibility(value)
    }
}

/// Why a scheduled task ended up doing nothing when it fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleTask {
    /// The task was scheduled by a session that has since been reset.
    GenerationMismatch,
    MessageMissing,
    Status(StatusTransitionRejection),
}
