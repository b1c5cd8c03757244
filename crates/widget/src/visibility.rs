use serde::{Deserialize, Serialize};

/// Panel visibility for one widget instance.
///
/// `Expanded` and `Minimized` are both "open"; minimization is meaningless while closed,
/// so it is folded into the same enum instead of a separate flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Closed,
    Expanded,
    Minimized,
}

/// Trigger input for the visibility state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisibilityTransition {
    /// Bubble click.
    Open,
    /// Header click.
    ToggleMinimize,
    /// Explicit close control.
    Close,
}

/// Rejection reason for triggers that do not apply to the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityRejection {
    AlreadyOpen,
    NotOpen,
}

pub type VisibilityTransitionResult = Result<Visibility, VisibilityRejection>;

impl Visibility {
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Closed)
    }

    /// True when the panel body (form or thread plus composer) is rendered.
    pub fn shows_body(self) -> bool {
        matches!(self, Self::Expanded)
    }

    /// Applies one transition deterministically.
    pub fn apply(self, transition: VisibilityTransition) -> VisibilityTransitionResult {
        match (self, transition) {
            (Self::Closed, VisibilityTransition::Open) => Ok(Self::Expanded),
            (Self::Expanded | Self::Minimized, VisibilityTransition::Open) => {
                Err(VisibilityRejection::AlreadyOpen)
            }
            (Self::Expanded, VisibilityTransition::ToggleMinimize) => Ok(Self::Minimized),
            (Self::Minimized, VisibilityTransition::ToggleMinimize) => Ok(Self::Expanded),
            (Self::Expanded | Self::Minimized, VisibilityTransition::Close) => Ok(Self::Closed),
            (Self::Closed, VisibilityTransition::ToggleMinimize | VisibilityTransition::Close) => {
                Err(VisibilityRejection::NotOpen)
            }
        }
    }
}
