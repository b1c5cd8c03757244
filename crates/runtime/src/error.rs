use snafu::Snafu;
use tokio::sync::oneshot;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RuntimeError {
    #[snafu(display("widget task is no longer running on `{stage}`"))]
    WidgetGone { stage: &'static str },
    #[snafu(display("widget task dropped its reply on `{stage}`: {source}"))]
    ReplyDropped {
        stage: &'static str,
        source: oneshot::error::RecvError,
    },
    #[snafu(display("widget task failed to shut down on `{stage}`: {source}"))]
    Join {
        stage: &'static str,
        source: tokio::task::JoinError,
    },
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
