use chatsaas_widget::{
    DispatchResult, SessionTime, UnreadPreview, WidgetChange, WidgetConfig, WidgetController,
    WidgetEvent, WidgetSnapshot,
};
use snafu::ResultExt;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{JoinSnafu, ReplyDroppedSnafu, RuntimeError, RuntimeResult};

pub const COMMAND_BUFFER: usize = 64;
/// Slow subscribers past this many changes observe `RecvError::Lagged`.
pub const CHANGE_BUFFER: usize = 256;

enum Command {
    Dispatch {
        event: WidgetEvent,
        reply: oneshot::Sender<DispatchResult>,
    },
    Snapshot {
        reply: oneshot::Sender<WidgetSnapshot>,
    },
    Preview {
        reply: oneshot::Sender<Option<UnreadPreview>>,
    },
    Reset {
        reply: oneshot::Sender<usize>,
    },
    Unmount {
        reply: oneshot::Sender<usize>,
    },
}

/// Owner handle of a widget running on its own task.
///
/// Every mutation goes through the task's command queue, so the controller only ever has
/// one writer. Dropping the handle unmounts the widget.
pub struct WidgetHandle {
    commands: mpsc::Sender<Command>,
    changes: broadcast::Sender<WidgetChange>,
    task: Option<JoinHandle<()>>,
}

impl WidgetHandle {
    /// Mounts a widget and spawns its task on the current tokio runtime.
    pub fn spawn(config: WidgetConfig) -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);

        let mut controller = WidgetController::mount(config);
        let publisher = changes.clone();
        controller.subscribe(move |change| {
            // No subscribers is fine; changes are fire-and-forget.
            let _ = publisher.send(change.clone());
        });

        let task = tokio::spawn(run_widget(controller, receiver, Instant::now()));

        Self {
            commands,
            changes,
            task: Some(task),
        }
    }

    /// Receives every change emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<WidgetChange> {
        self.changes.subscribe()
    }

    pub async fn dispatch(&self, event: WidgetEvent) -> RuntimeResult<DispatchResult> {
        self.request("dispatch-event", |reply| Command::Dispatch { event, reply })
            .await
    }

    pub async fn snapshot(&self) -> RuntimeResult<WidgetSnapshot> {
        self.request("read-snapshot", |reply| Command::Snapshot { reply })
            .await
    }

    pub async fn preview(&self) -> RuntimeResult<Option<UnreadPreview>> {
        self.request("read-preview", |reply| Command::Preview { reply })
            .await
    }

    /// Starts a new conversation; returns the number of cancelled tasks.
    pub async fn reset(&self) -> RuntimeResult<usize> {
        self.request("reset-session", |reply| Command::Reset { reply })
            .await
    }

    /// Cancels pending timers and stops the task; returns the number of cancelled tasks.
    pub async fn unmount(&mut self) -> RuntimeResult<usize> {
        let cancelled = self
            .request("unmount-widget", |reply| Command::Unmount { reply })
            .await?;

        if let Some(task) = self.task.take() {
            task.await.context(JoinSnafu {
                stage: "join-widget-task",
            })?;
        }
        Ok(cancelled)
    }

    async fn request<T>(
        &self,
        stage: &'static str,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> RuntimeResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| RuntimeError::WidgetGone { stage })?;

        response.await.context(ReplyDroppedSnafu { stage })
    }
}

async fn run_widget(
    mut controller: WidgetController,
    mut commands: mpsc::Receiver<Command>,
    mounted_at: Instant,
) {
    loop {
        let deadline = controller
            .next_deadline()
            .map(|due_at| mounted_at + due_at.as_duration());

        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                controller.advance_to(elapsed_since(mounted_at));
                if !handle_command(&mut controller, command) {
                    break;
                }
            }
            () = wait_until(deadline) => {
                let fired = controller.advance_to(elapsed_since(mounted_at));
                tracing::trace!(fired, "widget timers fired");
            }
        }
    }

    // Covers the handle being dropped without an explicit unmount.
    controller.unmount();
}

/// Applies one command; returns false once the widget has been unmounted.
fn handle_command(controller: &mut WidgetController, command: Command) -> bool {
    match command {
        Command::Dispatch { event, reply } => {
            let _ = reply.send(controller.dispatch(event));
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(controller.snapshot());
        }
        Command::Preview { reply } => {
            let _ = reply.send(controller.preview());
        }
        Command::Reset { reply } => {
            let _ = reply.send(controller.reset());
        }
        Command::Unmount { reply } => {
            let _ = reply.send(controller.unmount());
            return false;
        }
    }
    true
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn elapsed_since(mounted_at: Instant) -> SessionTime {
    SessionTime::from_duration(Instant::now().saturating_duration_since(mounted_at))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chatsaas_widget::{
        DeliveryStatus, EventApplied, InputRejection, MessageId, PreChatForm, Sender, Visibility,
    };

    use super::*;

    async fn chatting() -> WidgetHandle {
        let widget = WidgetHandle::spawn(WidgetConfig::default());
        widget
            .dispatch(WidgetEvent::BubbleClicked)
            .await
            .expect("widget running")
            .expect("open");
        widget
            .dispatch(WidgetEvent::PreChatSubmitted(PreChatForm::new(
                "Ana",
                "ana@x.com",
            )))
            .await
            .expect("widget running")
            .expect("submit form");
        widget
    }

    async fn send(widget: &WidgetHandle, text: &str) -> MessageId {
        widget
            .dispatch(WidgetEvent::ComposerChanged(text.to_string()))
            .await
            .expect("widget running")
            .expect("type");
        match widget
            .dispatch(WidgetEvent::SendClicked)
            .await
            .expect("widget running")
        {
            Ok(EventApplied::MessageSent(id)) => id,
            other => panic!("unexpected send outcome: {other:?}"),
        }
    }

    async fn status_of(widget: &WidgetHandle, id: MessageId) -> Option<DeliveryStatus> {
        widget
            .snapshot()
            .await
            .expect("snapshot")
            .messages
            .iter()
            .find(|message| message.id() == id)
            .and_then(|message| message.status())
    }

    #[tokio::test(start_paused = true)]
    async fn timers_follow_the_runtime_clock() {
        let widget = chatting().await;
        let id = send(&widget, "Oi").await;

        assert_eq!(status_of(&widget, id).await, Some(DeliveryStatus::Sending));
        let snapshot = widget.snapshot().await.expect("snapshot");
        assert!(snapshot.typing);
        assert_eq!(snapshot.pending_replies, 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(status_of(&widget, id).await, Some(DeliveryStatus::Sent));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(status_of(&widget, id).await, Some(DeliveryStatus::Delivered));

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        let snapshot = widget.snapshot().await.expect("snapshot");
        assert!(!snapshot.typing);
        assert_eq!(snapshot.pending_replies, 0);
        assert_eq!(snapshot.messages.len(), 3);
        assert_eq!(
            snapshot.messages.last().map(|message| message.sender()),
            Some(Sender::Agent)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_observe_unread_while_closed() {
        let widget = chatting().await;
        let mut changes = widget.subscribe();

        send(&widget, "Oi").await;
        widget
            .dispatch(WidgetEvent::CloseClicked)
            .await
            .expect("widget running")
            .expect("close");
        tokio::time::sleep(Duration::from_millis(2_000)).await;

        let preview = widget.preview().await.expect("preview").expect("closed");
        assert_eq!(preview.unread_count, 1);

        let mut saw_unread = false;
        while let Ok(change) = changes.try_recv() {
            if change == (WidgetChange::UnreadChanged { unread_count: 1 }) {
                saw_unread = true;
            }
        }
        assert!(saw_unread);

        let reopened = widget
            .dispatch(WidgetEvent::BubbleClicked)
            .await
            .expect("widget running");
        assert_eq!(reopened, Ok(EventApplied::Visibility(Visibility::Expanded)));
        assert_eq!(widget.snapshot().await.expect("snapshot").unread_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_cancels_pending_timers() {
        let mut widget = chatting().await;
        send(&widget, "Oi").await;

        assert_eq!(widget.unmount().await.expect("unmount"), 3);
        assert!(matches!(
            widget.dispatch(WidgetEvent::BubbleClicked).await,
            Err(RuntimeError::WidgetGone { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_discards_conversation() {
        let widget = chatting().await;
        send(&widget, "Oi").await;

        assert_eq!(widget.reset().await.expect("reset"), 3);
        tokio::time::sleep(Duration::from_secs(3)).await;

        let snapshot = widget.snapshot().await.expect("snapshot");
        assert!(snapshot.messages.is_empty());
        assert!(!snapshot.form_completed);
        assert_eq!(
            widget
                .dispatch(WidgetEvent::SendClicked)
                .await
                .expect("widget running"),
            Err(InputRejection::FormNotCompleted)
        );
    }
}
