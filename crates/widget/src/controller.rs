use std::time::Duration;

use serde::Serialize;

use crate::composer::{Composer, EnterAction};
use crate::config::WidgetConfig;
use crate::error::{InputRejection, StaleTask};
use crate::events::{DispatchResult, EventApplied, WidgetChange, WidgetEvent};
use crate::message::{DeliveryStatus, Message, MessageId, Sender, SessionTime};
use crate::prechat::{PreChatForm, VisitorIdentity};
use crate::scheduler::{Generation, ScheduledTask, TaskKind, TaskQueue};
use crate::session::{UnreadPreview, WidgetSession};
use crate::visibility::{Visibility, VisibilityTransition};

pub type ChangeListener = Box<dyn FnMut(&WidgetChange) + Send>;

/// Serializable copy of everything a renderer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetSnapshot {
    pub now: SessionTime,
    pub visibility: Visibility,
    pub form_completed: bool,
    pub visitor: Option<VisitorIdentity>,
    pub messages: Vec<Message>,
    pub typing: bool,
    pub pending_replies: usize,
    pub unread_count: u32,
    pub last_message_time: Option<SessionTime>,
    pub composer_text: String,
}

/// Owns one widget session and every transition applied to it.
///
/// The controller never reads a clock. Callers report elapsed time through
/// [`WidgetController::advance_to`], which fires due tasks in deadline order.
pub struct WidgetController {
    config: WidgetConfig,
    session: WidgetSession,
    composer: Composer,
    tasks: TaskQueue,
    generation: Generation,
    now: SessionTime,
    mounted: bool,
    listeners: Vec<ChangeListener>,
}

impl WidgetController {
    pub fn mount(config: WidgetConfig) -> Self {
        let config = config.normalized();
        tracing::info!(
            company_name = %config.company_name,
            position = config.position.as_str(),
            "chat widget mounted"
        );

        Self {
            config,
            session: WidgetSession::new(),
            composer: Composer::new(),
            tasks: TaskQueue::new(),
            generation: Generation::default(),
            now: SessionTime::ZERO,
            mounted: true,
            listeners: Vec::new(),
        }
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn session(&self) -> &WidgetSession {
        &self.session
    }

    pub fn composer_text(&self) -> &str {
        self.composer.text()
    }

    pub fn now(&self) -> SessionTime {
        self.now
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn next_deadline(&self) -> Option<SessionTime> {
        self.tasks.next_deadline()
    }

    pub fn preview(&self) -> Option<UnreadPreview> {
        self.session.preview()
    }

    pub fn snapshot(&self) -> WidgetSnapshot {
        WidgetSnapshot {
            now: self.now,
            visibility: self.session.visibility(),
            form_completed: self.session.form_completed(),
            visitor: self.session.visitor().cloned(),
            messages: self.session.messages().to_vec(),
            typing: self.session.typing(),
            pending_replies: self.session.pending_replies(),
            unread_count: self.session.unread_count(),
            last_message_time: self.session.last_message_time(),
            composer_text: self.composer.text().to_string(),
        }
    }

    /// Registers a listener that receives every state change from now on.
    pub fn subscribe(&mut self, listener: impl FnMut(&WidgetChange) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Routes one page interaction to its handler.
    pub fn dispatch(&mut self, event: WidgetEvent) -> DispatchResult {
        let result = match event {
            WidgetEvent::BubbleClicked => self.open().map(EventApplied::Visibility),
            WidgetEvent::HeaderClicked => self.toggle_minimize().map(EventApplied::Visibility),
            WidgetEvent::CloseClicked => self.close().map(EventApplied::Visibility),
            WidgetEvent::PreChatSubmitted(form) => self
                .submit_pre_chat(&form)
                .map(|welcome_id| EventApplied::FormCompleted { welcome_id }),
            WidgetEvent::ComposerChanged(text) => self
                .set_composer_text(text)
                .map(|()| EventApplied::ComposerUpdated),
            WidgetEvent::SendClicked => self.send().map(EventApplied::MessageSent),
            WidgetEvent::EnterPressed { shift } => self.press_enter(shift),
            WidgetEvent::AttachmentClicked | WidgetEvent::EmojiClicked => {
                self.ensure_mounted()?;
                Err(InputRejection::InertControl)
            }
        };

        if let Err(rejection) = &result {
            tracing::debug!(?rejection, "widget event declined");
        }
        result
    }

    pub fn open(&mut self) -> Result<Visibility, InputRejection> {
        self.apply_visibility(VisibilityTransition::Open)
    }

    pub fn toggle_minimize(&mut self) -> Result<Visibility, InputRejection> {
        self.apply_visibility(VisibilityTransition::ToggleMinimize)
    }

    /// Hides the panel; the conversation stays intact for the next open.
    pub fn close(&mut self) -> Result<Visibility, InputRejection> {
        self.apply_visibility(VisibilityTransition::Close)
    }

    /// Passes the pre-chat gate and posts the welcome message.
    pub fn submit_pre_chat(&mut self, form: &PreChatForm) -> Result<MessageId, InputRejection> {
        self.ensure_mounted()?;
        if self.session.form_completed() {
            return Err(InputRejection::FormAlreadyCompleted);
        }
        self.ensure_body_visible()?;

        let visitor = form.validate()?;
        let welcome = visitor.personalize(&self.config.welcome_message);
        self.session.complete_form(visitor.clone());
        tracing::info!(visitor = %visitor.name, "pre-chat form completed");
        self.emit(WidgetChange::FormCompleted { visitor });

        Ok(self.append_agent_message(welcome))
    }

    pub fn set_composer_text(&mut self, text: impl Into<String>) -> Result<(), InputRejection> {
        self.ensure_composer_visible()?;
        self.composer.set_text(text);
        Ok(())
    }

    pub fn press_enter(&mut self, shift: bool) -> DispatchResult {
        self.ensure_composer_visible()?;
        match Composer::enter_action(shift) {
            EnterAction::InsertNewline => {
                self.composer.insert_newline();
                Ok(EventApplied::NewlineInserted)
            }
            EnterAction::Submit => self.send().map(EventApplied::MessageSent),
        }
    }

    /// Sends the composer contents and schedules the simulated delivery and reply.
    pub fn send(&mut self) -> Result<MessageId, InputRejection> {
        self.ensure_composer_visible()?;
        let text = self.composer.submission()?;

        let sent_at = self.now;
        let id = self.session.push_user(text, sent_at);
        self.composer.clear();
        self.emit(WidgetChange::MessageAppended {
            id,
            sender: Sender::User,
            sent_at,
        });

        let timings = self.config.timings;
        self.schedule(
            sent_at.after(timings.sent_after()),
            TaskKind::AdvanceStatus {
                message_id: id,
                to: DeliveryStatus::Sent,
            },
        );
        self.schedule(
            sent_at.after(timings.delivered_after()),
            TaskKind::AdvanceStatus {
                message_id: id,
                to: DeliveryStatus::Delivered,
            },
        );

        let was_typing = self.session.typing();
        self.session.begin_reply();
        if !was_typing {
            self.emit(WidgetChange::TypingChanged { typing: true });
        }
        self.schedule(
            sent_at.after(timings.reply_after()),
            TaskKind::AgentReply { trigger: id },
        );

        tracing::debug!(message_id = %id, %sent_at, "user message sent");
        Ok(id)
    }

    /// Types `text` into the composer and sends it.
    pub fn send_text(&mut self, text: impl Into<String>) -> Result<MessageId, InputRejection> {
        self.set_composer_text(text)?;
        self.send()
    }

    pub fn advance_by(&mut self, elapsed: Duration) -> usize {
        self.advance_to(self.now.after(elapsed))
    }

    /// Moves the session clock forward, firing every task due on the way.
    ///
    /// Returns the number of tasks fired. Moving backwards is ignored.
    pub fn advance_to(&mut self, now: SessionTime) -> usize {
        if now < self.now {
            return 0;
        }

        let mut fired = 0;
        while let Some(task) = self.tasks.pop_due(now) {
            self.now = task.due_at;
            self.run_task(task);
            fired += 1;
        }
        self.now = now;
        fired
    }

    /// Discards the conversation and starts a new generation; the panel stays where it is.
    pub fn reset(&mut self) -> usize {
        let cancelled = self.tasks.cancel_all();
        let visibility = self.session.visibility();

        self.generation = self.generation.next();
        self.session = WidgetSession::new();
        self.session.set_visibility(visibility);
        self.composer.clear();

        tracing::info!(
            generation = self.generation.0,
            cancelled,
            "widget session reset"
        );
        self.emit(WidgetChange::SessionReset);
        cancelled
    }

    /// Cancels every pending task; later triggers are declined.
    pub fn unmount(&mut self) -> usize {
        if !self.mounted {
            return 0;
        }

        let cancelled = self.tasks.cancel_all();
        self.mounted = false;
        tracing::info!(cancelled, "chat widget unmounted");
        self.emit(WidgetChange::Unmounted);
        cancelled
    }

    fn apply_visibility(
        &mut self,
        transition: VisibilityTransition,
    ) -> Result<Visibility, InputRejection> {
        self.ensure_mounted()?;
        let next = self.session.visibility().apply(transition)?;

        let cleared = self.session.set_visibility(next);
        self.emit(WidgetChange::VisibilityChanged { visibility: next });
        if cleared.is_some_and(|previous| previous > 0) {
            self.emit(WidgetChange::UnreadChanged { unread_count: 0 });
        }
        Ok(next)
    }

    fn append_agent_message(&mut self, text: String) -> MessageId {
        let sent_at = self.now;
        let arrival = self.session.push_agent(text, sent_at);
        self.emit(WidgetChange::MessageAppended {
            id: arrival.id,
            sender: Sender::Agent,
            sent_at,
        });
        if let Some(unread_count) = arrival.unread_count {
            self.emit(WidgetChange::UnreadChanged { unread_count });
        }
        arrival.id
    }

    fn schedule(&mut self, due_at: SessionTime, kind: TaskKind) {
        self.tasks.schedule(due_at, self.generation, kind);
    }

    /// Tasks scheduled under an earlier generation are skipped; `reset` drains the queue
    /// before bumping, so only tasks that outlive a generation change reach this check.
    fn run_task(&mut self, task: ScheduledTask) {
        if task.generation != self.generation {
            self.log_stale(&task, StaleTask::GenerationMismatch);
            return;
        }

        match task.kind {
            TaskKind::AdvanceStatus { message_id, to } => {
                match self.session.advance_status(message_id, to) {
                    Ok(status) => self.emit(WidgetChange::StatusAdvanced {
                        id: message_id,
                        status,
                    }),
                    Err(stale) => self.log_stale(&task, stale),
                }
            }
            TaskKind::AgentReply { trigger } => {
                if self.session.finish_reply() {
                    self.emit(WidgetChange::TypingChanged { typing: false });
                }
                let reply = self.config.reply_message.clone();
                let id = self.append_agent_message(reply);
                tracing::debug!(message_id = %id, %trigger, "agent reply delivered");
            }
        }
    }

    fn log_stale(&self, task: &ScheduledTask, reason: StaleTask) {
        tracing::debug!(
            task_id = %task.id,
            message_id = %task.kind.message_id(),
            ?reason,
            "scheduled task had nothing to do"
        );
    }

    fn emit(&mut self, change: WidgetChange) {
        for listener in &mut self.listeners {
            listener(&change);
        }
    }

    fn ensure_mounted(&self) -> Result<(), InputRejection> {
        if self.mounted {
            Ok(())
        } else {
            Err(InputRejection::Unmounted)
        }
    }

    fn ensure_body_visible(&self) -> Result<(), InputRejection> {
        if self.session.visibility().shows_body() {
            Ok(())
        } else {
            Err(InputRejection::PanelHidden)
        }
    }

    fn ensure_composer_visible(&self) -> Result<(), InputRejection> {
        self.ensure_mounted()?;
        self.ensure_body_visible()?;
        if self.session.form_completed() {
            Ok(())
        } else {
            Err(InputRejection::FormNotCompleted)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::visibility::VisibilityRejection;

    fn chatting() -> WidgetController {
        let mut controller = WidgetController::mount(WidgetConfig::default());
        controller.open().expect("open");
        controller
            .submit_pre_chat(&PreChatForm::new("Ana", "ana@x.com"))
            .expect("submit form");
        controller
    }

    fn recorded(controller: &mut WidgetController) -> Arc<Mutex<Vec<WidgetChange>>> {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        controller.subscribe(move |change| {
            sink.lock().expect("change sink").push(change.clone());
        });
        changes
    }

    #[test]
    fn closing_keeps_the_conversation() {
        let mut controller = chatting();
        controller.send_text("Oi").expect("send");
        controller.close().expect("close");
        controller.open().expect("reopen");

        assert!(controller.session().form_completed());
        assert_eq!(controller.session().messages().len(), 2);
        assert_eq!(
            controller.session().visitor().map(|visitor| visitor.email.as_str()),
            Some("ana@x.com")
        );
    }

    #[test]
    fn minimize_does_not_touch_thread_or_typing() {
        let mut controller = chatting();
        controller.send_text("Oi").expect("send");

        assert_eq!(controller.toggle_minimize(), Ok(Visibility::Minimized));
        assert!(controller.session().typing());
        controller.advance_by(Duration::from_millis(2_000));

        assert_eq!(controller.session().unread_count(), 0);
        assert_eq!(controller.session().messages().len(), 3);
        assert_eq!(controller.toggle_minimize(), Ok(Visibility::Expanded));
    }

    #[test]
    fn form_and_composer_are_unreachable_while_hidden() {
        let mut controller = WidgetController::mount(WidgetConfig::default());
        let form = PreChatForm::new("Ana", "ana@x.com");

        assert_eq!(
            controller.submit_pre_chat(&form),
            Err(InputRejection::PanelHidden)
        );
        controller.open().expect("open");
        assert_eq!(
            controller.send_text("Oi"),
            Err(InputRejection::FormNotCompleted)
        );
        controller.submit_pre_chat(&form).expect("submit");
        controller.toggle_minimize().expect("minimize");

        assert_eq!(controller.send_text("Oi"), Err(InputRejection::PanelHidden));
        assert_eq!(controller.session().messages().len(), 1);
    }

    #[test]
    fn second_form_submission_is_declined() {
        let mut controller = chatting();

        assert_eq!(
            controller.submit_pre_chat(&PreChatForm::new("Bia", "bia@x.com")),
            Err(InputRejection::FormAlreadyCompleted)
        );
        assert_eq!(
            controller.session().visitor().map(|visitor| visitor.name.as_str()),
            Some("Ana")
        );
        assert_eq!(controller.session().messages().len(), 1);
    }

    #[test]
    fn welcome_template_is_personalized() {
        let mut controller = WidgetController::mount(
            WidgetConfig::default().with_welcome_message("Olá, {name}! Em que posso ajudar?"),
        );
        controller.open().expect("open");
        controller
            .submit_pre_chat(&PreChatForm::new("Ana", "ana@x.com"))
            .expect("submit");

        assert_eq!(
            controller.session().messages()[0].text(),
            "Olá, Ana! Em que posso ajudar?"
        );
    }

    #[test]
    fn enter_sends_and_shift_enter_adds_newline() {
        let mut controller = chatting();
        controller
            .dispatch(WidgetEvent::ComposerChanged("linha 1".to_string()))
            .expect("type");

        assert_eq!(
            controller.dispatch(WidgetEvent::EnterPressed { shift: true }),
            Ok(EventApplied::NewlineInserted)
        );
        assert_eq!(controller.composer_text(), "linha 1\n");

        let applied = controller
            .dispatch(WidgetEvent::EnterPressed { shift: false })
            .expect("send");
        assert!(matches!(applied, EventApplied::MessageSent(_)));
        assert_eq!(controller.composer_text(), "");
        assert_eq!(
            controller.session().last_message().map(Message::text),
            Some("linha 1")
        );
    }

    #[test]
    fn inert_controls_change_nothing() {
        let mut controller = chatting();
        let before = controller.snapshot();

        assert_eq!(
            controller.dispatch(WidgetEvent::AttachmentClicked),
            Err(InputRejection::InertControl)
        );
        assert_eq!(
            controller.dispatch(WidgetEvent::EmojiClicked),
            Err(InputRejection::InertControl)
        );
        assert_eq!(controller.snapshot(), before);
    }

    #[test]
    fn illegal_visibility_triggers_are_declined() {
        let mut controller = WidgetController::mount(WidgetConfig::default());

        assert_eq!(
            controller.dispatch(WidgetEvent::CloseClicked),
            Err(InputRejection::Visibility(VisibilityRejection::NotOpen))
        );
        controller.dispatch(WidgetEvent::BubbleClicked).expect("open");
        assert_eq!(
            controller.dispatch(WidgetEvent::BubbleClicked),
            Err(InputRejection::Visibility(VisibilityRejection::AlreadyOpen))
        );
    }

    #[test]
    fn overlapping_sends_are_tracked_by_id() {
        let mut controller = chatting();
        let first = controller.send_text("um").expect("first");
        controller.advance_by(Duration::from_millis(300));
        let second = controller.send_text("dois").expect("second");

        controller.advance_by(Duration::from_millis(200));
        let status_of = |controller: &WidgetController, id| {
            controller.session().message(id).and_then(Message::status)
        };
        assert_eq!(status_of(&controller, first), Some(DeliveryStatus::Sent));
        assert_eq!(status_of(&controller, second), Some(DeliveryStatus::Sending));

        controller.advance_by(Duration::from_millis(1_700));
        assert_eq!(controller.session().messages().len(), 4);
        assert!(controller.session().typing());

        controller.advance_by(Duration::from_millis(300));
        let senders = controller
            .session()
            .messages()
            .iter()
            .map(Message::sender)
            .collect::<Vec<_>>();
        assert_eq!(
            senders,
            vec![
                Sender::Agent,
                Sender::User,
                Sender::User,
                Sender::Agent,
                Sender::Agent
            ]
        );
        assert!(!controller.session().typing());
        assert_eq!(status_of(&controller, first), Some(DeliveryStatus::Delivered));
        assert_eq!(status_of(&controller, second), Some(DeliveryStatus::Delivered));
    }

    #[test]
    fn agent_reply_is_stamped_with_its_due_time() {
        let mut controller = chatting();
        controller.advance_by(Duration::from_millis(100));
        controller.send_text("Oi").expect("send");

        controller.advance_by(Duration::from_secs(10));

        let reply = controller.session().last_message().expect("reply");
        assert_eq!(reply.sent_at(), SessionTime(2_100));
        assert_eq!(controller.now(), SessionTime(10_100));
    }

    #[test]
    fn reset_cancels_pending_tasks_and_starts_fresh() {
        let mut controller = chatting();
        controller.send_text("Oi").expect("send");
        let generation = controller.generation();

        assert_eq!(controller.reset(), 3);
        assert_ne!(controller.generation(), generation);
        assert!(!controller.session().form_completed());
        assert!(controller.session().messages().is_empty());
        assert!(!controller.session().typing());
        assert_eq!(controller.session().visibility(), Visibility::Expanded);

        assert_eq!(controller.advance_by(Duration::from_secs(5)), 0);
        assert!(controller.session().messages().is_empty());
    }

    #[test]
    fn tasks_from_an_earlier_generation_change_nothing() {
        let mut controller = chatting();
        let id = controller.send_text("Oi").expect("send");
        controller.generation = controller.generation.next();

        assert_eq!(controller.advance_by(Duration::from_secs(5)), 3);
        assert_eq!(controller.pending_tasks(), 0);
        assert_eq!(controller.session().messages().len(), 2);
        assert_eq!(
            controller.session().message(id).and_then(Message::status),
            Some(DeliveryStatus::Sending)
        );
    }

    #[test]
    fn unmount_cancels_timers_and_declines_triggers() {
        let mut controller = chatting();
        controller.send_text("Oi").expect("send");
        let changes = recorded(&mut controller);

        assert_eq!(controller.unmount(), 3);
        assert_eq!(controller.pending_tasks(), 0);
        assert_eq!(controller.advance_by(Duration::from_secs(5)), 0);
        assert_eq!(controller.close(), Err(InputRejection::Unmounted));
        assert_eq!(
            controller.dispatch(WidgetEvent::EmojiClicked),
            Err(InputRejection::Unmounted)
        );
        assert_eq!(controller.unmount(), 0);
        assert_eq!(
            changes.lock().expect("changes").as_slice(),
            &[WidgetChange::Unmounted]
        );
    }

    #[test]
    fn listeners_see_reply_lifecycle_in_order() {
        let mut controller = chatting();
        let changes = recorded(&mut controller);

        let id = controller.send_text("Oi").expect("send");
        controller.close().expect("close");
        controller.advance_by(Duration::from_millis(2_000));
        controller.open().expect("reopen");

        let changes = changes.lock().expect("changes").clone();
        assert_eq!(
            changes,
            vec![
                WidgetChange::MessageAppended {
                    id,
                    sender: Sender::User,
                    sent_at: SessionTime(0),
                },
                WidgetChange::TypingChanged { typing: true },
                WidgetChange::VisibilityChanged {
                    visibility: Visibility::Closed
                },
                WidgetChange::StatusAdvanced {
                    id,
                    status: DeliveryStatus::Sent
                },
                WidgetChange::StatusAdvanced {
                    id,
                    status: DeliveryStatus::Delivered
                },
                WidgetChange::TypingChanged { typing: false },
                WidgetChange::MessageAppended {
                    id: MessageId::new(3),
                    sender: Sender::Agent,
                    sent_at: SessionTime(2_000),
                },
                WidgetChange::UnreadChanged { unread_count: 1 },
                WidgetChange::VisibilityChanged {
                    visibility: Visibility::Expanded
                },
                WidgetChange::UnreadChanged { unread_count: 0 },
            ]
        );
    }

    #[test]
    fn time_never_moves_backwards() {
        let mut controller = chatting();
        controller.advance_to(SessionTime(1_000));

        assert_eq!(controller.advance_to(SessionTime(500)), 0);
        assert_eq!(controller.now(), SessionTime(1_000));
    }
}
