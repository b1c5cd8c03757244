use std::collections::BTreeMap;
use std::fmt;

use crate::message::{DeliveryStatus, MessageId, SessionTime};

/// Identifier for one scheduled task; also breaks ties between equal deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "task-{}", self.0)
    }
}

/// Session generation a task belongs to.
///
/// Bumped on every reset so tasks from a discarded conversation can be recognized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Deferred effect of a user send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    AdvanceStatus {
        message_id: MessageId,
        to: DeliveryStatus,
    },
    /// Simulated agent answer to the user message `trigger`.
    AgentReply { trigger: MessageId },
}

impl TaskKind {
    /// Message this task is attributed to.
    pub fn message_id(&self) -> MessageId {
        match self {
            Self::AdvanceStatus { message_id, .. } => *message_id,
            Self::AgentReply { trigger } => *trigger,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub generation: Generation,
    pub due_at: SessionTime,
    pub kind: TaskKind,
}

/// Deadline-ordered queue of pending tasks.
///
/// Tasks due at the same instant fire in scheduling order.
#[derive(Debug, Default)]
pub struct TaskQueue {
    next_task_id: u64,
    tasks: BTreeMap<(SessionTime, TaskId), ScheduledTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(
        &mut self,
        due_at: SessionTime,
        generation: Generation,
        kind: TaskKind,
    ) -> TaskId {
        self.next_task_id = self.next_task_id.saturating_add(1);
        let id = TaskId(self.next_task_id);
        self.tasks.insert(
            (due_at, id),
            ScheduledTask {
                id,
                generation,
                due_at,
                kind,
            },
        );
        id
    }

    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.tasks.len();
        self.tasks.clear();
        cancelled
    }

    pub fn next_deadline(&self) -> Option<SessionTime> {
        self.tasks.keys().next().map(|(due_at, _)| *due_at)
    }

    /// Removes and returns the earliest task due at or before `now`.
    pub fn pop_due(&mut self, now: SessionTime) -> Option<ScheduledTask> {
        let (due_at, _) = *self.tasks.keys().next()?;
        if due_at > now {
            return None;
        }

        self.tasks.pop_first().map(|(_, task)| task)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
