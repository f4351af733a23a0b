use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::template::Pace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    NotStarted,
    Running,
    Paused,
    Completed,
    Abandoned,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Abandoned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::NotStarted => "not_started",
            RunStatus::Running => "running",
            RunStatus::Paused => "paused",
            RunStatus::Completed => "completed",
            RunStatus::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Active,
    Completed,
    Skipped,
}

impl TaskStatus {
    /// Completed and skipped tasks are history; they never run again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Skipped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Active => "active",
            TaskStatus::Completed => "completed",
            TaskStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checklist entry. Checking it never affects task completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub checked: bool,
}

/// One task inside a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTask {
    pub id: String,
    /// Source template task; `None` for quick tasks and ad-hoc items.
    #[serde(default)]
    pub template_task_id: Option<String>,
    pub name: String,
    /// Planned duration in milliseconds.
    pub duration_ms: i64,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    pub status: TaskStatus,
    pub order: u32,
    #[serde(default)]
    pub auto_advance: bool,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Set when the task starts; moved by pauses and extensions.
    #[serde(default)]
    pub planned_end_at: Option<DateTime<Utc>>,
    /// Net of every manual adjustment, positive or negative.
    #[serde(default)]
    pub extension_ms: i64,
    /// Pause time accumulated while this task was active.
    #[serde(default)]
    pub paused_ms: i64,
    /// Resolution time for both completed and skipped tasks.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub overtime_announced_minutes: BTreeSet<u32>,
    #[serde(default)]
    pub milestone_announced_minutes: BTreeSet<u32>,
    #[serde(default)]
    pub auto_advance_warning_announced: bool,
    #[serde(default)]
    pub time_up_announced: bool,
}

impl RunTask {
    /// A fresh pending task with zeroed timing and announcement state.
    pub fn pending(id: String, name: String, duration_ms: i64, order: u32) -> Self {
        Self {
            id,
            template_task_id: None,
            name,
            duration_ms,
            subtasks: Vec::new(),
            status: TaskStatus::Pending,
            order,
            auto_advance: false,
            started_at: None,
            planned_end_at: None,
            extension_ms: 0,
            paused_ms: 0,
            completed_at: None,
            overtime_announced_minutes: BTreeSet::new(),
            milestone_announced_minutes: BTreeSet::new(),
            auto_advance_warning_announced: false,
            time_up_announced: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    pub fn is_active(&self) -> bool {
        self.status == TaskStatus::Active
    }

    /// Planned duration including every manual adjustment so far.
    pub fn planned_total_ms(&self) -> i64 {
        self.duration_ms.saturating_add(self.extension_ms)
    }

    pub fn checked_subtasks(&self) -> usize {
        self.subtasks.iter().filter(|s| s.checked).count()
    }
}

/// One execution of a routine, or of a single ad-hoc item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineRun {
    pub id: String,
    pub template_id: String,
    pub template_name: String,
    pub pace: Pace,
    pub tasks: Vec<RunTask>,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    /// Sum of every closed pause. Never decreases.
    #[serde(default)]
    pub total_pause_ms: i64,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub active_task_id: Option<String>,
}

impl RoutineRun {
    pub fn task(&self, task_id: &str) -> Option<&RunTask> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub(crate) fn task_index(&self, task_id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == task_id)
    }

    pub fn active_task(&self) -> Option<&RunTask> {
        self.active_task_id.as_deref().and_then(|id| self.task(id))
    }

    /// Index of the pending task with the lowest `order`.
    pub(crate) fn next_pending_index(&self) -> Option<usize> {
        self.tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_pending())
            .min_by_key(|(_, t)| t.order)
            .map(|(i, _)| i)
    }

    pub fn next_pending(&self) -> Option<&RunTask> {
        self.next_pending_index().map(|i| &self.tasks[i])
    }

    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// The moment remaining time is measured at: the pause start while
    /// paused, otherwise `now`.
    pub fn effective_now(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match (self.status, self.paused_at) {
            (RunStatus::Paused, Some(paused_at)) => paused_at,
            _ => now,
        }
    }

    /// Sum of planned time for tasks that have not been resolved yet.
    pub fn remaining_planned_ms(&self) -> i64 {
        self.tasks
            .iter()
            .filter(|t| !t.status.is_terminal())
            .map(|t| t.planned_total_ms())
            .sum()
    }
}
