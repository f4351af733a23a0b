//! Reordering the pending queue and per-task toggles.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::machine::Transition;
use super::model::{RoutineRun, RunTask, TaskStatus};
use super::timing::MAX_ADJUSTMENT_MS;
use crate::error::RunError;

/// Where to move a pending task, relative to the other pending tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovePosition {
    Up,
    Down,
    /// First in the pending queue, i.e. right after the active task.
    Next,
    End,
    /// Zero-based index into the pending queue; clamped to its bounds.
    Index(usize),
}

impl fmt::Display for MovePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovePosition::Up => f.write_str("up"),
            MovePosition::Down => f.write_str("down"),
            MovePosition::Next => f.write_str("next"),
            MovePosition::End => f.write_str("end"),
            MovePosition::Index(i) => write!(f, "{i}"),
        }
    }
}

impl FromStr for MovePosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(MovePosition::Up),
            "down" => Ok(MovePosition::Down),
            "next" => Ok(MovePosition::Next),
            "end" => Ok(MovePosition::End),
            other => other
                .parse::<usize>()
                .map(MovePosition::Index)
                .map_err(|_| format!("invalid position '{other}' (up, down, next, end or an index)")),
        }
    }
}

/// Move a pending task within the pending queue.
///
/// The active task and resolved tasks can't be moved.
pub fn move_task(
    run: &RoutineRun,
    task_id: &str,
    position: MovePosition,
) -> Result<Transition, RunError> {
    let task = run
        .task(task_id)
        .ok_or_else(|| RunError::TaskNotFound(task_id.to_string()))?;
    if task.status != TaskStatus::Pending {
        return Err(RunError::TaskNotPending {
            task_id: task_id.to_string(),
            status: task.status,
        });
    }

    let (history, active, mut pending) = partition(run);
    let from = pending
        .iter()
        .position(|t| t.id == task_id)
        .ok_or_else(|| RunError::TaskNotFound(task_id.to_string()))?;

    let last = pending.len() - 1;
    let to = match position {
        MovePosition::Up => from.saturating_sub(1),
        MovePosition::Down => (from + 1).min(last),
        MovePosition::Next => 0,
        MovePosition::End => last,
        MovePosition::Index(i) => i.min(last),
    };

    let moving = pending.remove(from);
    pending.insert(to, moving);

    let mut next = run.clone();
    next.tasks = rebuild(history, active, pending);
    tracing::debug!(run_id = %next.id, task_id, %position, from, to, "task moved");
    Ok(Transition::quiet(next))
}

/// Insert an ad-hoc task right after the active one (or first in the queue
/// when nothing is active). The duration is clamped to
/// `0..=`[`MAX_ADJUSTMENT_MS`].
pub fn add_quick_task(
    run: &RoutineRun,
    name: &str,
    duration_ms: i64,
    now: DateTime<Utc>,
) -> Result<Transition, RunError> {
    if run.status.is_terminal() {
        return Err(RunError::RunFinished { status: run.status });
    }

    let id = format!("quick-{}-{}", now.timestamp_millis(), Uuid::new_v4().simple());
    let duration_ms = duration_ms.clamp(0, MAX_ADJUSTMENT_MS);
    let task = RunTask::pending(id, name.to_string(), duration_ms, 0);

    let (history, active, mut pending) = partition(run);
    pending.insert(0, task);

    let mut next = run.clone();
    next.tasks = rebuild(history, active, pending);
    tracing::debug!(run_id = %next.id, name, duration_ms, "quick task added");
    Ok(Transition::quiet(next))
}

/// Flip a subtask's checked state.
pub fn toggle_subtask(
    run: &RoutineRun,
    task_id: &str,
    subtask_id: &str,
) -> Result<Transition, RunError> {
    let index = run
        .task_index(task_id)
        .ok_or_else(|| RunError::TaskNotFound(task_id.to_string()))?;

    let mut next = run.clone();
    let subtask = next.tasks[index]
        .subtasks
        .iter_mut()
        .find(|s| s.id == subtask_id)
        .ok_or_else(|| RunError::SubtaskNotFound {
            task_id: task_id.to_string(),
            subtask_id: subtask_id.to_string(),
        })?;
    subtask.checked = !subtask.checked;
    Ok(Transition::quiet(next))
}

/// Flip a task's auto-advance setting and re-arm its warning.
pub fn toggle_auto_advance(run: &RoutineRun, task_id: &str) -> Result<Transition, RunError> {
    let index = run
        .task_index(task_id)
        .ok_or_else(|| RunError::TaskNotFound(task_id.to_string()))?;

    let mut next = run.clone();
    let task = &mut next.tasks[index];
    task.auto_advance = !task.auto_advance;
    task.auto_advance_warning_announced = false;
    Ok(Transition::quiet(next))
}

/// Split tasks into resolved history (in current order), the active task and
/// the pending queue (by `order`).
fn partition(run: &RoutineRun) -> (Vec<RunTask>, Option<RunTask>, Vec<RunTask>) {
    let mut sorted: Vec<RunTask> = run.tasks.clone();
    sorted.sort_by_key(|t| t.order);

    let mut history = Vec::new();
    let mut active = None;
    let mut pending = Vec::new();
    for task in sorted {
        match task.status {
            TaskStatus::Completed | TaskStatus::Skipped => history.push(task),
            TaskStatus::Active => active = Some(task),
            TaskStatus::Pending => pending.push(task),
        }
    }
    (history, active, pending)
}

/// `[history.., active?, pending..]`, renumbered from 0.
fn rebuild(history: Vec<RunTask>, active: Option<RunTask>, pending: Vec<RunTask>) -> Vec<RunTask> {
    history
        .into_iter()
        .chain(active)
        .chain(pending)
        .enumerate()
        .map(|(i, mut task)| {
            task.order = i as u32;
            task
        })
        .collect()
}
