//! Remaining/elapsed time and manual extension.

use chrono::{DateTime, Duration, Utc};

use super::machine::Transition;
use super::model::{RoutineRun, RunStatus, RunTask};
use crate::error::RunError;

/// Largest single change to planned time, for extensions and quick tasks.
pub const MAX_ADJUSTMENT_MS: i64 = 7 * 24 * 60 * 60_000;

/// `at` moved by `ms`, saturating at the ends of the representable range.
pub(crate) fn shift(at: DateTime<Utc>, ms: i64) -> DateTime<Utc> {
    Duration::try_milliseconds(ms)
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(if ms < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
}

/// Milliseconds until `task`'s planned end as seen at `as_of`. Negative once
/// the task is overdue; `None` before it starts.
pub fn remaining_ms(task: &RunTask, as_of: DateTime<Utc>) -> Option<i64> {
    task.planned_end_at
        .map(|end| (end - as_of).num_milliseconds())
}

/// Milliseconds past the planned end, 0 while still on time.
pub fn overtime_ms(task: &RunTask, as_of: DateTime<Utc>) -> i64 {
    remaining_ms(task, as_of).map(|r| (-r).max(0)).unwrap_or(0)
}

/// Time spent on `task` so far, excluding closed pauses.
pub fn elapsed_ms(task: &RunTask, as_of: DateTime<Utc>) -> i64 {
    let end = task.completed_at.unwrap_or(as_of);
    task.started_at
        .map(|start| ((end - start).num_milliseconds() - task.paused_ms).max(0))
        .unwrap_or(0)
}

impl RoutineRun {
    /// Remaining time of the active task, frozen while paused.
    pub fn active_remaining_ms(&self, now: DateTime<Utc>) -> Option<i64> {
        self.active_task()
            .and_then(|task| remaining_ms(task, self.effective_now(now)))
    }

    /// Wall-clock time since start minus pauses, up to `ended_at` if finished.
    pub fn active_duration_ms(&self, now: DateTime<Utc>) -> i64 {
        let Some(started_at) = self.started_at else {
            return 0;
        };
        let end = self.ended_at.unwrap_or_else(|| self.effective_now(now));
        ((end - started_at).num_milliseconds() - self.total_pause_ms).max(0)
    }
}

/// Adjust a task's planned time by `delta_ms`.
///
/// Adding time opens a fresh window of `delta_ms` from now, however overdue
/// the task is, and re-arms the time-up, overtime and auto-advance-warning
/// announcements. Milestones are left alone since they count elapsed time.
/// Removing time pulls the existing deadline closer and keeps announcement
/// state.
///
/// Only the active task's deadline moves. For a pending task the adjustment
/// is recorded in `extension_ms` and applied when it starts.
///
/// `delta_ms` is clamped to [`MAX_ADJUSTMENT_MS`] either way.
pub fn extend_task(
    run: &RoutineRun,
    task_id: &str,
    delta_ms: i64,
    now: DateTime<Utc>,
) -> Result<Transition, RunError> {
    let index = run
        .task_index(task_id)
        .ok_or_else(|| RunError::TaskNotFound(task_id.to_string()))?;

    let delta_ms = delta_ms.clamp(-MAX_ADJUSTMENT_MS, MAX_ADJUSTMENT_MS);
    let mut next = run.clone();
    if delta_ms == 0 {
        return Ok(Transition::quiet(next));
    }

    // While paused the window opens at the pause start; resume then shifts it
    // by the pause length like any other deadline.
    let anchor = match (next.status, next.paused_at) {
        (RunStatus::Paused, Some(paused_at)) => paused_at,
        _ => now,
    };

    let task = &mut next.tasks[index];
    task.extension_ms = task.extension_ms.saturating_add(delta_ms);

    if task.is_active() {
        if let Some(end) = task.planned_end_at {
            if delta_ms > 0 {
                task.planned_end_at = Some(shift(anchor, delta_ms));
                task.time_up_announced = false;
                task.overtime_announced_minutes.clear();
                task.auto_advance_warning_announced = false;
            } else {
                task.planned_end_at = Some(shift(end, delta_ms));
            }
        }
    }

    tracing::debug!(
        run_id = %next.id,
        task_id,
        delta_ms,
        extension_ms = next.tasks[index].extension_ms,
        "task time adjusted"
    );
    Ok(Transition::quiet(next))
}
