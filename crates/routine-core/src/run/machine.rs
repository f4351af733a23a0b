//! Run lifecycle transitions.
//!
//! ```text
//! NotStarted -> Running <-> Paused -> (Completed | Abandoned)
//! ```
//!
//! Every function borrows the current run and returns a new one inside a
//! [`Transition`]. The input is never modified, so a rejected transition
//! leaves the caller's value exactly as it was.
//!
//! The active task stays `Active` while the run is paused; exactly one task is
//! active whenever the run is `Running` or `Paused`, and none otherwise.

use chrono::{DateTime, Utc};

use super::model::{RoutineRun, RunStatus, TaskStatus};
use super::timing::shift;
use crate::error::RunError;
use crate::notify::Announcement;

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub run: RoutineRun,
    pub announcements: Vec<Announcement>,
}

impl Transition {
    /// A transition with nothing to announce.
    pub fn quiet(run: RoutineRun) -> Self {
        Self {
            run,
            announcements: Vec::new(),
        }
    }

    pub fn into_run(self) -> RoutineRun {
        self.run
    }
}

pub fn start_run(run: &RoutineRun, now: DateTime<Utc>) -> Result<Transition, RunError> {
    if run.status != RunStatus::NotStarted {
        return Err(RunError::AlreadyStarted { status: run.status });
    }

    let mut next = run.clone();
    next.started_at = Some(now);

    match next.next_pending_index() {
        Some(index) => {
            activate(&mut next, index, now);
            tracing::info!(run_id = %next.id, routine = %next.template_name, "run started");
        }
        None => {
            next.status = RunStatus::Completed;
            next.ended_at = Some(now);
            tracing::info!(run_id = %next.id, "run started with no tasks, completed immediately");
        }
    }

    Ok(Transition::quiet(next))
}

pub fn pause_run(run: &RoutineRun, now: DateTime<Utc>) -> Result<Transition, RunError> {
    if run.status != RunStatus::Running {
        return Err(RunError::NotRunning { status: run.status });
    }

    let mut next = run.clone();
    next.status = RunStatus::Paused;
    next.paused_at = Some(now);
    tracing::debug!(run_id = %next.id, "run paused");
    Ok(Transition::quiet(next))
}

/// Resume a paused run. The active task's planned end moves forward by the
/// pause length, so its remaining time is what it was when paused.
pub fn resume_run(run: &RoutineRun, now: DateTime<Utc>) -> Result<Transition, RunError> {
    if run.status != RunStatus::Paused {
        return Err(RunError::NotPaused { status: run.status });
    }

    let mut next = run.clone();
    let pause_ms = close_pause(&mut next, now);
    tracing::debug!(run_id = %next.id, pause_ms, "run resumed");
    Ok(Transition::quiet(next))
}

/// Complete the active task and start the next pending one, or complete the
/// run when nothing is left.
///
/// From `Paused` the open pause is closed first and the run continues as
/// `Running`.
pub fn advance_to_next_task(run: &RoutineRun, now: DateTime<Utc>) -> Result<Transition, RunError> {
    require_in_progress(run)?;
    let index = run
        .active_task_id
        .as_deref()
        .and_then(|id| run.task_index(id))
        .ok_or(RunError::NoActiveTask)?;

    let mut next = run.clone();
    close_pause(&mut next, now);

    let finished = &mut next.tasks[index];
    finished.status = TaskStatus::Completed;
    finished.completed_at = Some(now);
    let from = finished.name.clone();
    next.active_task_id = None;

    let announcement = match proceed(&mut next, now) {
        Some(to) => Announcement::TaskTransition { from, to },
        None => Announcement::RunComplete {
            routine: next.template_name.clone(),
        },
    };

    Ok(Transition {
        run: next,
        announcements: vec![announcement],
    })
}

/// Skip a task. Skipping the active task moves on like
/// [`advance_to_next_task`]; skipping a pending task only resolves it.
pub fn skip_task(
    run: &RoutineRun,
    task_id: &str,
    now: DateTime<Utc>,
) -> Result<Transition, RunError> {
    if run.status.is_terminal() {
        return Err(RunError::RunFinished { status: run.status });
    }
    let index = run
        .task_index(task_id)
        .ok_or_else(|| RunError::TaskNotFound(task_id.to_string()))?;

    let status = run.tasks[index].status;
    match status {
        TaskStatus::Pending => {
            let mut next = run.clone();
            let task = &mut next.tasks[index];
            task.status = TaskStatus::Skipped;
            task.completed_at = Some(now);
            tracing::debug!(run_id = %next.id, task_id, "pending task skipped");
            Ok(Transition::quiet(next))
        }
        TaskStatus::Active => {
            let mut next = run.clone();
            close_pause(&mut next, now);

            let task = &mut next.tasks[index];
            task.status = TaskStatus::Skipped;
            task.completed_at = Some(now);
            let skipped = task.name.clone();
            next.active_task_id = None;

            let upcoming = proceed(&mut next, now);
            let mut announcements = vec![Announcement::TaskSkipped {
                skipped,
                next: upcoming.clone(),
            }];
            if upcoming.is_none() {
                announcements.push(Announcement::RunComplete {
                    routine: next.template_name.clone(),
                });
            }

            Ok(Transition {
                run: next,
                announcements,
            })
        }
        TaskStatus::Completed | TaskStatus::Skipped => Err(RunError::TaskNotPending {
            task_id: task_id.to_string(),
            status,
        }),
    }
}

/// Abandon the run. The active task, if any, is marked skipped; no other
/// task changes.
///
/// Fails with [`RunError::RunFinished`] when the run already completed or
/// was abandoned, so a second `end_run` leaves the first outcome in place.
pub fn end_run(run: &RoutineRun, now: DateTime<Utc>) -> Result<Transition, RunError> {
    if run.status.is_terminal() {
        return Err(RunError::RunFinished { status: run.status });
    }

    let mut next = run.clone();
    close_pause(&mut next, now);

    if let Some(index) = next
        .active_task_id
        .as_deref()
        .and_then(|id| next.task_index(id))
    {
        let task = &mut next.tasks[index];
        task.status = TaskStatus::Skipped;
        task.completed_at = Some(now);
    }

    next.status = RunStatus::Abandoned;
    next.ended_at = Some(now);
    next.active_task_id = None;
    tracing::info!(run_id = %next.id, "run abandoned");
    Ok(Transition::quiet(next))
}

// ── Internal ─────────────────────────────────────────────────────────

/// Make the task at `index` the active one.
fn activate(run: &mut RoutineRun, index: usize, now: DateTime<Utc>) {
    let task = &mut run.tasks[index];
    task.status = TaskStatus::Active;
    task.started_at = Some(now);
    task.planned_end_at = Some(shift(now, task.planned_total_ms()));
    run.active_task_id = Some(task.id.clone());
    run.status = RunStatus::Running;
}

/// Activate the next pending task and return its name, or complete the run.
fn proceed(run: &mut RoutineRun, now: DateTime<Utc>) -> Option<String> {
    match run.next_pending_index() {
        Some(index) => {
            activate(run, index, now);
            Some(run.tasks[index].name.clone())
        }
        None => {
            run.status = RunStatus::Completed;
            run.ended_at = Some(now);
            run.active_task_id = None;
            tracing::info!(run_id = %run.id, total_pause_ms = run.total_pause_ms, "run completed");
            None
        }
    }
}

/// Fold an open pause into the totals and shift the active task's planned
/// end. Returns the pause length; 0 when the run wasn't paused.
fn close_pause(run: &mut RoutineRun, now: DateTime<Utc>) -> i64 {
    if run.status != RunStatus::Paused {
        return 0;
    }
    let pause_ms = run
        .paused_at
        .map(|paused_at| (now - paused_at).num_milliseconds().max(0))
        .unwrap_or(0);

    if let Some(index) = run
        .active_task_id
        .as_deref()
        .and_then(|id| run.task_index(id))
    {
        let task = &mut run.tasks[index];
        task.planned_end_at = task
            .planned_end_at
            .map(|end| shift(end, pause_ms));
        task.paused_ms += pause_ms;
    }

    run.total_pause_ms += pause_ms;
    run.paused_at = None;
    run.status = RunStatus::Running;
    pause_ms
}

fn require_in_progress(run: &RoutineRun) -> Result<(), RunError> {
    match run.status {
        RunStatus::Running | RunStatus::Paused => Ok(()),
        RunStatus::NotStarted => Err(RunError::NotRunning { status: run.status }),
        RunStatus::Completed | RunStatus::Abandoned => {
            Err(RunError::RunFinished { status: run.status })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::create_run_from_template;
    use crate::template::{Pace, PaceInclusion, RoutineTemplate, TemplateTask};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 12, 6, 45, 0).unwrap()
    }

    fn mins(m: i64) -> Duration {
        Duration::minutes(m)
    }

    fn template(durations: &[u32]) -> RoutineTemplate {
        RoutineTemplate {
            id: "tpl".into(),
            name: "Morning".into(),
            tasks: durations
                .iter()
                .enumerate()
                .map(|(i, &d)| TemplateTask {
                    id: format!("t{}", i + 1),
                    name: format!("Task {}", i + 1),
                    duration_min: d,
                    paces: PaceInclusion::ALL,
                    subtasks: Vec::new(),
                    order: i as u32,
                    auto_advance: false,
                })
                .collect(),
        }
    }

    fn started(durations: &[u32]) -> RoutineRun {
        let run = create_run_from_template(&template(durations), Pace::Steady, t0());
        start_run(&run, t0()).unwrap().run
    }

    fn statuses(run: &RoutineRun) -> Vec<TaskStatus> {
        run.tasks.iter().map(|t| t.status).collect()
    }

    #[test]
    fn start_activates_first_task() {
        let run = started(&[5, 10, 5]);
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.started_at, Some(t0()));
        assert_eq!(
            statuses(&run),
            vec![TaskStatus::Active, TaskStatus::Pending, TaskStatus::Pending]
        );
        assert_eq!(run.active_task_id.as_deref(), Some(run.tasks[0].id.as_str()));
        assert_eq!(run.tasks[0].started_at, Some(t0()));
        assert_eq!(run.tasks[0].planned_end_at, Some(t0() + mins(5)));
    }

    #[test]
    fn start_twice_fails() {
        let run = started(&[5]);
        assert_eq!(
            start_run(&run, t0()).unwrap_err(),
            RunError::AlreadyStarted {
                status: RunStatus::Running
            }
        );
    }

    #[test]
    fn start_empty_run_completes_immediately() {
        let run = create_run_from_template(&template(&[]), Pace::Steady, t0());
        let run = start_run(&run, t0()).unwrap().run;
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.started_at, Some(t0()));
        assert_eq!(run.ended_at, Some(t0()));
        assert_eq!(run.active_task_id, None);
    }

    #[test]
    fn start_includes_pre_applied_extension() {
        let mut run = create_run_from_template(&template(&[5]), Pace::Steady, t0());
        run.tasks[0].extension_ms = 60_000;
        let run = start_run(&run, t0()).unwrap().run;
        assert_eq!(run.tasks[0].planned_end_at, Some(t0() + mins(6)));
    }

    #[test]
    fn pause_requires_running() {
        let run = create_run_from_template(&template(&[5]), Pace::Steady, t0());
        assert!(matches!(
            pause_run(&run, t0()),
            Err(RunError::NotRunning { .. })
        ));

        let paused = pause_run(&started(&[5]), t0()).unwrap().run;
        assert!(matches!(
            pause_run(&paused, t0()),
            Err(RunError::NotRunning { .. })
        ));
    }

    #[test]
    fn resume_requires_paused() {
        assert!(matches!(
            resume_run(&started(&[5]), t0()),
            Err(RunError::NotPaused { .. })
        ));
    }

    #[test]
    fn pause_resume_preserves_remaining_time() {
        let run = started(&[10]);
        let paused = pause_run(&run, t0() + mins(3)).unwrap().run;
        assert_eq!(paused.status, RunStatus::Paused);
        assert_eq!(paused.paused_at, Some(t0() + mins(3)));
        assert!(paused.tasks[0].is_active());

        let resumed = resume_run(&paused, t0() + mins(10)).unwrap().run;
        assert_eq!(resumed.status, RunStatus::Running);
        assert_eq!(resumed.paused_at, None);
        assert_eq!(resumed.total_pause_ms, 7 * 60_000);
        assert_eq!(resumed.tasks[0].paused_ms, 7 * 60_000);
        // 7 minutes left at pause time, 7 minutes left after resuming.
        assert_eq!(resumed.tasks[0].planned_end_at, Some(t0() + mins(17)));
    }

    #[test]
    fn pause_time_accumulates_across_cycles() {
        let mut run = started(&[30]);
        for cycle in 0..3 {
            let base = t0() + mins(cycle * 5);
            run = pause_run(&run, base).unwrap().run;
            run = resume_run(&run, base + mins(2)).unwrap().run;
        }
        assert_eq!(run.total_pause_ms, 3 * 2 * 60_000);
    }

    #[test]
    fn advance_visits_every_task_then_completes() {
        let mut run = started(&[5, 10, 5]);
        let mut visited = vec![run.active_task().unwrap().name.clone()];

        let t = started_at_offsets();
        let step = advance_to_next_task(&run, t[0]).unwrap();
        assert_eq!(
            step.announcements,
            vec![Announcement::TaskTransition {
                from: "Task 1".into(),
                to: "Task 2".into()
            }]
        );
        run = step.run;
        visited.push(run.active_task().unwrap().name.clone());

        run = advance_to_next_task(&run, t[1]).unwrap().run;
        visited.push(run.active_task().unwrap().name.clone());

        let last = advance_to_next_task(&run, t[2]).unwrap();
        assert_eq!(
            last.announcements,
            vec![Announcement::RunComplete {
                routine: "Morning".into()
            }]
        );
        run = last.run;

        assert_eq!(visited, vec!["Task 1", "Task 2", "Task 3"]);
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.active_task_id, None);
        assert_eq!(run.ended_at, Some(t[2]));
        assert!(run.tasks.iter().all(|t| t.status == TaskStatus::Completed));
        assert_eq!(run.tasks[1].started_at, Some(t[0]));
        assert_eq!(run.tasks[1].completed_at, Some(t[1]));
    }

    fn started_at_offsets() -> [DateTime<Utc>; 3] {
        [t0() + mins(5), t0() + mins(15), t0() + mins(20)]
    }

    #[test]
    fn advance_requires_in_progress_run() {
        let run = create_run_from_template(&template(&[5]), Pace::Steady, t0());
        assert!(matches!(
            advance_to_next_task(&run, t0()),
            Err(RunError::NotRunning { .. })
        ));

        let done = advance_to_next_task(&started(&[5]), t0()).unwrap().run;
        assert!(matches!(
            advance_to_next_task(&done, t0()),
            Err(RunError::RunFinished { .. })
        ));
    }

    #[test]
    fn advance_from_paused_closes_pause() {
        let run = started(&[5, 5]);
        let paused = pause_run(&run, t0() + mins(1)).unwrap().run;
        let next = advance_to_next_task(&paused, t0() + mins(4)).unwrap().run;
        assert_eq!(next.status, RunStatus::Running);
        assert_eq!(next.paused_at, None);
        assert_eq!(next.total_pause_ms, 3 * 60_000);
        assert_eq!(next.tasks[1].planned_end_at, Some(t0() + mins(9)));
    }

    #[test]
    fn skip_only_active_task_completes_run() {
        let run = started(&[5]);
        let step = skip_task(&run, &run.tasks[0].id, t0() + mins(1)).unwrap();
        assert_eq!(step.run.status, RunStatus::Completed);
        assert_eq!(step.run.tasks[0].status, TaskStatus::Skipped);
        assert_eq!(step.run.tasks[0].completed_at, Some(t0() + mins(1)));
        assert_eq!(step.run.active_task_id, None);
        assert_eq!(
            step.announcements,
            vec![
                Announcement::TaskSkipped {
                    skipped: "Task 1".into(),
                    next: None
                },
                Announcement::RunComplete {
                    routine: "Morning".into()
                }
            ]
        );
    }

    #[test]
    fn skip_active_starts_next() {
        let run = started(&[5, 10]);
        let step = skip_task(&run, &run.tasks[0].id, t0() + mins(2)).unwrap();
        assert_eq!(step.run.active_task().unwrap().name, "Task 2");
        assert_eq!(
            step.announcements,
            vec![Announcement::TaskSkipped {
                skipped: "Task 1".into(),
                next: Some("Task 2".into())
            }]
        );
    }

    #[test]
    fn skip_pending_task_has_no_side_effects() {
        let run = started(&[5, 10, 5]);
        let step = skip_task(&run, &run.tasks[1].id, t0() + mins(1)).unwrap();
        assert!(step.announcements.is_empty());
        assert_eq!(
            statuses(&step.run),
            vec![TaskStatus::Active, TaskStatus::Skipped, TaskStatus::Pending]
        );
        assert_eq!(step.run.active_task_id, run.active_task_id);

        // The skipped task is passed over when advancing.
        let next = advance_to_next_task(&step.run, t0() + mins(5)).unwrap().run;
        assert_eq!(next.active_task().unwrap().name, "Task 3");
    }

    #[test]
    fn skip_errors() {
        let run = started(&[5, 5]);
        assert_eq!(
            skip_task(&run, "missing", t0()).unwrap_err(),
            RunError::TaskNotFound("missing".into())
        );

        let run = advance_to_next_task(&run, t0() + mins(5)).unwrap().run;
        let completed_id = run.tasks[0].id.clone();
        assert_eq!(
            skip_task(&run, &completed_id, t0()).unwrap_err(),
            RunError::TaskNotPending {
                task_id: completed_id,
                status: TaskStatus::Completed
            }
        );

        let ended = end_run(&run, t0() + mins(6)).unwrap().run;
        assert!(matches!(
            skip_task(&ended, &ended.tasks[1].id, t0()),
            Err(RunError::RunFinished { .. })
        ));
    }

    #[test]
    fn end_run_skips_only_active_task() {
        let run = started(&[5, 10, 5]);
        let ended = end_run(&run, t0() + mins(2)).unwrap().run;
        assert_eq!(ended.status, RunStatus::Abandoned);
        assert_eq!(ended.ended_at, Some(t0() + mins(2)));
        assert_eq!(ended.active_task_id, None);
        assert_eq!(
            statuses(&ended),
            vec![TaskStatus::Skipped, TaskStatus::Pending, TaskStatus::Pending]
        );
    }

    #[test]
    fn end_run_before_start_and_while_paused() {
        let fresh = create_run_from_template(&template(&[5]), Pace::Steady, t0());
        let ended = end_run(&fresh, t0()).unwrap().run;
        assert_eq!(ended.status, RunStatus::Abandoned);
        assert_eq!(ended.tasks[0].status, TaskStatus::Pending);

        let paused = pause_run(&started(&[5]), t0() + mins(1)).unwrap().run;
        let ended = end_run(&paused, t0() + mins(3)).unwrap().run;
        assert_eq!(ended.total_pause_ms, 2 * 60_000);
        assert_eq!(ended.paused_at, None);
        assert_eq!(ended.status, RunStatus::Abandoned);
    }

    #[test]
    fn finished_runs_are_final() {
        let ended = end_run(&started(&[5]), t0()).unwrap().run;
        assert!(matches!(end_run(&ended, t0()), Err(RunError::RunFinished { .. })));
        assert!(matches!(pause_run(&ended, t0()), Err(RunError::NotRunning { .. })));
        assert!(matches!(resume_run(&ended, t0()), Err(RunError::NotPaused { .. })));
    }

    #[test]
    fn rejected_transition_leaves_input_untouched() {
        let run = started(&[5]);
        let snapshot = run.clone();
        let _ = resume_run(&run, t0());
        let _ = skip_task(&run, "missing", t0());
        assert_eq!(run, snapshot);
    }

    #[test]
    fn advance_ignores_vec_position_and_uses_order() {
        let mut run = create_run_from_template(&template(&[5, 5, 5]), Pace::Steady, t0());
        run.tasks.swap(0, 2);
        let run = start_run(&run, t0()).unwrap().run;
        assert_eq!(run.active_task().unwrap().name, "Task 1");
    }
}
