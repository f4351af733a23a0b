//! Progress announcements for the active task.
//!
//! The caller polls [`tick`] periodically. It decides which announcements are
//! due and records them on the task so repeated polls never announce the same
//! boundary twice. Delivery is up to the caller (see [`crate::notify`]).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::machine::{advance_to_next_task, Transition};
use super::model::{RoutineRun, RunStatus};
use super::timing::{elapsed_ms, remaining_ms};
use crate::error::RunError;
use crate::notify::Announcement;

/// Which progress announcements fire, and how often.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementConfig {
    #[serde(default = "default_true")]
    pub milestones_enabled: bool,
    /// Announce every N minutes of elapsed time.
    #[serde(default = "default_interval_min")]
    pub milestone_interval_min: u32,
    #[serde(default = "default_true")]
    pub overtime_enabled: bool,
    /// Announce every N minutes past the planned end.
    #[serde(default = "default_interval_min")]
    pub overtime_interval_min: u32,
    #[serde(default = "default_true")]
    pub time_up_enabled: bool,
    /// Warn this many seconds before an auto-advance task moves on.
    #[serde(default = "default_warning_secs")]
    pub auto_advance_warning_secs: u32,
}

fn default_true() -> bool {
    true
}
fn default_interval_min() -> u32 {
    5
}
fn default_warning_secs() -> u32 {
    30
}

impl Default for AnnouncementConfig {
    fn default() -> Self {
        Self {
            milestones_enabled: true,
            milestone_interval_min: default_interval_min(),
            overtime_enabled: true,
            overtime_interval_min: default_interval_min(),
            time_up_enabled: true,
            auto_advance_warning_secs: default_warning_secs(),
        }
    }
}

/// One poll of a running run.
///
/// An auto-advance task whose time is up is completed and the next task
/// started. Otherwise any due announcements for the active task are returned
/// and marked as made. Runs that aren't running come back unchanged.
pub fn tick(
    run: &RoutineRun,
    now: DateTime<Utc>,
    config: &AnnouncementConfig,
) -> Result<Transition, RunError> {
    let Some(task) = run.active_task() else {
        return Ok(Transition::quiet(run.clone()));
    };
    if run.status != RunStatus::Running {
        return Ok(Transition::quiet(run.clone()));
    }

    let remaining = remaining_ms(task, now).unwrap_or(0);
    if task.auto_advance && remaining <= 0 {
        tracing::debug!(run_id = %run.id, task_id = %task.id, "auto-advancing");
        return advance_to_next_task(run, now);
    }

    Ok(check_progress(run, now, config))
}

/// Collect due announcements for the active task without advancing.
pub fn check_progress(
    run: &RoutineRun,
    now: DateTime<Utc>,
    config: &AnnouncementConfig,
) -> Transition {
    let mut next = run.clone();
    let Some(index) = next
        .active_task_id
        .as_deref()
        .and_then(|id| next.task_index(id))
    else {
        return Transition::quiet(next);
    };
    if next.status != RunStatus::Running {
        return Transition::quiet(next);
    }

    let task = &mut next.tasks[index];
    let mut announcements = Vec::new();
    let remaining = remaining_ms(task, now).unwrap_or(0);

    if task.auto_advance
        && !task.auto_advance_warning_announced
        && remaining > 0
        && remaining <= i64::from(config.auto_advance_warning_secs) * 1000
    {
        task.auto_advance_warning_announced = true;
        announcements.push(Announcement::AutoAdvanceWarning {
            task: task.name.clone(),
            seconds_left: ceil_div(remaining, 1000) as u32,
        });
    }

    if config.milestones_enabled && config.milestone_interval_min > 0 {
        let elapsed_min = whole_minutes(elapsed_ms(task, now));
        let planned_min = whole_minutes(task.planned_total_ms());
        let crossed = highest_multiple(elapsed_min, config.milestone_interval_min);
        if let Some(milestone) = crossed.filter(|m| *m < planned_min) {
            let newly: Vec<u32> = multiples_after(
                &task.milestone_announced_minutes,
                milestone,
                config.milestone_interval_min,
            )
            .collect();
            if !newly.is_empty() {
                task.milestone_announced_minutes.extend(newly);
                announcements.push(Announcement::Milestone {
                    task: task.name.clone(),
                    elapsed_min: milestone,
                });
            }
        }
    }

    if remaining <= 0 && !task.auto_advance {
        if config.time_up_enabled && !task.time_up_announced {
            task.time_up_announced = true;
            announcements.push(Announcement::TimeUp {
                task: task.name.clone(),
            });
        }

        if config.overtime_enabled && config.overtime_interval_min > 0 {
            let overtime_min = whole_minutes(remaining.saturating_neg());
            if let Some(mark) = highest_multiple(overtime_min, config.overtime_interval_min) {
                let newly: Vec<u32> = multiples_after(
                    &task.overtime_announced_minutes,
                    mark,
                    config.overtime_interval_min,
                )
                .collect();
                if !newly.is_empty() {
                    task.overtime_announced_minutes.extend(newly);
                    announcements.push(Announcement::Overtime {
                        task: task.name.clone(),
                        overtime_min: mark,
                    });
                }
            }
        }
    }

    if !announcements.is_empty() {
        tracing::debug!(run_id = %next.id, count = announcements.len(), "progress announcements due");
    }

    Transition {
        run: next,
        announcements,
    }
}

/// Largest positive multiple of `step` that is `<= value`.
fn highest_multiple(value: u32, step: u32) -> Option<u32> {
    let m = value / step * step;
    (m > 0).then_some(m)
}

/// Multiples of `step` up to `max` above the highest one already recorded.
/// Recorded marks always form a prefix `step, 2*step, ..`.
fn multiples_after(recorded: &BTreeSet<u32>, max: u32, step: u32) -> impl Iterator<Item = u32> {
    let first = recorded.last().map_or(1, |m| m / step + 1);
    (first..=max / step).map(move |k| k * step)
}

fn whole_minutes(ms: i64) -> u32 {
    u32::try_from(ms.max(0) / 60_000).unwrap_or(u32::MAX)
}

fn ceil_div(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::{create_run_from_template, extend_task, pause_run, start_run, TaskStatus};
    use crate::template::{Pace, PaceInclusion, RoutineTemplate, TemplateTask};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 9, 8, 0, 0).unwrap()
    }

    fn mins(m: i64) -> Duration {
        Duration::minutes(m)
    }

    fn run_with(tasks: &[(u32, bool)]) -> RoutineRun {
        let template = RoutineTemplate {
            id: "tpl".into(),
            name: "Evening".into(),
            tasks: tasks
                .iter()
                .enumerate()
                .map(|(i, &(minutes, auto))| TemplateTask {
                    id: format!("t{i}"),
                    name: format!("Task {i}"),
                    duration_min: minutes,
                    paces: PaceInclusion::ALL,
                    subtasks: Vec::new(),
                    order: i as u32,
                    auto_advance: auto,
                })
                .collect(),
        };
        let run = create_run_from_template(&template, Pace::Steady, t0());
        start_run(&run, t0()).unwrap().run
    }

    fn cfg() -> AnnouncementConfig {
        AnnouncementConfig::default()
    }

    #[test]
    fn milestones_fire_once_per_boundary() {
        let run = run_with(&[(20, false)]);

        let quiet = tick(&run, t0() + mins(4), &cfg()).unwrap();
        assert!(quiet.announcements.is_empty());

        let first = tick(&run, t0() + mins(5), &cfg()).unwrap();
        assert_eq!(
            first.announcements,
            vec![Announcement::Milestone {
                task: "Task 0".into(),
                elapsed_min: 5
            }]
        );

        let again = tick(&first.run, t0() + mins(6), &cfg()).unwrap();
        assert!(again.announcements.is_empty());

        // After a long gap only the latest boundary is spoken, but both recorded.
        let jump = tick(&again.run, t0() + mins(16), &cfg()).unwrap();
        assert_eq!(
            jump.announcements,
            vec![Announcement::Milestone {
                task: "Task 0".into(),
                elapsed_min: 15
            }]
        );
        let recorded: Vec<u32> = jump.run.tasks[0]
            .milestone_announced_minutes
            .iter()
            .copied()
            .collect();
        assert_eq!(recorded, vec![5, 10, 15]);
    }

    #[test]
    fn no_milestone_at_planned_end() {
        let run = run_with(&[(10, false)]);
        let first = tick(&run, t0() + mins(5), &cfg()).unwrap();
        let at_end = tick(&first.run, t0() + mins(10), &cfg()).unwrap();
        assert_eq!(
            at_end.announcements,
            vec![Announcement::TimeUp {
                task: "Task 0".into()
            }]
        );
    }

    #[test]
    fn time_up_then_overtime_intervals() {
        let run = run_with(&[(10, false)]);
        let config = AnnouncementConfig {
            milestones_enabled: false,
            ..cfg()
        };

        let up = tick(&run, t0() + mins(10), &config).unwrap();
        assert_eq!(up.announcements.len(), 1);
        assert!(up.run.tasks[0].time_up_announced);

        let still = tick(&up.run, t0() + mins(12), &config).unwrap();
        assert!(still.announcements.is_empty());

        let over = tick(&still.run, t0() + mins(15), &config).unwrap();
        assert_eq!(
            over.announcements,
            vec![Announcement::Overtime {
                task: "Task 0".into(),
                overtime_min: 5
            }]
        );

        let repeat = tick(&over.run, t0() + mins(17), &config).unwrap();
        assert!(repeat.announcements.is_empty());

        let ten = tick(&repeat.run, t0() + mins(20), &config).unwrap();
        assert_eq!(
            ten.announcements,
            vec![Announcement::Overtime {
                task: "Task 0".into(),
                overtime_min: 10
            }]
        );
        // Task is never advanced without auto-advance.
        assert_eq!(ten.run.tasks[0].status, TaskStatus::Active);
    }

    #[test]
    fn extension_rearms_time_up() {
        let run = run_with(&[(10, false)]);
        let config = AnnouncementConfig {
            milestones_enabled: false,
            ..cfg()
        };
        let up = tick(&run, t0() + mins(16), &config).unwrap();
        assert_eq!(up.announcements.len(), 2);

        let id = up.run.tasks[0].id.clone();
        let extended = extend_task(&up.run, &id, 2 * 60_000, t0() + mins(16)).unwrap().run;
        let quiet = tick(&extended, t0() + mins(17), &config).unwrap();
        assert!(quiet.announcements.is_empty());

        let again = tick(&quiet.run, t0() + mins(18), &config).unwrap();
        assert_eq!(
            again.announcements,
            vec![Announcement::TimeUp {
                task: "Task 0".into()
            }]
        );
    }

    #[test]
    fn auto_advance_warns_then_advances() {
        let run = run_with(&[(2, true), (5, false)]);

        let warn = tick(&run, t0() + Duration::seconds(100), &cfg()).unwrap();
        assert_eq!(
            warn.announcements,
            vec![Announcement::AutoAdvanceWarning {
                task: "Task 0".into(),
                seconds_left: 20
            }]
        );

        let quiet = tick(&warn.run, t0() + Duration::seconds(110), &cfg()).unwrap();
        assert!(quiet.announcements.is_empty());

        let advanced = tick(&quiet.run, t0() + mins(2), &cfg()).unwrap();
        assert_eq!(
            advanced.announcements,
            vec![Announcement::TaskTransition {
                from: "Task 0".into(),
                to: "Task 1".into()
            }]
        );
        assert_eq!(advanced.run.active_task().unwrap().name, "Task 1");
    }

    #[test]
    fn paused_and_idle_runs_are_untouched() {
        let run = run_with(&[(1, true)]);
        let paused = pause_run(&run, t0()).unwrap().run;
        let polled = tick(&paused, t0() + mins(30), &cfg()).unwrap();
        assert_eq!(polled.run, paused);
        assert!(polled.announcements.is_empty());

        let template = RoutineTemplate {
            id: "x".into(),
            name: "X".into(),
            tasks: Vec::new(),
        };
        let fresh = create_run_from_template(&template, Pace::Low, t0());
        assert_eq!(tick(&fresh, t0(), &cfg()).unwrap().run, fresh);
    }

    #[test]
    fn disabled_categories_are_not_recorded() {
        let run = run_with(&[(10, false)]);
        let config = AnnouncementConfig {
            milestones_enabled: false,
            time_up_enabled: false,
            overtime_enabled: false,
            ..cfg()
        };
        let polled = tick(&run, t0() + mins(30), &config).unwrap();
        assert!(polled.announcements.is_empty());
        assert!(polled.run.tasks[0].milestone_announced_minutes.is_empty());
        assert!(!polled.run.tasks[0].time_up_announced);
    }

    #[test]
    fn config_defaults_from_empty_toml() {
        let parsed: AnnouncementConfig = toml::from_str("").unwrap();
        assert_eq!(parsed, AnnouncementConfig::default());
    }
}
