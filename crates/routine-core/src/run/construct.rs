//! Building fresh runs from templates and single ad-hoc items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::{RoutineRun, RunStatus, RunTask, Subtask};
use crate::template::{visible_tasks, Pace, RoutineTemplate};

/// Duration used when an item's label can't be parsed.
pub const DEFAULT_ITEM_DURATION_MIN: u32 = 15;

/// A single item (today's focus or an optional extra) run on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdHocItem {
    pub id: String,
    pub title: String,
    /// Free-form label such as "15m", "1h 30m" or "20 min".
    #[serde(default)]
    pub duration_label: Option<String>,
}

/// Where an ad-hoc run came from. Only affects the run's template id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemSource {
    Focus,
    Optional,
}

impl ItemSource {
    fn prefix(&self) -> &'static str {
        match self {
            ItemSource::Focus => "focus",
            ItemSource::Optional => "optional",
        }
    }
}

/// Build a not-started run from the tasks of `template` visible at `pace`.
pub fn create_run_from_template(
    template: &RoutineTemplate,
    pace: Pace,
    now: DateTime<Utc>,
) -> RoutineRun {
    let mut visible = visible_tasks(&template.tasks, pace);
    visible.sort_by_key(|t| t.order);

    let created_ms = now.timestamp_millis();
    let tasks: Vec<RunTask> = visible
        .into_iter()
        .enumerate()
        .map(|(position, source)| {
            let mut task = RunTask::pending(
                format!("{}-{}-{}", source.id, created_ms, position),
                source.name.clone(),
                source.duration_ms(),
                position as u32,
            );
            task.template_task_id = Some(source.id.clone());
            task.auto_advance = source.auto_advance;
            task.subtasks = source
                .subtasks
                .iter()
                .map(|s| Subtask {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    checked: false,
                })
                .collect();
            task
        })
        .collect();

    tracing::debug!(
        template_id = %template.id,
        %pace,
        task_count = tasks.len(),
        "created run from template"
    );

    new_run(template.id.clone(), template.name.clone(), pace, tasks, now)
}

pub fn create_run_from_focus_item(item: &AdHocItem, now: DateTime<Utc>) -> RoutineRun {
    create_single_item_run(item, ItemSource::Focus, now)
}

pub fn create_run_from_optional_item(item: &AdHocItem, now: DateTime<Utc>) -> RoutineRun {
    create_single_item_run(item, ItemSource::Optional, now)
}

fn create_single_item_run(item: &AdHocItem, source: ItemSource, now: DateTime<Utc>) -> RoutineRun {
    let minutes = match item.duration_label.as_deref() {
        Some(label) => parse_duration_label(label).unwrap_or_else(|| {
            tracing::warn!(
                item_id = %item.id,
                label,
                "unparseable duration label, using {DEFAULT_ITEM_DURATION_MIN} minutes"
            );
            DEFAULT_ITEM_DURATION_MIN
        }),
        None => DEFAULT_ITEM_DURATION_MIN,
    };

    let task = RunTask::pending(
        format!("{}-{}-0", item.id, now.timestamp_millis()),
        item.title.clone(),
        i64::from(minutes) * 60_000,
        0,
    );

    new_run(
        format!("{}:{}", source.prefix(), item.id),
        item.title.clone(),
        Pace::Steady,
        vec![task],
        now,
    )
}

fn new_run(
    template_id: String,
    template_name: String,
    pace: Pace,
    tasks: Vec<RunTask>,
    now: DateTime<Utc>,
) -> RoutineRun {
    RoutineRun {
        id: Uuid::new_v4().to_string(),
        template_id,
        template_name,
        pace,
        tasks,
        status: RunStatus::NotStarted,
        created_at: now,
        started_at: None,
        paused_at: None,
        total_pause_ms: 0,
        ended_at: None,
        active_task_id: None,
    }
}

/// Parse a duration label into whole minutes.
///
/// Accepts `h`/`hr`/`hour(s)` and `m`/`min(s)`/`minute(s)` units, compound
/// forms (`1h 30m`), decimals (`1.5h`) and bare numbers (minutes). A range
/// such as `20-30 min` yields its lower bound. Returns `None` when nothing
/// positive can be read.
pub fn parse_duration_label(label: &str) -> Option<u32> {
    let mut chars = label.trim().chars().peekable();
    let mut total_min = 0.0_f64;
    let mut found = false;

    while chars.peek().is_some() {
        while chars
            .peek()
            .is_some_and(|c| !(c.is_ascii_digit() || *c == '.'))
        {
            chars.next();
        }

        let mut number = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                number.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if !number.chars().any(|c| c.is_ascii_digit()) {
            break;
        }
        let value: f64 = number.parse().ok()?;

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let mut unit = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_alphabetic() {
                unit.push(c.to_ascii_lowercase());
                chars.next();
            } else {
                break;
            }
        }

        if unit.is_empty() && chars.peek().is_some_and(|c| *c == '-' || *c == '–') {
            // Range: take the lower bound with the upper bound's unit.
            chars.next();
            let rest: String = chars.by_ref().collect();
            let unit = rest
                .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c.is_whitespace())
                .chars()
                .take_while(|c| c.is_alphabetic())
                .collect::<String>()
                .to_ascii_lowercase();
            total_min += value * unit_factor(&unit)?;
            found = true;
            break;
        }

        total_min += value * unit_factor(&unit)?;
        found = true;
    }

    let minutes = total_min.round();
    if found && minutes >= 1.0 && minutes <= f64::from(u32::MAX) {
        Some(minutes as u32)
    } else {
        None
    }
}

fn unit_factor(unit: &str) -> Option<f64> {
    match unit {
        "" | "m" | "min" | "mins" | "minute" | "minutes" => Some(1.0),
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(60.0),
        _ => None,
    }
}
