//! Routine templates.
//!
//! Templates are owned by the template store and are read-only input to run
//! construction.

mod pace;

pub use pace::{visible_tasks, Pace, PaceFlags, PaceInclusion};

use serde::{Deserialize, Serialize};

/// A checklist entry under a template task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSubtask {
    pub id: String,
    pub name: String,
}

/// One task of a routine template.
///
/// Deserializes from either pace-flag encoding; always serializes the current
/// one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTemplateTask", into = "RawTemplateTask")]
pub struct TemplateTask {
    pub id: String,
    pub name: String,
    /// Planned duration in minutes.
    pub duration_min: u32,
    pub paces: PaceInclusion,
    pub subtasks: Vec<TemplateSubtask>,
    pub order: u32,
    pub auto_advance: bool,
}

impl TemplateTask {
    /// Planned duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        i64::from(self.duration_min) * 60_000
    }
}

/// On-disk shape of a template task.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawTemplateTask {
    id: String,
    name: String,
    #[serde(default)]
    duration_min: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    include_in_low: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    include_in_steady: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    include_in_flow: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    low_safe: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    flow_extra: Option<bool>,
    #[serde(default)]
    order: u32,
    #[serde(default)]
    auto_advance: bool,
    #[serde(default)]
    subtasks: Vec<TemplateSubtask>,
}

impl From<RawTemplateTask> for TemplateTask {
    fn from(raw: RawTemplateTask) -> Self {
        let flags = PaceFlags::detect(
            raw.include_in_low,
            raw.include_in_steady,
            raw.include_in_flow,
            raw.low_safe,
            raw.flow_extra,
        );
        if flags.is_legacy() {
            tracing::warn!(task_id = %raw.id, "migrating legacy pace flags");
        }
        Self {
            id: raw.id,
            name: raw.name,
            duration_min: raw.duration_min,
            paces: flags.resolve(),
            subtasks: raw.subtasks,
            order: raw.order,
            auto_advance: raw.auto_advance,
        }
    }
}

impl From<TemplateTask> for RawTemplateTask {
    fn from(task: TemplateTask) -> Self {
        Self {
            id: task.id,
            name: task.name,
            duration_min: task.duration_min,
            include_in_low: Some(task.paces.low),
            include_in_steady: Some(task.paces.steady),
            include_in_flow: Some(task.paces.flow),
            low_safe: None,
            flow_extra: None,
            subtasks: task.subtasks,
            order: task.order,
            auto_advance: task.auto_advance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<TemplateTask>,
}

impl RoutineTemplate {
    /// Planned minutes for everything visible at `pace`.
    pub fn total_duration_min(&self, pace: Pace) -> u64 {
        visible_tasks(&self.tasks, pace)
            .iter()
            .map(|t| u64::from(t.duration_min))
            .sum()
    }

    /// The built-in morning routine used when no templates file exists.
    pub fn default_morning() -> Self {
        fn task(
            id: &str,
            name: &str,
            duration_min: u32,
            paces: PaceInclusion,
            order: u32,
        ) -> TemplateTask {
            TemplateTask {
                id: id.into(),
                name: name.into(),
                duration_min,
                paces,
                subtasks: Vec::new(),
                order,
                auto_advance: false,
            }
        }

        let mut tidy = task("tidy", "Tidy up", 10, PaceInclusion::STEADY_ONLY, 2);
        tidy.subtasks = vec![
            TemplateSubtask {
                id: "tidy-bed".into(),
                name: "Make the bed".into(),
            },
            TemplateSubtask {
                id: "tidy-dishes".into(),
                name: "Clear the dishes".into(),
            },
        ];
        let mut stretch = task("stretch", "Stretch", 5, PaceInclusion::ALL, 1);
        stretch.auto_advance = true;

        Self {
            id: "morning".into(),
            name: "Morning Routine".into(),
            tasks: vec![
                task("water", "Drink water", 2, PaceInclusion::ALL, 0),
                stretch,
                tidy,
                task(
                    "plan",
                    "Plan the day",
                    10,
                    PaceInclusion {
                        low: false,
                        steady: true,
                        flow: true,
                    },
                    3,
                ),
                task("walk", "Go for a walk", 20, PaceInclusion::FLOW_ONLY, 4),
            ],
        }
    }
}

/// Read-only source of templates.
pub trait TemplateProvider {
    fn template(&self, id: &str) -> Option<RoutineTemplate>;
}

impl TemplateProvider for Vec<RoutineTemplate> {
    fn template(&self, id: &str) -> Option<RoutineTemplate> {
        self.iter().find(|t| t.id == id).cloned()
    }
}
