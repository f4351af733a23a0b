//! Clock-bound front end to the run functions.
//!
//! The functions in [`crate::run`] take `now` explicitly. `RunEngine` reads it
//! from a [`Clock`] once per call so callers don't thread timestamps around.
//!
//! ## Usage
//!
//! ```ignore
//! let engine = RunEngine::new(SystemClock, AnnouncementConfig::default());
//! let run = engine.create_from_template(&template, Pace::Steady);
//! let step = engine.start(&run)?;
//! // In a loop:
//! let step = engine.tick(&step.run)?;
//! dispatch(&step.announcements, &notifier, &speaker);
//! ```

use crate::clock::{Clock, SystemClock};
use crate::error::RunError;
use crate::run::{self, AdHocItem, AnnouncementConfig, MovePosition, RoutineRun, Transition};
use crate::template::{Pace, RoutineTemplate};

#[derive(Debug, Clone)]
pub struct RunEngine<C: Clock = SystemClock> {
    clock: C,
    announcements: AnnouncementConfig,
}

impl<C: Clock> RunEngine<C> {
    pub fn new(clock: C, announcements: AnnouncementConfig) -> Self {
        Self {
            clock,
            announcements,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn announcement_config(&self) -> &AnnouncementConfig {
        &self.announcements
    }

    // ── Construction ─────────────────────────────────────────────────

    pub fn create_from_template(&self, template: &RoutineTemplate, pace: Pace) -> RoutineRun {
        run::create_run_from_template(template, pace, self.clock.now())
    }

    pub fn create_from_focus_item(&self, item: &AdHocItem) -> RoutineRun {
        run::create_run_from_focus_item(item, self.clock.now())
    }

    pub fn create_from_optional_item(&self, item: &AdHocItem) -> RoutineRun {
        run::create_run_from_optional_item(item, self.clock.now())
    }

    // ── Transitions ──────────────────────────────────────────────────

    pub fn start(&self, run: &RoutineRun) -> Result<Transition, RunError> {
        run::start_run(run, self.clock.now())
    }

    pub fn pause(&self, run: &RoutineRun) -> Result<Transition, RunError> {
        run::pause_run(run, self.clock.now())
    }

    pub fn resume(&self, run: &RoutineRun) -> Result<Transition, RunError> {
        run::resume_run(run, self.clock.now())
    }

    pub fn advance(&self, run: &RoutineRun) -> Result<Transition, RunError> {
        run::advance_to_next_task(run, self.clock.now())
    }

    pub fn skip(&self, run: &RoutineRun, task_id: &str) -> Result<Transition, RunError> {
        run::skip_task(run, task_id, self.clock.now())
    }

    pub fn extend(&self, run: &RoutineRun, task_id: &str, delta_ms: i64) -> Result<Transition, RunError> {
        run::extend_task(run, task_id, delta_ms, self.clock.now())
    }

    pub fn move_task(
        &self,
        run: &RoutineRun,
        task_id: &str,
        position: MovePosition,
    ) -> Result<Transition, RunError> {
        run::move_task(run, task_id, position)
    }

    pub fn add_quick_task(
        &self,
        run: &RoutineRun,
        name: &str,
        duration_ms: i64,
    ) -> Result<Transition, RunError> {
        run::add_quick_task(run, name, duration_ms, self.clock.now())
    }

    pub fn end(&self, run: &RoutineRun) -> Result<Transition, RunError> {
        run::end_run(run, self.clock.now())
    }

    pub fn toggle_subtask(
        &self,
        run: &RoutineRun,
        task_id: &str,
        subtask_id: &str,
    ) -> Result<Transition, RunError> {
        run::toggle_subtask(run, task_id, subtask_id)
    }

    pub fn toggle_auto_advance(&self, run: &RoutineRun, task_id: &str) -> Result<Transition, RunError> {
        run::toggle_auto_advance(run, task_id)
    }

    /// Call periodically while a run is in progress.
    pub fn tick(&self, run: &RoutineRun) -> Result<Transition, RunError> {
        run::tick(run, self.clock.now(), &self.announcements)
    }

    /// Remaining time of the active task right now.
    pub fn remaining_ms(&self, run: &RoutineRun) -> Option<i64> {
        run.active_remaining_ms(self.clock.now())
    }
}

impl Default for RunEngine<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock, AnnouncementConfig::default())
    }
}
