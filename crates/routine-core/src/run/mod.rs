//! The routine run engine.
//!
//! A [`RoutineRun`] is a plain value. Construction functions build one, every
//! transition borrows it and returns a new one, and the caller decides when
//! to persist it.

mod announce;
mod construct;
mod machine;
mod model;
mod queue;
mod timing;

pub use announce::{check_progress, tick, AnnouncementConfig};
pub use construct::{
    create_run_from_focus_item, create_run_from_optional_item, create_run_from_template,
    parse_duration_label, AdHocItem, DEFAULT_ITEM_DURATION_MIN,
};
pub use machine::{
    advance_to_next_task, end_run, pause_run, resume_run, skip_task, start_run, Transition,
};
pub use model::{RoutineRun, RunStatus, RunTask, Subtask, TaskStatus};
pub use queue::{add_quick_task, move_task, toggle_auto_advance, toggle_subtask, MovePosition};
pub use timing::{elapsed_ms, extend_task, overtime_ms, remaining_ms, MAX_ADJUSTMENT_MS};
