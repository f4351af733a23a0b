//! # Routine Runner Core Library
//!
//! This library drives a user through a routine: a timed sequence of tasks
//! with pause/resume accounting, manual extensions, reordering, skips,
//! auto-advance and one-shot progress announcements. The CLI binary is a thin
//! caller over the same library.
//!
//! ## Architecture
//!
//! - **Run Engine**: Pure transition functions over a [`RoutineRun`] value.
//!   Each takes the current run and `now`, and returns a new run plus any
//!   [`Announcement`]s. The caller ticks it periodically.
//! - **Templates**: Read-only routine definitions with per-pace inclusion.
//! - **Storage**: SQLite for the live run and run history, TOML for
//!   configuration and templates.
//!
//! ## Key Components
//!
//! - [`RunEngine`]: Clock-bound front end to the transition functions
//! - [`RoutineTemplate`]: Routine definition
//! - [`Database`]: Live run and history persistence
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod engine;
pub mod error;
pub mod notify;
pub mod run;
pub mod storage;
pub mod template;

pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::RunEngine;
pub use error::{ConfigError, CoreError, DatabaseError, RunError, TemplateError};
pub use notify::{dispatch, Announcement, Notifier, Silent, Speaker};
pub use run::{
    AdHocItem, AnnouncementConfig, MovePosition, RoutineRun, RunStatus, RunTask, Subtask,
    TaskStatus, Transition,
};
pub use storage::{Config, Database, RunRecord, RunStats, TemplateStore};
pub use template::{Pace, PaceInclusion, RoutineTemplate, TemplateProvider, TemplateTask};
