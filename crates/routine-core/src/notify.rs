//! Announcement intents and the collaborators that deliver them.
//!
//! Transitions never talk to a notifier or speaker directly. They return a
//! list of [`Announcement`]s and the caller hands that list to [`dispatch`].

use serde::{Deserialize, Serialize};

/// Something the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Announcement {
    /// The active task was completed and `to` started.
    TaskTransition { from: String, to: String },
    /// The active task was skipped; `next` started, if any task was left.
    TaskSkipped {
        skipped: String,
        next: Option<String>,
    },
    RunComplete { routine: String },
    Milestone { task: String, elapsed_min: u32 },
    TimeUp { task: String },
    Overtime { task: String, overtime_min: u32 },
    AutoAdvanceWarning { task: String, seconds_left: u32 },
}

impl Announcement {
    /// Plain text for the speech renderer.
    pub fn speech_text(&self) -> String {
        match self {
            Announcement::TaskTransition { from, to } => {
                format!("{from} done. Next up: {to}.")
            }
            Announcement::TaskSkipped {
                skipped,
                next: Some(next),
            } => format!("Skipped {skipped}. Next up: {next}."),
            Announcement::TaskSkipped {
                skipped,
                next: None,
            } => format!("Skipped {skipped}."),
            Announcement::RunComplete { routine } => format!("{routine} complete. Nice work."),
            Announcement::Milestone { task, elapsed_min } => {
                format!("{} on {task}.", minutes_phrase(*elapsed_min))
            }
            Announcement::TimeUp { task } => format!("Time is up for {task}."),
            Announcement::Overtime { task, overtime_min } => {
                format!("{task} is {} over.", minutes_phrase(*overtime_min))
            }
            Announcement::AutoAdvanceWarning { task, seconds_left } => {
                format!("{task} ends in {seconds_left} seconds. Moving on automatically.")
            }
        }
    }
}

fn minutes_phrase(minutes: u32) -> String {
    if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{minutes} minutes")
    }
}

/// Transition notifications (system notifications, tray, etc).
pub trait Notifier {
    fn notify_task_transition(&self, from: &str, to: &str);
    fn notify_run_complete(&self);
}

/// Speech renderer. Failures stay inside the implementation.
pub trait Speaker {
    fn speak(&self, text: &str);
}

/// A notifier/speaker that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Notifier for Silent {
    fn notify_task_transition(&self, _from: &str, _to: &str) {}
    fn notify_run_complete(&self) {}
}

impl Speaker for Silent {
    fn speak(&self, _text: &str) {}
}

/// Hand every announcement to the collaborators.
///
/// Transitions go to the notifier; everything is spoken.
pub fn dispatch(announcements: &[Announcement], notifier: &dyn Notifier, speaker: &dyn Speaker) {
    for announcement in announcements {
        match announcement {
            Announcement::TaskTransition { from, to } => {
                notifier.notify_task_transition(from, to);
            }
            Announcement::TaskSkipped {
                skipped,
                next: Some(next),
            } => {
                notifier.notify_task_transition(skipped, next);
            }
            Announcement::RunComplete { .. } => notifier.notify_run_complete(),
            _ => {}
        }
        speaker.speak(&announcement.speech_text());
    }
}
