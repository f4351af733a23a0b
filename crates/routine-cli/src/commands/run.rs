//! Commands that drive the current routine run.
//!
//! The live run is kept as JSON in the database between invocations. Each
//! command loads it, applies one transition, dispatches the announcements and
//! saves the result. Finished runs move to the history table.

use clap::Subcommand;
use routine_core::{
    dispatch, AdHocItem, Announcement, Config, Database, MovePosition, Notifier, Pace, RoutineRun,
    RunEngine, Silent, Speaker, SystemClock, TemplateStore, Transition,
};
use serde::Serialize;

#[derive(Subcommand)]
pub enum RunAction {
    /// Create a run from a template and start it
    Start {
        /// Template ID (defaults to `defaults.template`)
        #[arg(long)]
        template: Option<String>,
        /// Pace: low, steady or flow (defaults to `defaults.pace`)
        #[arg(long)]
        pace: Option<Pace>,
    },
    /// Start a single-task run for a focus item
    Focus {
        /// Item title
        #[arg(long)]
        title: String,
        /// Item ID
        #[arg(long, default_value = "focus")]
        id: String,
        /// Duration label such as "25m", "1h 30m" or "20-30 min"
        #[arg(long)]
        duration: Option<String>,
    },
    /// Start a single-task run for an optional item
    Optional {
        /// Item title
        #[arg(long)]
        title: String,
        /// Item ID
        #[arg(long, default_value = "optional")]
        id: String,
        /// Duration label such as "25m", "1h 30m" or "20-30 min"
        #[arg(long)]
        duration: Option<String>,
    },
    /// Pause the run
    Pause,
    /// Resume a paused run
    Resume,
    /// Complete the active task and start the next one
    Next,
    /// Skip a task (the active one if no ID is given)
    Skip {
        /// Task ID
        task: Option<String>,
    },
    /// Add or remove minutes on a task
    Extend {
        /// Task ID
        task: String,
        /// Minutes to add (negative to remove)
        #[arg(allow_negative_numbers = true)]
        minutes: i64,
    },
    /// Move a pending task within the queue
    Move {
        /// Task ID
        task: String,
        /// up, down, next, end or a zero-based queue index
        position: MovePosition,
    },
    /// Insert a quick task right after the active one
    Add {
        /// Task name
        name: String,
        /// Planned minutes
        minutes: u32,
    },
    /// End the run early
    End,
    /// Toggle a subtask's checked state
    Subtask {
        /// Task ID
        task: String,
        /// Subtask ID
        subtask: String,
    },
    /// Toggle auto-advance on a task
    AutoAdvance {
        /// Task ID
        task: String,
    },
    /// Poll the run: auto-advance and progress announcements
    Tick,
    /// Print the current run as JSON
    Status,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    run: &'a RoutineRun,
    remaining_ms: Option<i64>,
    announcements: &'a [Announcement],
}

/// Logs transitions; desktop notifications are left to a GUI front end.
struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_task_transition(&self, from: &str, to: &str) {
        tracing::info!(from, to, "task transition");
    }

    fn notify_run_complete(&self) {
        tracing::info!("routine complete");
    }
}

/// Writes speech text to the log.
struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&self, text: &str) {
        tracing::info!(target: "routine_cli::speech", "{text}");
    }
}

fn require_run(db: &Database) -> Result<RoutineRun, Box<dyn std::error::Error>> {
    db.load_current_run()?
        .ok_or_else(|| "no routine run in progress; use `run start`".into())
}

fn ensure_no_live_run(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(run) = db.load_current_run()? {
        if !run.is_finished() {
            return Err(format!(
                "run {} ({}) is still {}; end it first",
                run.id, run.template_name, run.status
            )
            .into());
        }
    }
    Ok(())
}

fn active_task_id(run: &RoutineRun) -> Result<String, Box<dyn std::error::Error>> {
    run.active_task_id
        .clone()
        .ok_or_else(|| "no active task".into())
}

pub fn run(action: RunAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let config = Config::load_or_default();
    let engine = RunEngine::new(SystemClock, config.announcements.clone());

    let step: Transition = match action {
        RunAction::Start { template, pace } => {
            ensure_no_live_run(&db)?;
            let store = TemplateStore::load()?;
            let template_id = template.unwrap_or_else(|| config.defaults.template.clone());
            let template = store.get(&template_id)?;
            let pace = pace.unwrap_or(config.defaults.pace);
            let run = engine.create_from_template(template, pace);
            engine.start(&run)?
        }
        RunAction::Focus {
            title,
            id,
            duration,
        } => {
            ensure_no_live_run(&db)?;
            let item = AdHocItem {
                id,
                title,
                duration_label: duration,
            };
            engine.start(&engine.create_from_focus_item(&item))?
        }
        RunAction::Optional {
            title,
            id,
            duration,
        } => {
            ensure_no_live_run(&db)?;
            let item = AdHocItem {
                id,
                title,
                duration_label: duration,
            };
            engine.start(&engine.create_from_optional_item(&item))?
        }
        RunAction::Pause => engine.pause(&require_run(&db)?)?,
        RunAction::Resume => engine.resume(&require_run(&db)?)?,
        RunAction::Next => engine.advance(&require_run(&db)?)?,
        RunAction::Skip { task } => {
            let run = require_run(&db)?;
            let task_id = match task {
                Some(id) => id,
                None => active_task_id(&run)?,
            };
            engine.skip(&run, &task_id)?
        }
        RunAction::Extend { task, minutes } => {
            engine.extend(&require_run(&db)?, &task, minutes.saturating_mul(60_000))?
        }
        RunAction::Move { task, position } => {
            engine.move_task(&require_run(&db)?, &task, position)?
        }
        RunAction::Add { name, minutes } => {
            engine.add_quick_task(&require_run(&db)?, &name, i64::from(minutes) * 60_000)?
        }
        RunAction::End => engine.end(&require_run(&db)?)?,
        RunAction::Subtask { task, subtask } => {
            engine.toggle_subtask(&require_run(&db)?, &task, &subtask)?
        }
        RunAction::AutoAdvance { task } => engine.toggle_auto_advance(&require_run(&db)?, &task)?,
        RunAction::Tick => engine.tick(&require_run(&db)?)?,
        RunAction::Status => Transition::quiet(require_run(&db)?),
    };

    if config.speech.enabled {
        dispatch(&step.announcements, &LogNotifier, &LogSpeaker);
    } else {
        dispatch(&step.announcements, &LogNotifier, &Silent);
    }

    let output = RunOutput {
        run: &step.run,
        remaining_ms: engine.remaining_ms(&step.run),
        announcements: &step.announcements,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    if step.run.is_finished() {
        if db.record_run(&step.run)?.is_some() {
            tracing::info!(run_id = %step.run.id, status = %step.run.status, "run recorded");
        }
        db.clear_current_run()?;
    } else {
        db.save_current_run(&step.run)?;
    }
    Ok(())
}
