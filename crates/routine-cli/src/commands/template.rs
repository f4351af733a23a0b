//! Routine template commands.

use clap::Subcommand;
use routine_core::{Pace, TemplateStore};
use serde::Serialize;

#[derive(Subcommand)]
pub enum TemplateAction {
    /// List available templates with their planned minutes per pace
    List,
    /// Show one template
    Show {
        /// Template ID
        id: String,
        /// Only show tasks included at this pace (low, steady, flow)
        #[arg(long)]
        pace: Option<Pace>,
    },
}

#[derive(Serialize)]
struct TemplateSummary<'a> {
    id: &'a str,
    name: &'a str,
    tasks: usize,
    low_min: u64,
    steady_min: u64,
    flow_min: u64,
}

pub fn run(action: TemplateAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = TemplateStore::load()?;

    match action {
        TemplateAction::List => {
            let summaries: Vec<TemplateSummary> = store
                .list()
                .iter()
                .map(|t| TemplateSummary {
                    id: &t.id,
                    name: &t.name,
                    tasks: t.tasks.len(),
                    low_min: t.total_duration_min(Pace::Low),
                    steady_min: t.total_duration_min(Pace::Steady),
                    flow_min: t.total_duration_min(Pace::Flow),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        TemplateAction::Show { id, pace } => {
            let template = store.get(&id)?;
            match pace {
                Some(pace) => {
                    let tasks = routine_core::template::visible_tasks(&template.tasks, pace);
                    println!("{}", serde_json::to_string_pretty(&tasks)?);
                }
                None => println!("{}", serde_json::to_string_pretty(template)?),
            }
        }
    }
    Ok(())
}
