use clap::Subcommand;
use routine_core::Database;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Aggregate stats over all finished runs
    All,
    /// Most recent finished runs
    Recent {
        /// How many runs to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        StatsAction::All => {
            let stats = db.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::Recent { limit } => {
            let runs = db.recent_runs(limit)?;
            println!("{}", serde_json::to_string_pretty(&runs)?);
        }
    }
    Ok(())
}
