use serde_json::json;

use crate::cli::utils::{load_state, output_success};
use crate::cli::OutputFormat;
use crate::services::budget::{run_budget_sweep, SweepEntry};

pub async fn check_budgets(output_format: OutputFormat) -> anyhow::Result<()> {
    let state = load_state().await?;
    let entries = run_budget_sweep(&state).await?;

    if let OutputFormat::Text = output_format {
        for entry in &entries {
            match entry {
                SweepEntry::Checked { app_id, stopped, cost, budget } => {
                    let verdict = if *stopped { "stopped" } else { "ok" };
                    println!("{}  {:.2} / {:.2}  {}", app_id, cost, budget, verdict);
                }
                SweepEntry::Failed { app_id, error } => println!("{}  failed: {}", app_id, error),
            }
        }
    }

    let message = format!("Checked {} apps", entries.len());
    output_success(output_format, &message, Some(json!({ "apps": entries })))
}
