pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "azora")]
#[command(about = "Azora CLI - Operator tasks for the Azora API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply database migrations (PostgreSQL stores only)")]
    Migrate,

    #[command(about = "Run the budget sweep once and stop apps over budget")]
    CheckBudgets,

    #[command(about = "Validate a deployment bundle locally")]
    ValidateZip {
        #[arg(help = "Path to the ZIP archive")]
        file: std::path::PathBuf,
        #[arg(long, help = "App type: react, node or next")]
        app_type: String,
    },

    #[command(about = "Print the Azure consent URL for a registered user")]
    OauthUrl {
        #[arg(long, help = "Email of the registered user")]
        email: String,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::db::migrate(output_format).await,
        Commands::CheckBudgets => commands::budget::check_budgets(output_format).await,
        Commands::ValidateZip { file, app_type } => commands::bundle::validate_zip(&file, &app_type, output_format),
        Commands::OauthUrl { email } => commands::oauth::oauth_url(&email, output_format).await,
    }
}
