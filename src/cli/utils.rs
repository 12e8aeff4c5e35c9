use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::config::{config, AppConfig};
use crate::database::open_store;
use crate::state::AppState;

/// Output a success message in the appropriate format
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(Value::Object(fields)) = data {
                if let Some(object) = response.as_object_mut() {
                    object.extend(fields);
                }
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: OutputFormat, message: &str, hint: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(hint) = hint {
                response["hint"] = json!(hint);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
            if let Some(hint) = hint {
                eprintln!("  {}", hint);
            }
        }
    }
    Ok(())
}

/// Build server-equivalent state from the environment (`.env` included)
pub async fn load_state() -> anyhow::Result<AppState> {
    let config: AppConfig = config().clone();
    let store = open_store(&config.database).await?;
    Ok(AppState::new(config, store)?)
}
