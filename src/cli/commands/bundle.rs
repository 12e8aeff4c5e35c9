use std::path::Path;

use anyhow::Context;

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::services::bundle::{validate_bundle, AppType};

pub fn validate_zip(file: &Path, app_type: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let app_type: AppType = app_type.parse()?;
    let bytes = std::fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;

    match validate_bundle(&bytes, app_type) {
        Ok(()) => output_success(output_format, "ZIP is valid.", None),
        Err(e) => {
            output_error(output_format, "Validation failed.", Some(&e.to_string()))?;
            anyhow::bail!("{} is not a valid {:?} bundle", file.display(), app_type)
        }
    }
}
