//! Pre-deploy checks on uploaded zip bundles.

use serde_json::Value;
use std::io::{Cursor, Read};
use std::str::FromStr;
use thiserror::Error;
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppType {
    /// Static build output (`index.html`)
    React,
    /// Node server started with `npm start`
    Node,
    /// Built Next.js app (`.next/`)
    Next,
}

impl FromStr for AppType {
    type Err = BundleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "react" => Ok(AppType::React),
            "node" => Ok(AppType::Node),
            "next" => Ok(AppType::Next),
            other => Err(BundleError::UnknownAppType(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum BundleError {
    #[error("Unknown app type: {0}")]
    UnknownAppType(String),

    #[error("Could not read the ZIP archive: {0}")]
    InvalidArchive(String),

    #[error("Missing `index.html`. Did you forget to build the app (run `npm run build`)?")]
    MissingIndexHtml,

    #[error("Missing `package.json`. This is required to install and start the Node app.")]
    MissingPackageJson,

    #[error("Could not parse `package.json`. Is it a valid JSON file?")]
    InvalidPackageJson,

    #[error("`start` script is missing in `package.json`. Add \"start\": \"node server.js\".")]
    MissingStartScript,

    #[error("Missing `.next/` folder. Did you run `npm run build`?")]
    MissingNextBuild,

    #[error("`package.json` is required to deploy a Next.js app.")]
    NextWithoutPackageJson,
}

/// Check that `bundle` has the layout `app_type` needs to run on App Service
pub fn validate_bundle(bundle: &[u8], app_type: AppType) -> Result<(), BundleError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bundle)).map_err(|e| BundleError::InvalidArchive(e.to_string()))?;
    let entries: Vec<String> = archive.file_names().map(str::to_string).collect();
    let has = |name: &str| entries.iter().any(|e| e == name);

    match app_type {
        AppType::React => {
            if !has("index.html") && !has("build/index.html") {
                return Err(BundleError::MissingIndexHtml);
            }
        }
        AppType::Node => {
            if !has("package.json") {
                return Err(BundleError::MissingPackageJson);
            }
            let manifest = read_package_json(&mut archive)?;
            let has_start = manifest
                .pointer("/scripts/start")
                .and_then(Value::as_str)
                .is_some_and(|s| !s.is_empty());
            if !has_start {
                return Err(BundleError::MissingStartScript);
            }
        }
        AppType::Next => {
            if !entries.iter().any(|e| e.starts_with(".next/")) {
                return Err(BundleError::MissingNextBuild);
            }
            if !has("package.json") {
                return Err(BundleError::NextWithoutPackageJson);
            }
        }
    }

    Ok(())
}

fn read_package_json(archive: &mut ZipArchive<Cursor<&[u8]>>) -> Result<Value, BundleError> {
    let mut file = archive
        .by_name("package.json")
        .map_err(|_| BundleError::MissingPackageJson)?;
    let mut text = String::new();
    file.read_to_string(&mut text)
        .map_err(|_| BundleError::InvalidPackageJson)?;
    serde_json::from_str(&text).map_err(|_| BundleError::InvalidPackageJson)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// In-memory zip with the given (path, contents) entries
    pub fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}
