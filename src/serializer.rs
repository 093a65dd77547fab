//! Serialization of the finished document to JSON and YAML.
//!
//! The document is rendered completely before anything is written, so a
//! serialization failure leaves no partial output behind.

use crate::error::Result;
use crate::openapi_builder::Document;
use log::{debug, info};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const JSON_FILE: &str = "swagger.json";
pub const YAML_FILE: &str = "swagger.yml";

/// Serializes a document to YAML.
///
/// # Errors
///
/// Returns [`Error::SerializationError`](crate::error::Error::SerializationError)
/// if serialization fails.
pub fn serialize_yaml(doc: &Document) -> Result<String> {
    debug!("Serializing document to YAML");
    Ok(serde_yaml::to_string(doc)?)
}

/// Serializes a document to JSON, indented with four spaces.
///
/// # Errors
///
/// Returns [`Error::SerializationError`](crate::error::Error::SerializationError)
/// if serialization fails.
pub fn serialize_json(doc: &Document) -> Result<String> {
    debug!("Serializing document to JSON");
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    doc.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Writes string content to a file, creating parent directories.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// Writes `swagger.json` and `swagger.yml` into `output_dir`.
///
/// Returns the paths written.
pub fn write_outputs(doc: &Document, output_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let json = serialize_json(doc)?;
    let yaml = serialize_yaml(doc)?;

    let json_path = output_dir.join(JSON_FILE);
    let yaml_path = output_dir.join(YAML_FILE);
    write_to_file(&json, &json_path)?;
    write_to_file(&yaml, &yaml_path)?;
    info!(
        "Wrote {} and {}",
        json_path.display(),
        yaml_path.display()
    );
    Ok((json_path, yaml_path))
}
