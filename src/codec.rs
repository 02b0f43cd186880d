//! Loading and writing Clash profiles.
//!
//! Profiles are YAML on disk (JSON also accepted) and become a generic
//! `serde_json::Value` tree for reconciliation. The YAML side is converted
//! explicitly so values JSON cannot carry are rejected instead of being
//! quietly turned into `null`.

use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tokio::io::AsyncReadExt;

/// On-disk representation of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// `.json` is JSON; everything else, including no extension, is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yaml => write!(f, "yaml"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Parse profile text.
pub fn decode(text: &str, format: DocumentFormat) -> Result<Value> {
    match format {
        DocumentFormat::Json => serde_json::from_str(text).context("invalid JSON profile"),
        DocumentFormat::Yaml => {
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(text).context("invalid YAML profile")?;
            yaml_to_json(yaml, "$")
        }
    }
}

/// Render a profile.
pub fn encode(document: &Value, format: DocumentFormat) -> Result<String> {
    match format {
        DocumentFormat::Json => {
            let mut out =
                serde_json::to_string_pretty(document).context("failed to render JSON")?;
            out.push('\n');
            Ok(out)
        }
        DocumentFormat::Yaml => serde_yaml::to_string(document).context("failed to render YAML"),
    }
}

fn yaml_to_json(value: serde_yaml::Value, path: &str) -> Result<Value> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => Value::Number(yaml_number(&n, path)?),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| yaml_to_json(item, &format!("{path}[{i}]")))
                .collect::<Result<_>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (key, item) in mapping {
                let key = mapping_key(key, path)?;
                let child = format!("{path}.{key}");
                map.insert(key, yaml_to_json(item, &child)?);
            }
            Value::Object(map)
        }
        // Tags such as `!!str` carry no meaning for Clash; keep the payload.
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value, path)?,
    })
}

fn yaml_number(n: &serde_yaml::Number, path: &str) -> Result<Number> {
    if let Some(i) = n.as_i64() {
        return Ok(Number::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(Number::from(u));
    }
    match n.as_f64().and_then(Number::from_f64) {
        Some(f) => Ok(f),
        None => bail!("{path}: non-finite number `{n}` cannot be represented"),
    }
}

fn mapping_key(key: serde_yaml::Value, path: &str) -> Result<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Null => Ok("null".to_string()),
        serde_yaml::Value::Tagged(tagged) => mapping_key(tagged.value, path),
        other => bail!("{path}: unsupported mapping key {other:?}"),
    }
}

/// Read a profile from `path`, or from stdin when `path` is `-`.
///
/// Stdin content is treated as YAML, which also accepts JSON.
pub async fn load_document(path: &Path) -> Result<(Value, DocumentFormat)> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("failed to read profile from stdin")?;
        return Ok((decode(&text, DocumentFormat::Yaml)?, DocumentFormat::Yaml));
    }

    let format = DocumentFormat::from_path(path);
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read profile {}", path.display()))?;
    let document =
        decode(&text, format).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok((document, format))
}

/// Write a profile to `path`, creating parent directories as needed.
pub async fn save_document(path: &Path, document: &Value, format: DocumentFormat) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let text = encode(document, format)?;
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("failed to write profile {}", path.display()))?;
    Ok(())
}
