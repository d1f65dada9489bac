//! Evaluator descriptors on disk.
//!
//! Each evaluator lives in its own directory as `evaluator.yml`, next to a `README.md` and a
//! `CHANGELOG.md`:
//!
//! ```yaml
//! name: claude-quick
//! description: Fast sanity pass
//! model: ""
//! api_key_env: ANTHROPIC_API_KEY
//! prompt: |
//!   Review the following document.
//!   {content}
//! output_suffix: CLAUDE-QUICK
//! model_requirement:
//!   family: claude
//!   tier: haiku
//!   min_version: "4.5"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::{ConfigError, EvaluatorConfig, EvaluatorFields, ModelRequirement, CONTENT_PLACEHOLDER};
use crate::version::{ParseError, VersionText};

pub(crate) const DESCRIPTOR_FILE: &str = "evaluator.yml";

/// Documentation expected beside every descriptor.
pub(crate) const REQUIRED_DOCS: [&str; 2] = ["README.md", "CHANGELOG.md"];

#[derive(Error, Debug)]
pub(crate) enum DescriptorError {
    #[error("failed to read \"{}\": {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse \"{}\": {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("\"{}\": prompt is missing the {} placeholder", .path.display(), CONTENT_PLACEHOLDER)]
    MissingPlaceholder { path: PathBuf },
    #[error("\"{}\": invalid min_version: {source}", .path.display())]
    MinVersion {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error("\"{}\": {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
}

#[derive(Deserialize, Debug)]
struct RawDescriptor {
    name: String,
    description: String,
    #[serde(default)]
    model: Option<String>,
    api_key_env: String,
    prompt: String,
    output_suffix: String,
    #[serde(default)]
    model_requirement: Option<RawRequirement>,
}

#[derive(Deserialize, Debug)]
struct RawRequirement {
    family: String,
    tier: String,
    #[serde(default)]
    min_version: Option<VersionText>,
}

pub(crate) fn parse_str(raw: &str, path: &Path) -> Result<EvaluatorConfig, DescriptorError> {
    let desc: RawDescriptor = serde_yaml::from_str(raw).map_err(|e| DescriptorError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    if !desc.prompt.contains(CONTENT_PLACEHOLDER) {
        return Err(DescriptorError::MissingPlaceholder {
            path: path.to_path_buf(),
        });
    }

    let model_requirement = match desc.model_requirement {
        Some(req) => {
            let min_version_err = |e: ParseError| DescriptorError::MinVersion {
                path: path.to_path_buf(),
                source: e,
            };

            let min_version = req
                .min_version
                .as_ref()
                .map(VersionText::as_text)
                .transpose()
                .map_err(min_version_err)?;

            let req = ModelRequirement::new(req.family, req.tier, min_version)
                .map_err(min_version_err)?;

            Some(req)
        }
        None => None,
    };

    EvaluatorConfig::new(EvaluatorFields {
        name: desc.name,
        description: desc.description,
        model: desc.model.unwrap_or_default(),
        api_key_env: desc.api_key_env,
        prompt: desc.prompt,
        output_suffix: desc.output_suffix,
        model_requirement,
    })
    .map_err(|e| DescriptorError::Config {
        path: path.to_path_buf(),
        source: e,
    })
}

pub(crate) fn load(path: &Path) -> Result<EvaluatorConfig, DescriptorError> {
    let raw = std::fs::read_to_string(path).map_err(|e| DescriptorError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_str(&raw, path)
}

/// Find every descriptor below `dir`, in a stable order.
pub(crate) fn discover(dir: &Path) -> Result<Vec<PathBuf>, DescriptorError> {
    let mut found = Vec::new();

    discover_into(dir, &mut found)?;

    found.sort();

    Ok(found)
}

fn discover_into(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), DescriptorError> {
    let read_err = |e: std::io::Error| DescriptorError::Read {
        path: dir.to_path_buf(),
        source: e,
    };

    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();

        if entry.file_type().map_err(read_err)?.is_dir() {
            discover_into(&path, found)?;
        } else if entry.file_name() == DESCRIPTOR_FILE {
            found.push(path);
        }
    }

    Ok(())
}

/// Documentation files missing from the directory holding `descriptor`.
pub(crate) fn missing_docs(descriptor: &Path) -> Vec<&'static str> {
    let dir = descriptor.parent().unwrap_or_else(|| Path::new("."));

    REQUIRED_DOCS
        .into_iter()
        .filter(|doc| !dir.join(doc).is_file())
        .collect()
}
