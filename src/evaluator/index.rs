//! The evaluator library index, `index.json` at the root of the evaluators directory.
//!
//! ```json
//! {
//!   "evaluators": [{ "name": "claude-quick", "path": "anthropic/claude-quick/evaluator.yml" }],
//!   "categories": { "quick-check": ["claude-quick"] },
//!   "providers": { "anthropic": ["claude-quick"] }
//! }
//! ```
//!
//! Paths are relative to the evaluators directory. Every descriptor in the library must be
//! listed, and every listed path must exist.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::descriptor::{self, DescriptorError};

pub(crate) const INDEX_FILE: &str = "index.json";

#[derive(Error, Debug)]
pub(crate) enum IndexError {
    #[error("failed to read index \"{}\": {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse index \"{}\": {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Discover(#[from] DescriptorError),
}

#[derive(Deserialize, Debug)]
pub(crate) struct Index {
    pub evaluators: Vec<IndexEntry>,
    #[allow(dead_code)]
    pub categories: serde_json::Value,
    #[allow(dead_code)]
    pub providers: serde_json::Value,
}

#[derive(Deserialize, Debug)]
pub(crate) struct IndexEntry {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum IndexProblem {
    /// A descriptor in the library that the index does not list
    Unlisted(PathBuf),
    /// An index entry whose path does not exist
    Dangling(String),
}

impl fmt::Display for IndexProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexProblem::Unlisted(path) => {
                write!(f, "{} is not listed in {}", path.display(), INDEX_FILE)
            }
            IndexProblem::Dangling(path) => {
                write!(f, "{} lists {}, which does not exist", INDEX_FILE, path)
            }
        }
    }
}

pub(crate) fn parse_str(raw: &str, path: &Path) -> Result<Index, IndexError> {
    serde_json::from_str(raw).map_err(|e| IndexError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

pub(crate) fn load(library: &Path) -> Result<Index, IndexError> {
    let path = library.join(INDEX_FILE);

    let raw = std::fs::read_to_string(&path).map_err(|e| IndexError::Read {
        path: path.clone(),
        source: e,
    })?;

    parse_str(&raw, &path)
}

/// Compare the index of `library` with the descriptors actually present.
pub(crate) fn check(library: &Path) -> Result<Vec<IndexProblem>, IndexError> {
    let index = load(library)?;

    let listed: BTreeSet<PathBuf> = index
        .evaluators
        .iter()
        .map(|entry| PathBuf::from(&entry.path))
        .collect();

    let mut problems = Vec::new();

    for found in descriptor::discover(library)? {
        let relative = found.strip_prefix(library).unwrap_or(&found).to_path_buf();

        if !listed.contains(&relative) {
            problems.push(IndexProblem::Unlisted(relative));
        }
    }

    for entry in &index.evaluators {
        if !library.join(&entry.path).exists() {
            problems.push(IndexProblem::Dangling(entry.path.clone()));
        }
    }

    Ok(problems)
}
