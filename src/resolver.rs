//! Resolution of an evaluator configuration to a concrete, execution-ready model id.
//!
//! An explicit `model` always wins and is returned verbatim, without consulting the
//! registry and without adding a namespace prefix. Otherwise the evaluator's
//! [`ModelRequirement`](crate::evaluator::ModelRequirement) is looked up in the registry:
//! the highest-version entry of the requested tier that meets the minimum version is
//! selected and qualified with the family prefix.
//!
//! ```text
//! model: "anthropic/claude-opus-4-6"              -> anthropic/claude-opus-4-6 (explicit)
//! model_requirement: {claude, opus}               -> anthropic/claude-opus-4-6 (requirement)
//! model_requirement: {claude, opus, min: "4.7"}   -> error, available: 4.5, 4.6
//! ```
//!
//! Resolution is a pure function of the configuration and the registry: it performs no I/O
//! and keeps no state between calls.

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::evaluator::EvaluatorConfig;
use crate::registry::{LookupError, ModelEntry, Registry};
use crate::version::Version;

/// How a resolved model id was obtained.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub(crate) enum ResolutionSource {
    /// The evaluator pinned the model id.
    Explicit,
    /// The model id was selected from the registry.
    Requirement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ResolvedModel {
    pub model: String,
    pub source: ResolutionSource,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum ResolutionError {
    /// Neither an explicit model nor a requirement
    #[error("evaluator \"{evaluator}\" names neither a model nor a model requirement")]
    Unresolvable { evaluator: String },
    /// The requirement points outside the registry
    #[error("evaluator \"{evaluator}\" requires {family}/{tier}, but {source}")]
    UnknownTierOrFamily {
        evaluator: String,
        family: String,
        tier: String,
        #[source]
        source: LookupError,
    },
    /// Every entry in the tier is older than the requested minimum
    #[error(
        "evaluator \"{evaluator}\" requires {family}/{tier} >= {minimum}, available versions: {}",
        .available.join(", ")
    )]
    NoVersionSatisfiesMinimum {
        evaluator: String,
        family: String,
        tier: String,
        minimum: String,
        /// Versions present in the tier, lowest first.
        available: Vec<String>,
    },
}

impl ResolutionError {
    pub(crate) fn evaluator(&self) -> &str {
        match self {
            ResolutionError::Unresolvable { evaluator }
            | ResolutionError::UnknownTierOrFamily { evaluator, .. }
            | ResolutionError::NoVersionSatisfiesMinimum { evaluator, .. } => evaluator,
        }
    }
}

pub(crate) struct ModelResolver<'r> {
    registry: &'r Registry,
}

impl<'r> ModelResolver<'r> {
    pub(crate) fn new(registry: &'r Registry) -> ModelResolver<'r> {
        ModelResolver { registry }
    }

    pub(crate) fn resolve(&self, config: &EvaluatorConfig) -> Result<ResolvedModel, ResolutionError> {
        let explicit = config.explicit_model();

        if !explicit.is_empty() {
            debug!(
                evaluator = config.name(),
                model = explicit,
                "using explicit model"
            );

            return Ok(ResolvedModel {
                model: explicit.to_string(),
                source: ResolutionSource::Explicit,
            });
        }

        let req = match config.model_requirement() {
            Some(req) => req,
            None => {
                return Err(ResolutionError::Unresolvable {
                    evaluator: config.name().to_string(),
                })
            }
        };

        let lookup_err = |e: LookupError| ResolutionError::UnknownTierOrFamily {
            evaluator: config.name().to_string(),
            family: req.family.clone(),
            tier: req.tier.clone(),
            source: e,
        };

        let entries = self
            .registry
            .tier_models(&req.family, &req.tier)
            .map_err(lookup_err)?;

        let selected = match &req.min_version {
            Some(minimum) => entries
                .iter()
                .find(|entry| entry.version().satisfies_minimum(minimum))
                .ok_or_else(|| ResolutionError::NoVersionSatisfiesMinimum {
                    evaluator: config.name().to_string(),
                    family: req.family.clone(),
                    tier: req.tier.clone(),
                    minimum: minimum.to_string(),
                    available: ascending_versions(entries),
                })?,
            None => entries.first().ok_or_else(|| {
                // the registry refuses empty tiers at load time
                lookup_err(LookupError::UnknownTier {
                    family: req.family.clone(),
                    tier: req.tier.clone(),
                })
            })?,
        };

        let prefix = self.registry.prefix_for(&req.family).map_err(lookup_err)?;

        let model = format!("{}{}", prefix, selected.id());

        debug!(
            evaluator = config.name(),
            family = %req.family,
            tier = %req.tier,
            version = %selected.version(),
            model = %model,
            "resolved model requirement"
        );

        Ok(ResolvedModel {
            model,
            source: ResolutionSource::Requirement,
        })
    }
}

fn ascending_versions(entries: &[ModelEntry]) -> Vec<String> {
    let mut versions: Vec<&Version> = entries.iter().map(|e| e.version()).collect();

    versions.sort();

    versions.into_iter().map(|v| v.to_string()).collect()
}

/// Resolve `config` against `registry`.
pub(crate) fn resolve(
    config: &EvaluatorConfig,
    registry: &Registry,
) -> Result<ResolvedModel, ResolutionError> {
    ModelResolver::new(registry).resolve(config)
}
