//! Evaluator configurations: the uniform input shape of the resolver.
//!
//! An evaluator names either an explicit model (`model`) or an abstract
//! [`ModelRequirement`], or both. A configuration is validated when it is built and cannot be
//! changed afterwards.

pub(crate) mod descriptor;
pub(crate) mod index;

use thiserror::Error;

use crate::version::{ParseError, Version};

/// Placeholder in a prompt template that receives the document under evaluation.
pub(crate) const CONTENT_PLACEHOLDER: &str = "{content}";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConfigError {
    #[error("evaluator \"{evaluator}\": field \"{field}\" must not be empty")]
    EmptyField {
        evaluator: String,
        field: &'static str,
    },
}

/// "The best model in this family and tier, at least this good."
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModelRequirement {
    pub family: String,
    pub tier: String,
    pub min_version: Option<Version>,
}

impl ModelRequirement {
    pub(crate) fn new(
        family: impl Into<String>,
        tier: impl Into<String>,
        min_version: Option<&str>,
    ) -> Result<ModelRequirement, ParseError> {
        Ok(ModelRequirement {
            family: family.into(),
            tier: tier.into(),
            min_version: min_version.map(Version::parse).transpose()?,
        })
    }
}

/// Unvalidated fields of an evaluator, as handed over by a descriptor loader.
#[derive(Debug, Clone, Default)]
pub(crate) struct EvaluatorFields {
    pub name: String,
    pub description: String,
    pub model: String,
    pub api_key_env: String,
    pub prompt: String,
    pub output_suffix: String,
    pub model_requirement: Option<ModelRequirement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EvaluatorConfig {
    name: String,
    description: String,
    model: String,
    api_key_env: String,
    prompt: String,
    output_suffix: String,
    model_requirement: Option<ModelRequirement>,
}

impl EvaluatorConfig {
    pub(crate) fn new(fields: EvaluatorFields) -> Result<EvaluatorConfig, ConfigError> {
        let required = [
            ("name", &fields.name),
            ("description", &fields.description),
            ("api_key_env", &fields.api_key_env),
            ("prompt", &fields.prompt),
            ("output_suffix", &fields.output_suffix),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyField {
                    evaluator: fields.name.clone(),
                    field,
                });
            }
        }

        Ok(EvaluatorConfig {
            name: fields.name,
            description: fields.description,
            model: fields.model,
            api_key_env: fields.api_key_env,
            prompt: fields.prompt,
            output_suffix: fields.output_suffix,
            model_requirement: fields.model_requirement,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn description(&self) -> &str {
        &self.description
    }

    /// The explicit model override; empty means none.
    pub(crate) fn explicit_model(&self) -> &str {
        &self.model
    }

    pub(crate) fn api_key_env(&self) -> &str {
        &self.api_key_env
    }

    pub(crate) fn output_suffix(&self) -> &str {
        &self.output_suffix
    }

    pub(crate) fn model_requirement(&self) -> Option<&ModelRequirement> {
        self.model_requirement.as_ref()
    }

    /// The prompt with every content placeholder replaced by `content`.
    pub(crate) fn render_prompt(&self, content: &str) -> String {
        self.prompt.replace(CONTENT_PLACEHOLDER, content)
    }
}
