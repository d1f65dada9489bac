use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use super::source::{Notation, RawFamily, RawRegistry, RawTier};
use crate::version::{ParseError, Version};

/// The only catalog schema this build understands.
pub(crate) const SUPPORTED_SCHEMA_VERSION: &str = "1.0.1";

#[derive(Error, Debug)]
pub(crate) enum RegistryError {
    /// The catalog was written for a different schema
    #[error("registry schema version \"{found}\" is not supported, expected \"{expected}\"")]
    SchemaMismatch {
        found: String,
        expected: &'static str,
    },
    /// A family without tiers or a tier without models
    #[error("{}", empty_tier_message(.family, .tier.as_deref()))]
    EmptyTier { family: String, tier: Option<String> },
    /// A model entry carries an unparsable version
    #[error("model \"{model}\" in \"{family}/{tier}\" has an invalid version: {source}")]
    BadVersion {
        family: String,
        tier: String,
        model: String,
        #[source]
        source: ParseError,
    },
    /// A model entry without an identifier
    #[error("tier \"{family}/{tier}\" contains a model with an empty id")]
    MissingModelId { family: String, tier: String },
    #[error("cannot tell the notation of registry \"{}\", expected .yml, .yaml, .json or .toml", .0.display())]
    UnknownNotation(PathBuf),
    #[error("failed to read registry \"{}\": {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {notation} registry: {msg}")]
    Format { notation: Notation, msg: String },
}

fn empty_tier_message(family: &str, tier: Option<&str>) -> String {
    match tier {
        Some(tier) => format!("tier \"{}/{}\" lists no models", family, tier),
        None => format!("family \"{}\" defines no tiers", family),
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum LookupError {
    #[error("family \"{family}\" is not in the registry")]
    UnknownFamily { family: String },
    #[error("family \"{family}\" has no tier \"{tier}\"")]
    UnknownTier { family: String, tier: String },
}

#[derive(Debug, Clone)]
pub(crate) struct ModelEntry {
    /// Provider-internal, unprefixed identifier.
    id: String,
    version: Version,
}

impl ModelEntry {
    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn version(&self) -> &Version {
        &self.version
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Tier {
    name: String,
    /// Ordered by version, highest first. Equal versions keep catalog order.
    models: Vec<ModelEntry>,
}

impl Tier {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn models(&self) -> &[ModelEntry] {
        &self.models
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Family {
    name: String,
    prefix: String,
    tiers: BTreeMap<String, Tier>,
}

impl Family {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn prefix(&self) -> &str {
        &self.prefix
    }

    pub(crate) fn tiers(&self) -> impl Iterator<Item = &Tier> {
        self.tiers.values()
    }
}

/// A validated, immutable snapshot of the capability catalog.
///
/// Built once by [`Registry::load`]; nothing mutates it afterwards, so a single instance can
/// be shared by reference across any number of concurrent resolutions.
#[derive(Debug, Clone)]
pub(crate) struct Registry {
    schema_version: String,
    families: BTreeMap<String, Family>,
}

impl Registry {
    pub(crate) fn load(raw: RawRegistry) -> Result<Registry, RegistryError> {
        if raw.schema_version.trim() != SUPPORTED_SCHEMA_VERSION {
            return Err(RegistryError::SchemaMismatch {
                found: raw.schema_version,
                expected: SUPPORTED_SCHEMA_VERSION,
            });
        }

        let mut families = BTreeMap::new();

        for (name, family) in raw.providers {
            let family = build_family(name.clone(), family)?;

            families.insert(name, family);
        }

        Ok(Registry {
            schema_version: raw.schema_version,
            families,
        })
    }

    pub(crate) fn schema_version(&self) -> &str {
        &self.schema_version
    }

    pub(crate) fn families(&self) -> impl Iterator<Item = &Family> {
        self.families.values()
    }

    pub(crate) fn family(&self, family: &str) -> Result<&Family, LookupError> {
        self.families
            .get(family)
            .ok_or_else(|| LookupError::UnknownFamily {
                family: family.to_string(),
            })
    }

    /// Entries of a tier, highest version first.
    pub(crate) fn tier_models(&self, family: &str, tier: &str) -> Result<&[ModelEntry], LookupError> {
        let fam = self.family(family)?;

        match fam.tiers.get(tier) {
            Some(tier) => Ok(&tier.models),
            None => Err(LookupError::UnknownTier {
                family: family.to_string(),
                tier: tier.to_string(),
            }),
        }
    }

    pub(crate) fn prefix_for(&self, family: &str) -> Result<&str, LookupError> {
        self.family(family).map(|fam| fam.prefix.as_str())
    }
}

fn build_family(name: String, raw: RawFamily) -> Result<Family, RegistryError> {
    if raw.tiers.is_empty() {
        return Err(RegistryError::EmptyTier {
            family: name,
            tier: None,
        });
    }

    let mut tiers = BTreeMap::new();

    for (tier_name, tier) in raw.tiers {
        let tier = build_tier(&name, tier_name.clone(), tier)?;

        tiers.insert(tier_name, tier);
    }

    let prefix = raw.prefix.unwrap_or_else(|| format!("{}/", name));

    Ok(Family { name, prefix, tiers })
}

fn build_tier(family: &str, name: String, raw: RawTier) -> Result<Tier, RegistryError> {
    if raw.models.is_empty() {
        return Err(RegistryError::EmptyTier {
            family: family.to_string(),
            tier: Some(name),
        });
    }

    let mut models = Vec::with_capacity(raw.models.len());

    for model in raw.models {
        if model.id.trim().is_empty() {
            return Err(RegistryError::MissingModelId {
                family: family.to_string(),
                tier: name,
            });
        }

        let version = model.version.parse().map_err(|e| RegistryError::BadVersion {
            family: family.to_string(),
            tier: name.clone(),
            model: model.id.clone(),
            source: e,
        })?;

        models.push(ModelEntry {
            id: model.id,
            version,
        });
    }

    // sort_by is stable, which keeps catalog order among equal versions
    models.sort_by(|a, b| Version::compare(&b.version, &a.version));

    Ok(Tier { name, models })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::registry::source::{parse_str, Notation};

    pub(crate) const CLAUDE_REGISTRY: &str = r#"
schema_version: "1.0.1"
providers:
  claude:
    prefix: "anthropic/"
    tiers:
      opus:
        models:
          - id: claude-opus-4-5
            version: "4.5"
          - id: claude-opus-4-6
            version: "4.6"
      sonnet:
        models:
          - id: claude-sonnet-4-5
            version: "4.5"
      haiku:
        models:
          - id: claude-haiku-4-5
            version: "4.5"
  gemini:
    tiers:
      pro:
        models:
          - id: gemini-2-pro
            version: "2"
          - id: gemini-3-pro-20260101
            version: "3"
"#;

    pub(crate) fn registry_from_yaml(yaml: &str) -> Result<Registry, RegistryError> {
        Registry::load(parse_str(yaml, Notation::Yaml)?)
    }

    pub(crate) fn claude_registry() -> Registry {
        registry_from_yaml(CLAUDE_REGISTRY).unwrap()
    }

    fn ids(models: &[ModelEntry]) -> Vec<&str> {
        models.iter().map(|m| m.id()).collect()
    }

    #[test]
    fn test_tier_models_are_ordered_by_version_descending() {
        let registry = claude_registry();

        let opus = registry.tier_models("claude", "opus").unwrap();
        assert_eq!(ids(opus), ["claude-opus-4-6", "claude-opus-4-5"]);

        let pro = registry.tier_models("gemini", "pro").unwrap();
        assert_eq!(ids(pro), ["gemini-3-pro-20260101", "gemini-2-pro"]);
    }

    #[test]
    fn test_numeric_ordering_within_tier() {
        let registry = registry_from_yaml(
            r#"
schema_version: "1.0.1"
providers:
  fam:
    tiers:
      top:
        models:
          - { id: nine, version: "4.9" }
          - { id: ten, version: "4.10" }
          - { id: two, version: "4.2" }
"#,
        )
        .unwrap();

        let top = registry.tier_models("fam", "top").unwrap();
        assert_eq!(ids(top), ["ten", "nine", "two"]);
    }

    #[test]
    fn test_equal_versions_keep_catalog_order() {
        let registry = registry_from_yaml(
            r#"
schema_version: "1.0.1"
providers:
  fam:
    tiers:
      top:
        models:
          - { id: first, version: "1.0" }
          - { id: newest, version: "2" }
          - { id: second, version: "1" }
          - { id: third, version: "1.0.0" }
"#,
        )
        .unwrap();

        let top = registry.tier_models("fam", "top").unwrap();
        assert_eq!(ids(top), ["newest", "first", "second", "third"]);
    }

    #[test]
    fn test_prefix_defaults_to_family_name() {
        let registry = claude_registry();

        assert_eq!(registry.prefix_for("claude").unwrap(), "anthropic/");
        assert_eq!(registry.prefix_for("gemini").unwrap(), "gemini/");
    }

    #[test]
    fn test_lookup_errors() {
        let registry = claude_registry();

        assert_eq!(
            registry.tier_models("mistral", "large").unwrap_err(),
            LookupError::UnknownFamily {
                family: "mistral".to_string()
            }
        );
        assert_eq!(
            registry.tier_models("claude", "ultra").unwrap_err(),
            LookupError::UnknownTier {
                family: "claude".to_string(),
                tier: "ultra".to_string()
            }
        );
        assert!(matches!(
            registry.prefix_for("mistral"),
            Err(LookupError::UnknownFamily { .. })
        ));
    }

    #[test]
    fn test_schema_mismatch_is_fatal() {
        let err = registry_from_yaml("schema_version: \"1.0.0\"\nproviders: {}\n").unwrap_err();

        match err {
            RegistryError::SchemaMismatch { found, expected } => {
                assert_eq!(found, "1.0.0");
                assert_eq!(expected, SUPPORTED_SCHEMA_VERSION);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_empty_family_and_tier() {
        let err = registry_from_yaml(
            "schema_version: \"1.0.1\"\nproviders:\n  fam:\n    tiers: {}\n",
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::EmptyTier { tier: None, .. }));
        assert_eq!(err.to_string(), "family \"fam\" defines no tiers");

        let err = registry_from_yaml(
            "schema_version: \"1.0.1\"\nproviders:\n  fam:\n    tiers:\n      top:\n        models: []\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::EmptyTier { tier: Some(ref t), .. } if t == "top"
        ));
    }

    #[test]
    fn test_bad_version_names_the_entry() {
        let err = registry_from_yaml(
            r#"
schema_version: "1.0.1"
providers:
  fam:
    tiers:
      top:
        models:
          - { id: good, version: "1.2" }
          - { id: broken, version: "1.x" }
"#,
        )
        .unwrap_err();

        match err {
            RegistryError::BadVersion {
                family,
                tier,
                model,
                source,
            } => {
                assert_eq!(family, "fam");
                assert_eq!(tier, "top");
                assert_eq!(model, "broken");
                assert!(matches!(source, ParseError::NonNumeric { .. }));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unquoted_fractional_versions_are_refused() {
        let err = registry_from_yaml(
            r#"
schema_version: "1.0.1"
providers:
  fam:
    tiers:
      top:
        models:
          - { id: m-4-9, version: "4.9" }
          - { id: m-4-10, version: 4.10 }
"#,
        )
        .unwrap_err();

        match err {
            RegistryError::BadVersion { model, source, .. } => {
                assert_eq!(model, "m-4-10");
                assert_eq!(source, ParseError::Unquoted("4.1".to_string()));
            }
            other => panic!("unexpected error: {}", other),
        }

        let whole = registry_from_yaml(
            "schema_version: \"1.0.1\"\nproviders:\n  fam:\n    tiers:\n      top:\n        models:\n          - { id: m-5, version: 5 }\n",
        )
        .unwrap();
        assert_eq!(whole.tier_models("fam", "top").unwrap()[0].version().as_str(), "5");
    }

    #[test]
    fn test_missing_model_id() {
        let err = registry_from_yaml(
            "schema_version: \"1.0.1\"\nproviders:\n  fam:\n    tiers:\n      top:\n        models:\n          - { id: \"\", version: \"1\" }\n",
        )
        .unwrap_err();

        assert!(matches!(err, RegistryError::MissingModelId { .. }));
    }

    #[test]
    fn test_registry_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Registry>();
    }
}
