//! On-disk form of the capability registry.
//!
//! The document looks like this (YAML shown; JSON and TOML carry the same shape):
//!
//! ```yaml
//! schema_version: "1.0.1"
//! providers:
//!   claude:
//!     prefix: "anthropic/"
//!     tiers:
//!       opus:
//!         models:
//!           - id: claude-opus-4-6
//!             version: "4.6"
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::catalog::RegistryError;
use crate::version::VersionText;

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct RawRegistry {
    pub schema_version: String,
    #[serde(default)]
    pub providers: BTreeMap<String, RawFamily>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct RawFamily {
    /// Namespace prepended to bare model ids; defaults to `"<family>/"`.
    pub prefix: Option<String>,
    #[serde(default)]
    pub tiers: BTreeMap<String, RawTier>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct RawTier {
    #[serde(default)]
    pub models: Vec<RawModel>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct RawModel {
    pub id: String,
    pub version: VersionText,
}

/// Serialization notation of a registry document, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Notation {
    Yaml,
    Json,
    Toml,
}

impl Notation {
    pub(crate) fn from_path(path: &Path) -> Option<Notation> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();

        match ext.as_str() {
            "yml" | "yaml" => Some(Notation::Yaml),
            "json" => Some(Notation::Json),
            "toml" => Some(Notation::Toml),
            _ => None,
        }
    }
}

pub(crate) fn parse_str(raw: &str, notation: Notation) -> Result<RawRegistry, RegistryError> {
    let format_err = |msg: String| RegistryError::Format { notation, msg };

    match notation {
        Notation::Yaml => serde_yaml::from_str(raw).map_err(|e| format_err(e.to_string())),
        Notation::Json => serde_json::from_str(raw).map_err(|e| format_err(e.to_string())),
        Notation::Toml => toml::de::from_str(raw).map_err(|e| format_err(e.to_string())),
    }
}

pub(crate) fn read_path(path: &Path) -> Result<RawRegistry, RegistryError> {
    let notation = Notation::from_path(path)
        .ok_or_else(|| RegistryError::UnknownNotation(path.to_path_buf()))?;

    let raw = std::fs::read_to_string(path).map_err(|e| RegistryError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_str(&raw, notation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notation_from_extension() {
        assert_eq!(
            Notation::from_path(Path::new("providers/registry.yml")),
            Some(Notation::Yaml)
        );
        assert_eq!(
            Notation::from_path(Path::new("registry.YAML")),
            Some(Notation::Yaml)
        );
        assert_eq!(
            Notation::from_path(Path::new("registry.json")),
            Some(Notation::Json)
        );
        assert_eq!(
            Notation::from_path(Path::new("registry.toml")),
            Some(Notation::Toml)
        );
        assert_eq!(Notation::from_path(Path::new("registry")), None);
        assert_eq!(Notation::from_path(Path::new("registry.ini")), None);
    }

    #[test]
    fn test_same_shape_in_every_notation() {
        let yaml = r#"
schema_version: "1.0.1"
providers:
  claude:
    prefix: "anthropic/"
    tiers:
      opus:
        models:
          - id: claude-opus-4-6
            version: "4.6"
"#;
        let json = r#"{
  "schema_version": "1.0.1",
  "providers": {
    "claude": {
      "prefix": "anthropic/",
      "tiers": { "opus": { "models": [ { "id": "claude-opus-4-6", "version": "4.6" } ] } }
    }
  }
}"#;
        let toml = r#"
schema_version = "1.0.1"

[providers.claude]
prefix = "anthropic/"

[[providers.claude.tiers.opus.models]]
id = "claude-opus-4-6"
version = "4.6"
"#;

        for (raw, notation) in [
            (yaml, Notation::Yaml),
            (json, Notation::Json),
            (toml, Notation::Toml),
        ] {
            let parsed = parse_str(raw, notation).unwrap();

            assert_eq!(parsed.schema_version, "1.0.1");
            let claude = &parsed.providers["claude"];
            assert_eq!(claude.prefix.as_deref(), Some("anthropic/"));
            let models = &claude.tiers["opus"].models;
            assert_eq!(models.len(), 1);
            assert_eq!(models[0].id, "claude-opus-4-6");
            assert_eq!(models[0].version.as_text(), Ok("4.6"));
        }
    }

    #[test]
    fn test_syntax_errors_name_the_notation() {
        let err = parse_str("schema_version: [", Notation::Yaml).unwrap_err();

        assert!(matches!(
            err,
            RegistryError::Format {
                notation: Notation::Yaml,
                ..
            }
        ));
    }

    #[test]
    fn test_read_path_rejects_unknown_extension() {
        let err = read_path(Path::new("registry.ini")).unwrap_err();

        assert!(matches!(err, RegistryError::UnknownNotation(_)));
    }
}
