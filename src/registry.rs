//! The capability registry tracks which concrete model versions exist for each provider
//! family and tier, and how each family namespaces its model identifiers.
//!
//! A registry document is loaded once per process. Loading validates the whole catalog up
//! front (schema version, empty tiers, unparsable versions) so that a partially valid
//! catalog is never used. The resulting [`Registry`] has no mutation API; callers share it
//! through a read-only handle such as `Arc<Registry>`.
//!
//! Resolution reads two things from it:
//! - the entries of a `(family, tier)` pair, highest version first, and
//! - the namespace prefix of a family, e.g. `claude` is served as `anthropic/<id>`.
//!
//! Both are data, so adding a family or re-ranking a tier never touches resolver code.

pub(crate) mod catalog;
pub(crate) mod source;

use std::path::Path;
use tracing::info;

pub(crate) use catalog::{LookupError, ModelEntry, Registry, RegistryError};

/// Read, parse, and validate the registry document at `path`.
pub(crate) fn load_path(path: &Path) -> Result<Registry, RegistryError> {
    let raw = source::read_path(path)?;

    let registry = Registry::load(raw)?;

    info!(
        path = %path.display(),
        schema_version = registry.schema_version(),
        families = registry.families().count(),
        "loaded capability registry"
    );

    Ok(registry)
}
