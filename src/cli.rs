use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::evaluator::descriptor::{self, DescriptorError};
use crate::evaluator::EvaluatorConfig;
use crate::registry::Registry;
use crate::RequestedColorMode;

pub(crate) mod check;
pub(crate) mod list;
pub(crate) mod resolve;
pub(crate) mod run;
pub(crate) mod table;

#[derive(Clone, Copy, strum_macros::Display)]
pub(crate) enum ColorMode {
    On,
    Off,
}

impl ColorMode {
    /// Returns whether ANSI color should be used
    /// If the user has specified a preference, this is honored. This preference
    /// can be specified through the command line or the "NO_COLOR" environment
    /// variable If the user hasn't stated a preference, color is enabled if the
    /// output is a terminal.
    pub(crate) fn resolve_auto(cm: RequestedColorMode) -> ColorMode {
        match cm {
            RequestedColorMode::Auto => {
                let disable_color =
                    std::env::var_os("NO_COLOR").is_some() || !io::stderr().is_terminal();

                if disable_color {
                    ColorMode::Off
                } else {
                    ColorMode::On
                }
            }
            RequestedColorMode::On => ColorMode::On,
            RequestedColorMode::Off => ColorMode::Off,
        }
    }
}

/// State shared by every subcommand.
pub(crate) struct Context {
    pub config: Config,
    pub registry: Arc<Registry>,
}

/// A descriptor that loaded, or the reason it did not.
pub(crate) struct LoadedDescriptor {
    pub path: PathBuf,
    pub config: Result<EvaluatorConfig, DescriptorError>,
}

/// Expand command-line selectors into descriptor paths.
///
/// A selector is a descriptor file, a directory searched recursively, or the name of an
/// evaluator directory below the configured evaluators directory. No selectors means every
/// evaluator in the configured directory.
pub(crate) fn select_descriptors(
    ctx: &Context,
    selectors: &[String],
) -> Result<Vec<PathBuf>, DescriptorError> {
    let library = ctx.config.evaluators_dir();

    if selectors.is_empty() {
        return descriptor::discover(&library);
    }

    let mut paths = Vec::new();
    let mut library_paths: Option<Vec<PathBuf>> = None;

    for selector in selectors {
        let candidate = Path::new(selector);

        if candidate.is_dir() {
            paths.extend(descriptor::discover(candidate)?);
        } else if candidate.is_file() {
            paths.push(candidate.to_path_buf());
        } else {
            if library_paths.is_none() {
                library_paths = Some(descriptor::discover(&library)?);
            }

            let matches = library_paths
                .iter()
                .flatten()
                .filter(|path| evaluator_dir_name(path) == Some(selector.as_str()))
                .cloned()
                .collect::<Vec<_>>();

            if matches.is_empty() {
                return Err(DescriptorError::Read {
                    path: candidate.to_path_buf(),
                    source: io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("no evaluator named \"{}\" in {}", selector, library.display()),
                    ),
                });
            }

            paths.extend(matches);
        }
    }

    Ok(paths)
}

fn evaluator_dir_name(descriptor: &Path) -> Option<&str> {
    descriptor.parent()?.file_name()?.to_str()
}

pub(crate) fn load_descriptors(paths: Vec<PathBuf>) -> Vec<LoadedDescriptor> {
    paths
        .into_iter()
        .map(|path| {
            let config = descriptor::load(&path);

            LoadedDescriptor { path, config }
        })
        .collect()
}
