use serde::Serialize;

use super::list::format_output;
use super::table::Table;
use super::{load_descriptors, select_descriptors, Context};
use crate::batch::resolve_all;
use crate::resolver::ResolutionSource;
use crate::{error, ResolveArgs};

#[derive(Serialize)]
pub(crate) struct Resolution {
    evaluator: String,
    model: String,
    source: ResolutionSource,
}

impl From<Vec<Resolution>> for Table {
    fn from(value: Vec<Resolution>) -> Self {
        let mut tab = Table::new(vec!["EVALUATOR", "MODEL", "SOURCE"]);

        for res in value {
            tab.add_row(vec![res.evaluator, res.model, res.source.to_string()]);
        }

        tab
    }
}

/// Resolve every selected evaluator, print what resolved, and report every failure.
pub(crate) fn resolve_cmd(ctx: &Context, args: &ResolveArgs) -> bool {
    let paths = match select_descriptors(ctx, &args.evaluators) {
        Ok(paths) => paths,
        Err(err) => {
            error!("{}", err);
            return false;
        }
    };

    let mut passed = true;
    let mut configs = Vec::new();

    for loaded in load_descriptors(paths) {
        match loaded.config {
            Ok(config) => configs.push(config),
            Err(err) => {
                error!("{}", err);
                passed = false;
            }
        }
    }

    let report = resolve_all(&ctx.registry, &configs);

    let resolutions: Vec<Resolution> = report
        .resolved
        .into_iter()
        .map(|(evaluator, resolved)| Resolution {
            evaluator,
            model: resolved.model,
            source: resolved.source,
        })
        .collect();

    format_output(resolutions, args.format);

    for failure in &report.failures {
        error!("{}", failure);
        passed = false;
    }

    passed
}
