use serde::Serialize;

use super::table::{IntoTable, Table};
use super::Context;
use crate::registry::Registry;
use crate::{error, ListArgs, ListModelArgs, ListObject, ListingFormat};

#[derive(Serialize)]
pub(crate) struct Model {
    family: String,
    tier: String,
    id: String,
    version: String,
    qualified: String,
}

impl From<Vec<Model>> for Table {
    fn from(value: Vec<Model>) -> Self {
        let mut tab = Table::new(vec!["FAMILY", "TIER", "VERSION", "MODEL"]);

        for model in value {
            tab.add_row(vec![model.family, model.tier, model.version, model.qualified]);
        }

        tab
    }
}

#[derive(Serialize)]
pub(crate) struct Family {
    family: String,
    prefix: String,
    tiers: Vec<String>,
}

impl From<Vec<Family>> for Table {
    fn from(value: Vec<Family>) -> Self {
        let mut tab = Table::new(vec!["FAMILY", "PREFIX", "TIERS"]);

        for family in value {
            tab.add_row(vec![family.family, family.prefix, family.tiers.join(",")]);
        }

        tab
    }
}

fn get_models(registry: &Registry, args: &ListModelArgs) -> Vec<Model> {
    let mut models = Vec::new();

    let families = registry
        .families()
        .filter(|f| args.family.as_deref().map_or(true, |want| f.name() == want));

    for family in families {
        let tiers = family
            .tiers()
            .filter(|t| args.tier.as_deref().map_or(true, |want| t.name() == want));

        for tier in tiers {
            for entry in tier.models() {
                models.push(Model {
                    family: family.name().to_string(),
                    tier: tier.name().to_string(),
                    id: entry.id().to_string(),
                    version: entry.version().to_string(),
                    qualified: format!("{}{}", family.prefix(), entry.id()),
                });
            }
        }
    }

    models
}

fn get_families(registry: &Registry) -> Vec<Family> {
    registry
        .families()
        .map(|family| Family {
            family: family.name().to_string(),
            prefix: family.prefix().to_string(),
            tiers: family.tiers().map(|t| t.name().to_string()).collect(),
        })
        .collect()
}

pub(crate) fn format_output<O: IntoTable + Serialize>(object: O, format: ListingFormat) {
    match format {
        ListingFormat::Json => match serde_json::to_string_pretty(&object) {
            Ok(output) => println!("{}", output),
            Err(err) => error!("failed to serialize output: {}", err),
        },
        ListingFormat::Table => {
            let tab = object.into_table();

            print!("{}", tab);
        }
        ListingFormat::HeaderlessTable => {
            let mut tab = object.into_table();

            tab.print_header(false);

            print!("{}", tab);
        }
    }
}

pub(crate) fn list_cmd(ctx: &Context, args: &ListArgs) -> bool {
    match &args.object {
        ListObject::Models(model_args) => {
            let models = get_models(&ctx.registry, model_args);

            if models.is_empty() {
                error!("no models match the given family and tier");
                return false;
            }

            format_output(models, args.format);
        }
        ListObject::Families => {
            format_output(get_families(&ctx.registry), args.format);
        }
    }

    true
}
