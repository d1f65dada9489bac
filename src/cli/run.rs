use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::list::format_output;
use super::table::Table;
use super::{load_descriptors, select_descriptors, Context};
use crate::batch::{
    run_batch, write_results, BatchOptions, BatchReport, UnitReport, UnitStatus, DEFAULT_JOBS,
};
use crate::execution::{CommandExecutor, Executor};
use crate::{error, ListingFormat, RunArgs};

#[derive(Serialize)]
pub(crate) struct UnitRow {
    evaluator: String,
    model: Option<String>,
    verdict: Option<String>,
    status: String,
    duration_secs: Option<f64>,
}

impl From<Vec<UnitRow>> for Table {
    fn from(value: Vec<UnitRow>) -> Self {
        let mut tab = Table::new(vec!["EVALUATOR", "MODEL", "VERDICT", "STATUS", "DURATION"]);

        for row in value {
            tab.add_row(vec![
                row.evaluator,
                row.model.unwrap_or_else(|| "-".to_string()),
                row.verdict.unwrap_or_else(|| "-".to_string()),
                row.status,
                row.duration_secs
                    .map(|secs| format!("{:.1}s", secs))
                    .unwrap_or_else(|| "-".to_string()),
            ]);
        }

        tab
    }
}

fn status_text(status: &UnitStatus) -> String {
    match status {
        UnitStatus::Completed { outcome, .. } => match outcome.exit_code {
            Some(0) => "ok".to_string(),
            Some(code) => format!("exit:{}", code),
            None => "killed".to_string(),
        },
        UnitStatus::ResolutionFailed(_) => "unresolved".to_string(),
        UnitStatus::ExecutionFailed { .. } => "failed".to_string(),
        UnitStatus::OutputFailed { .. } => "unsaved".to_string(),
        UnitStatus::Panicked { .. } => "panicked".to_string(),
    }
}

fn rows(report: &BatchReport) -> Vec<UnitRow> {
    report
        .units
        .iter()
        .map(|unit| {
            let outcome = unit.status.outcome();

            UnitRow {
                evaluator: unit.evaluator.clone(),
                model: unit.status.resolved().map(|r| r.model.clone()),
                verdict: outcome.and_then(|o| o.verdict).map(|v| v.to_string()),
                status: status_text(&unit.status),
                duration_secs: outcome.map(|o| o.duration.as_secs_f64()),
            }
        })
        .collect()
}

fn failure_message(unit: &UnitReport) -> String {
    match &unit.status {
        UnitStatus::ResolutionFailed(err) => err.to_string(),
        UnitStatus::Completed { outcome, .. } => {
            let stderr = outcome.stderr.trim();

            if stderr.is_empty() {
                format!("evaluator \"{}\" exited unsuccessfully", unit.evaluator)
            } else {
                format!(
                    "evaluator \"{}\" exited unsuccessfully: {}",
                    unit.evaluator, stderr
                )
            }
        }
        status => format!(
            "evaluator \"{}\": {}",
            unit.evaluator,
            status.error().unwrap_or_default()
        ),
    }
}

pub(crate) async fn run_cmd(ctx: &Context, args: &RunArgs) -> bool {
    let command = if args.exec.is_empty() {
        &ctx.config.execution.command
    } else {
        &args.exec
    };

    let timeout = Duration::from_secs(args.timeout.unwrap_or_else(|| ctx.config.timeout_secs()));

    let executor: Arc<dyn Executor> = match CommandExecutor::new(command, timeout) {
        Ok(executor) => Arc::new(executor),
        Err(err) => {
            error!("{}", err);
            return false;
        }
    };

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

    if configs.is_empty() {
        error!("no evaluators to run");
        return false;
    }

    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| ctx.config.execution.output_dir.clone());

    let options = BatchOptions {
        document: args.document.clone(),
        jobs: args
            .jobs
            .or(ctx.config.execution.jobs)
            .unwrap_or(DEFAULT_JOBS),
        output_dir: output_dir.clone(),
    };

    let report = match run_batch(Arc::clone(&ctx.registry), configs, options, executor).await {
        Ok(report) => report,
        Err(err) => {
            error!("{}", err);
            return false;
        }
    };

    format_output(rows(&report), ListingFormat::Table);

    for unit in report.failures() {
        error!("{}", failure_message(unit));
    }

    if let Some(dir) = output_dir {
        if let Err(err) = write_results(&dir, &args.document, &report).await {
            error!("{}", err);
            passed = false;
        }
    }

    passed && report.all_passed()
}
