//! Running many evaluators over one document.
//!
//! Every evaluator is resolved against the shared registry first. A resolution failure only
//! takes that evaluator out of the run; the rest proceed, and all failures are collected in
//! the final report. Resolved evaluators run concurrently, bounded by `jobs`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::evaluator::EvaluatorConfig;
use crate::execution::{ExecutionError, ExecutionOutcome, ExecutionRequest, Executor, Verdict};
use crate::registry::Registry;
use crate::resolver::{ModelResolver, ResolutionError, ResolvedModel};

pub(crate) const DEFAULT_JOBS: usize = 4;

#[derive(Error, Debug)]
pub(crate) enum BatchError {
    #[error("failed to read document \"{}\": {source}", .path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "evaluators \"{first}\" and \"{second}\" share the output suffix \"{suffix}\", \
         their outputs would overwrite each other"
    )]
    DuplicateSuffix {
        suffix: String,
        first: String,
        second: String,
    },
    #[error("failed to write \"{}\": {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode results: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Resolution results of a set of evaluators, in input order.
#[derive(Debug, Default)]
pub(crate) struct ResolutionReport {
    pub resolved: Vec<(String, ResolvedModel)>,
    pub failures: Vec<ResolutionError>,
}

pub(crate) fn resolve_all(registry: &Registry, configs: &[EvaluatorConfig]) -> ResolutionReport {
    let resolver = ModelResolver::new(registry);
    let mut report = ResolutionReport::default();

    for config in configs {
        match resolver.resolve(config) {
            Ok(resolved) => report.resolved.push((config.name().to_string(), resolved)),
            Err(err) => report.failures.push(err),
        }
    }

    report
}

#[derive(Debug, Clone)]
pub(crate) struct BatchOptions {
    pub document: PathBuf,
    pub jobs: usize,
    /// Where narrative outputs are written; `None` keeps them in memory only.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug)]
pub(crate) enum UnitStatus {
    Completed {
        resolved: ResolvedModel,
        outcome: ExecutionOutcome,
        output_path: Option<PathBuf>,
    },
    ResolutionFailed(ResolutionError),
    ExecutionFailed {
        resolved: ResolvedModel,
        error: ExecutionError,
    },
    /// The evaluation ran but its narrative could not be saved.
    OutputFailed {
        resolved: ResolvedModel,
        outcome: ExecutionOutcome,
        error: BatchError,
    },
    /// The evaluation task panicked before reporting.
    Panicked { resolved: ResolvedModel },
}

impl UnitStatus {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            UnitStatus::Completed { .. } => "completed",
            UnitStatus::ResolutionFailed(_) => "resolution_failed",
            UnitStatus::ExecutionFailed { .. } => "execution_failed",
            UnitStatus::OutputFailed { .. } => "output_failed",
            UnitStatus::Panicked { .. } => "panicked",
        }
    }

    pub(crate) fn resolved(&self) -> Option<&ResolvedModel> {
        match self {
            UnitStatus::Completed { resolved, .. }
            | UnitStatus::ExecutionFailed { resolved, .. }
            | UnitStatus::OutputFailed { resolved, .. }
            | UnitStatus::Panicked { resolved } => Some(resolved),
            UnitStatus::ResolutionFailed(_) => None,
        }
    }

    pub(crate) fn outcome(&self) -> Option<&ExecutionOutcome> {
        match self {
            UnitStatus::Completed { outcome, .. } | UnitStatus::OutputFailed { outcome, .. } => {
                Some(outcome)
            }
            _ => None,
        }
    }

    /// Why the unit failed, when the failure is not just a non-zero exit.
    pub(crate) fn error(&self) -> Option<String> {
        match self {
            UnitStatus::Completed { .. } => None,
            UnitStatus::ResolutionFailed(err) => Some(err.to_string()),
            UnitStatus::ExecutionFailed { error, .. } => Some(error.to_string()),
            UnitStatus::OutputFailed { error, .. } => Some(error.to_string()),
            UnitStatus::Panicked { .. } => Some("evaluation task panicked".to_string()),
        }
    }
}

#[derive(Debug)]
pub(crate) struct UnitReport {
    pub evaluator: String,
    pub status: UnitStatus,
    pub finished_at: DateTime<Utc>,
}

impl UnitReport {
    fn new(evaluator: String, status: UnitStatus) -> UnitReport {
        UnitReport {
            evaluator,
            status,
            finished_at: Utc::now(),
        }
    }

    /// A unit fails unless it ran, exited zero, and its output (if requested) was saved.
    pub(crate) fn failed(&self) -> bool {
        match &self.status {
            UnitStatus::Completed { outcome, .. } => !outcome.success(),
            _ => true,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct BatchReport {
    pub units: Vec<UnitReport>,
}

impl BatchReport {
    pub(crate) fn failures(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|unit| unit.failed())
    }

    pub(crate) fn all_passed(&self) -> bool {
        self.failures().next().is_none()
    }
}

fn document_stem(document: &Path) -> String {
    document
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string())
}

/// Path of the narrative output for an evaluator, `<dir>/<document stem>--<suffix>.md`.
pub(crate) fn output_path(dir: &Path, document: &Path, suffix: &str) -> PathBuf {
    dir.join(format!("{}--{}.md", document_stem(document), suffix))
}

/// Path of the results log of a run, `<dir>/<document stem>--results-<UTC time>.json`.
pub(crate) fn results_path(dir: &Path, document: &Path, at: DateTime<Utc>) -> PathBuf {
    dir.join(format!(
        "{}--results-{}.json",
        document_stem(document),
        at.format("%Y%m%dT%H%M%SZ")
    ))
}

/// Refuse a set of evaluators in which two would write the same output file.
fn check_unique_suffixes(configs: &[EvaluatorConfig]) -> Result<(), BatchError> {
    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();

    for config in configs {
        if let Some(first) = seen.insert(config.output_suffix(), config.name()) {
            return Err(BatchError::DuplicateSuffix {
                suffix: config.output_suffix().to_string(),
                first: first.to_string(),
                second: config.name().to_string(),
            });
        }
    }

    Ok(())
}

pub(crate) async fn run_batch(
    registry: Arc<Registry>,
    configs: Vec<EvaluatorConfig>,
    options: BatchOptions,
    executor: Arc<dyn Executor>,
) -> Result<BatchReport, BatchError> {
    if options.output_dir.is_some() {
        check_unique_suffixes(&configs)?;
    }

    let content = tokio::fs::read_to_string(&options.document)
        .await
        .map_err(|e| BatchError::Document {
            path: options.document.clone(),
            source: e,
        })?;

    let mut slots: Vec<Option<UnitReport>> = Vec::with_capacity(configs.len());
    let mut spawned: Vec<(usize, String, ResolvedModel)> = Vec::new();
    let semaphore = Arc::new(Semaphore::new(options.jobs.max(1)));
    let mut tasks = JoinSet::new();

    for (index, config) in configs.into_iter().enumerate() {
        slots.push(None);

        let resolved = match ModelResolver::new(&registry).resolve(&config) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(evaluator = err.evaluator(), error = %err, "skipping evaluator");

                slots[index] = Some(UnitReport::new(
                    err.evaluator().to_string(),
                    UnitStatus::ResolutionFailed(err),
                ));
                continue;
            }
        };

        let request = ExecutionRequest {
            evaluator: config.name().to_string(),
            model: resolved.model.clone(),
            api_key_env: config.api_key_env().to_string(),
            prompt: config.render_prompt(&content),
            document: options.document.clone(),
        };
        let out_path = options
            .output_dir
            .as_ref()
            .map(|dir| output_path(dir, &options.document, config.output_suffix()));
        let executor = Arc::clone(&executor);
        let semaphore = Arc::clone(&semaphore);

        spawned.push((index, config.name().to_string(), resolved.clone()));

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();

            info!(evaluator = %request.evaluator, model = %request.model, "running evaluator");

            let status = match executor.execute(&request).await {
                Ok(outcome) => match &out_path {
                    Some(path) => match write_output(path, &request, &outcome).await {
                        Ok(()) => UnitStatus::Completed {
                            resolved,
                            outcome,
                            output_path: Some(path.clone()),
                        },
                        Err(error) => {
                            warn!(evaluator = %request.evaluator, error = %error, "failed to save output");

                            UnitStatus::OutputFailed {
                                resolved,
                                outcome,
                                error,
                            }
                        }
                    },
                    None => UnitStatus::Completed {
                        resolved,
                        outcome,
                        output_path: None,
                    },
                },
                Err(error) => {
                    warn!(evaluator = %request.evaluator, error = %error, "evaluation failed");

                    UnitStatus::ExecutionFailed { resolved, error }
                }
            };

            (index, UnitReport::new(request.evaluator, status))
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, unit)) => slots[index] = Some(unit),
            Err(err) => warn!(error = %err, "evaluation task panicked"),
        }
    }

    // a task that never reported has panicked; it still belongs in the report
    for (index, evaluator, resolved) in spawned {
        if slots[index].is_none() {
            slots[index] = Some(UnitReport::new(evaluator, UnitStatus::Panicked { resolved }));
        }
    }

    Ok(BatchReport {
        units: slots.into_iter().flatten().collect(),
    })
}

async fn write_output(
    path: &Path,
    request: &ExecutionRequest,
    outcome: &ExecutionOutcome,
) -> Result<(), BatchError> {
    let verdict = outcome
        .verdict
        .map(|v| v.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let body = format!(
        "# {} → {}\n\n**Model**: {}\n**Duration**: {:.2}s\n**Verdict**: {}\n\n## Output\n\n{}\n",
        request.evaluator,
        request.document.display(),
        request.model,
        outcome.duration.as_secs_f64(),
        verdict,
        if outcome.stdout.is_empty() {
            "(no output)"
        } else {
            outcome.stdout.as_str()
        },
    );

    write_file(path, body).await
}

async fn write_file(path: &Path, body: String) -> Result<(), BatchError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BatchError::Output {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }

    tokio::fs::write(path, body)
        .await
        .map_err(|e| BatchError::Output {
            path: path.to_path_buf(),
            source: e,
        })
}

/// One line of the results log.
#[derive(Serialize, Debug)]
pub(crate) struct UnitRecord {
    evaluator: String,
    document: String,
    model: Option<String>,
    status: &'static str,
    success: bool,
    output_length: usize,
    duration_seconds: Option<f64>,
    timestamp: DateTime<Utc>,
    verdict: Option<Verdict>,
    error: Option<String>,
}

impl UnitRecord {
    fn new(unit: &UnitReport, document: &Path) -> UnitRecord {
        let outcome = unit.status.outcome();

        UnitRecord {
            evaluator: unit.evaluator.clone(),
            document: document.display().to_string(),
            model: unit.status.resolved().map(|r| r.model.clone()),
            status: unit.status.kind(),
            success: !unit.failed(),
            output_length: outcome.map_or(0, |o| o.stdout.len()),
            duration_seconds: outcome
                .map(|o| (o.duration.as_secs_f64() * 100.0).round() / 100.0),
            timestamp: unit.finished_at,
            verdict: outcome.and_then(|o| o.verdict),
            error: unit.status.error(),
        }
    }
}

/// Structured record of a whole run.
#[derive(Serialize, Debug)]
pub(crate) struct ResultsLog {
    timestamp: DateTime<Utc>,
    document: String,
    evaluators: Vec<String>,
    passed: bool,
    results: Vec<UnitRecord>,
}

impl ResultsLog {
    pub(crate) fn new(report: &BatchReport, document: &Path) -> ResultsLog {
        ResultsLog {
            timestamp: Utc::now(),
            document: document.display().to_string(),
            evaluators: report.units.iter().map(|u| u.evaluator.clone()).collect(),
            passed: report.all_passed(),
            results: report
                .units
                .iter()
                .map(|unit| UnitRecord::new(unit, document))
                .collect(),
        }
    }
}

/// Write the JSON results log of `report` into `dir` and return its path.
pub(crate) async fn write_results(
    dir: &Path,
    document: &Path,
    report: &BatchReport,
) -> Result<PathBuf, BatchError> {
    let log = ResultsLog::new(report, document);
    let path = results_path(dir, document, log.timestamp);

    let body = serde_json::to_string_pretty(&log)?;

    write_file(&path, body).await?;

    info!(path = %path.display(), "wrote results log");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::tests::{with_model, with_requirement};
    use crate::registry::catalog::tests::claude_registry;
    use crate::resolver::ResolutionSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Approves everything and records the peak number of concurrent calls.
    #[derive(Default)]
    struct FakeExecutor {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Executor for FakeExecutor {
        async fn execute(
            &self,
            request: &ExecutionRequest,
        ) -> Result<ExecutionOutcome, ExecutionError> {
            if request.model.contains("panic") {
                panic!("executor bug");
            }

            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(20)).await;

            self.running.fetch_sub(1, Ordering::SeqCst);

            if request.model.contains("timeout") {
                return Err(ExecutionError::TimedOut(Duration::from_secs(1)));
            }

            Ok(ExecutionOutcome {
                exit_code: Some(0),
                stdout: format!("{}\nVerdict: APPROVED", request.prompt),
                stderr: String::new(),
                duration: Duration::from_millis(20),
                verdict: Some(Verdict::Approved),
            })
        }
    }

    fn document(dir: &Path) -> PathBuf {
        let path = dir.join("design-doc.md");
        std::fs::write(&path, "hello evaluators").unwrap();
        path
    }

    fn options(document: PathBuf, output_dir: Option<PathBuf>) -> BatchOptions {
        BatchOptions {
            document,
            jobs: 2,
            output_dir,
        }
    }

    #[test]
    fn test_resolve_all_keeps_going_after_failures() {
        let registry = claude_registry();
        let configs = vec![
            with_requirement("opus", "claude", "opus", None),
            with_requirement("future", "claude", "opus", Some("9")),
            with_requirement("unknown", "mistral", "large", None),
            with_model("pinned", "openai/gpt-4o"),
        ];

        let report = resolve_all(&registry, &configs);

        let names: Vec<&str> = report.resolved.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["opus", "pinned"]);
        assert_eq!(report.resolved[0].1.model, "anthropic/claude-opus-4-6");
        assert_eq!(report.resolved[1].1.source, ResolutionSource::Explicit);

        let failed: Vec<&str> = report.failures.iter().map(|e| e.evaluator()).collect();
        assert_eq!(failed, ["future", "unknown"]);
    }

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("out"), Path::new("docs/plan.md"), "CLAUDE-QUICK"),
            PathBuf::from("out/plan--CLAUDE-QUICK.md")
        );
    }

    #[tokio::test]
    async fn test_run_batch_reports_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(FakeExecutor::default());
        let configs = vec![
            with_requirement("haiku", "claude", "haiku", None),
            with_requirement("broken", "claude", "ultra", None),
            with_model("slow", "vendor/timeout-model"),
            with_requirement("sonnet", "claude", "sonnet", Some("4.5")),
        ];

        let report = run_batch(
            Arc::new(claude_registry()),
            configs,
            options(document(dir.path()), Some(dir.path().join("out"))),
            executor.clone(),
        )
        .await
        .unwrap();

        let names: Vec<&str> = report.units.iter().map(|u| u.evaluator.as_str()).collect();
        assert_eq!(names, ["haiku", "broken", "slow", "sonnet"]);

        match &report.units[0].status {
            UnitStatus::Completed {
                resolved,
                outcome,
                output_path,
            } => {
                assert_eq!(resolved.model, "anthropic/claude-haiku-4-5");
                assert!(outcome.stdout.contains("hello evaluators"));
                let written = std::fs::read_to_string(output_path.as_ref().unwrap()).unwrap();
                assert!(written.contains("**Verdict**: APPROVED"));
            }
            other => panic!("unexpected status: {:?}", other),
        }
        assert!(matches!(
            report.units[1].status,
            UnitStatus::ResolutionFailed(ResolutionError::UnknownTierOrFamily { .. })
        ));
        assert!(matches!(
            report.units[2].status,
            UnitStatus::ExecutionFailed {
                error: ExecutionError::TimedOut(_),
                ..
            }
        ));

        let failed: Vec<&str> = report.failures().map(|u| u.evaluator.as_str()).collect();
        assert_eq!(failed, ["broken", "slow"]);
        assert!(!report.all_passed());
        assert!(dir.path().join("out/design-doc--HAIKU.md").is_file());
        assert!(dir.path().join("out/design-doc--SONNET.md").is_file());
        assert!(executor.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_panicking_unit_is_reported_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let configs = vec![
            with_model("steady", "vendor/steady-model"),
            with_model("crashy", "vendor/panic-model"),
        ];

        let report = run_batch(
            Arc::new(claude_registry()),
            configs,
            options(document(dir.path()), None),
            Arc::new(FakeExecutor::default()),
        )
        .await
        .unwrap();

        assert_eq!(report.units.len(), 2);
        assert!(!report.units[0].failed());
        assert_eq!(report.units[1].evaluator, "crashy");
        assert!(matches!(
            &report.units[1].status,
            UnitStatus::Panicked { resolved } if resolved.model == "vendor/panic-model"
        ));
        assert!(!report.all_passed());
    }

    #[tokio::test]
    async fn test_unwritable_output_fails_the_unit() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "occupied").unwrap();

        let report = run_batch(
            Arc::new(claude_registry()),
            vec![with_model("pinned", "vendor/model")],
            options(document(dir.path()), Some(blocker.join("out"))),
            Arc::new(FakeExecutor::default()),
        )
        .await
        .unwrap();

        assert!(matches!(
            &report.units[0].status,
            UnitStatus::OutputFailed {
                error: BatchError::Output { .. },
                ..
            }
        ));
        assert!(report.units[0].failed());
        assert!(!report.all_passed());
    }

    #[tokio::test]
    async fn test_duplicate_suffixes_are_refused_with_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let configs = || vec![with_model("same", "a/b"), with_model("same", "c/d")];

        let err = run_batch(
            Arc::new(claude_registry()),
            configs(),
            options(document(dir.path()), Some(dir.path().join("out"))),
            Arc::new(FakeExecutor::default()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BatchError::DuplicateSuffix { ref suffix, .. } if suffix == "SAME"));

        let report = run_batch(
            Arc::new(claude_registry()),
            configs(),
            options(document(dir.path()), None),
            Arc::new(FakeExecutor::default()),
        )
        .await
        .unwrap();
        assert!(report.all_passed());
    }

    #[tokio::test]
    async fn test_results_log() {
        let dir = tempfile::tempdir().unwrap();
        let doc = document(dir.path());
        let configs = vec![
            with_requirement("haiku", "claude", "haiku", None),
            with_requirement("broken", "claude", "ultra", None),
        ];

        let report = run_batch(
            Arc::new(claude_registry()),
            configs,
            options(doc.clone(), None),
            Arc::new(FakeExecutor::default()),
        )
        .await
        .unwrap();

        let path = write_results(&dir.path().join("results"), &doc, &report)
            .await
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("design-doc--results-"));
        assert!(name.ends_with(".json"));

        let log: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(log["evaluators"], serde_json::json!(["haiku", "broken"]));
        assert_eq!(log["passed"], false);

        let haiku = &log["results"][0];
        assert_eq!(haiku["model"], "anthropic/claude-haiku-4-5");
        assert_eq!(haiku["status"], "completed");
        assert_eq!(haiku["success"], true);
        assert_eq!(haiku["verdict"], "APPROVED");
        assert!(haiku["output_length"].as_u64().unwrap() > 0);
        assert_eq!(haiku["duration_seconds"], 0.02);

        let broken = &log["results"][1];
        assert_eq!(broken["status"], "resolution_failed");
        assert_eq!(broken["success"], false);
        assert!(broken["model"].is_null());
        assert!(broken["error"].as_str().unwrap().contains("ultra"));
    }

    #[tokio::test]
    async fn test_missing_document() {
        let dir = tempfile::tempdir().unwrap();

        let err = run_batch(
            Arc::new(claude_registry()),
            vec![with_model("pinned", "x/y")],
            options(dir.path().join("missing.md"), None),
            Arc::new(FakeExecutor::default()),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BatchError::Document { .. }));
    }
}
