//! The execution boundary: handing a resolved model, a rendered prompt, and a document to an
//! external evaluation process.
//!
//! The process is a black box that reads the prompt on stdin and writes a narrative review
//! to stdout. The only thing parsed out of that narrative is the [`Verdict`] token.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Environment variables exported to the evaluation process.
pub(crate) const ENV_MODEL: &str = "XEVAL_MODEL";
pub(crate) const ENV_EVALUATOR: &str = "XEVAL_EVALUATOR";
pub(crate) const ENV_API_KEY_ENV: &str = "XEVAL_API_KEY_ENV";
pub(crate) const ENV_DOCUMENT: &str = "XEVAL_DOCUMENT";

#[derive(Error, Debug)]
pub(crate) enum ExecutionError {
    #[error("no evaluation command is configured")]
    NoCommand,
    #[error("failed to start \"{program}\": {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("evaluation process I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("evaluation timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

/// The verdict an evaluation process reports.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum Verdict {
    Approved,
    ChangesRequested,
    Reject,
}

impl Verdict {
    /// Scan the narrative line by line; the first line naming a verdict decides.
    pub(crate) fn from_output(output: &str) -> Option<Verdict> {
        for line in output.lines() {
            if line.contains("APPROVED") {
                return Some(Verdict::Approved);
            } else if line.contains("CHANGES_REQUESTED") {
                return Some(Verdict::ChangesRequested);
            } else if line.contains("REJECT") {
                return Some(Verdict::Reject);
            }
        }

        None
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ExecutionRequest {
    pub evaluator: String,
    pub model: String,
    pub api_key_env: String,
    pub prompt: String,
    pub document: PathBuf,
}

#[derive(Debug, Clone)]
pub(crate) struct ExecutionOutcome {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub verdict: Option<Verdict>,
}

impl ExecutionOutcome {
    pub(crate) fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[async_trait]
pub(crate) trait Executor: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionOutcome, ExecutionError>;
}

/// Runs each evaluation as a child process.
///
/// Arguments may reference `{model}`, `{document}`, `{evaluator}` and `{api_key_env}`.
/// The child is killed when the timeout expires.
#[derive(Debug, Clone)]
pub(crate) struct CommandExecutor {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandExecutor {
    pub(crate) fn new(command: &[String], timeout: Duration) -> Result<CommandExecutor, ExecutionError> {
        let (program, args) = command.split_first().ok_or(ExecutionError::NoCommand)?;

        Ok(CommandExecutor {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }

    fn expand_args(&self, request: &ExecutionRequest) -> Vec<String> {
        let document = request.document.display().to_string();

        self.args
            .iter()
            .map(|arg| {
                arg.replace("{model}", &request.model)
                    .replace("{document}", &document)
                    .replace("{evaluator}", &request.evaluator)
                    .replace("{api_key_env}", &request.api_key_env)
            })
            .collect()
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionOutcome, ExecutionError> {
        let start = Instant::now();

        let mut child = Command::new(&self.program)
            .args(self.expand_args(request))
            .env(ENV_MODEL, &request.model)
            .env(ENV_EVALUATOR, &request.evaluator)
            .env(ENV_API_KEY_ENV, &request.api_key_env)
            .env(ENV_DOCUMENT, &request.document)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutionError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        debug!(
            evaluator = %request.evaluator,
            model = %request.model,
            pid = child.id(),
            "started evaluation process"
        );

        if let Some(mut stdin) = child.stdin.take() {
            let prompt = request.prompt.clone();

            // a child that exits without reading its input is not an error
            tokio::spawn(async move {
                if let Err(err) = stdin.write_all(prompt.as_bytes()).await {
                    debug!(error = %err, "evaluation process closed stdin early");
                }
            });
        }

        // dropping the future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!(
                    evaluator = %request.evaluator,
                    timeout_secs = self.timeout.as_secs(),
                    "evaluation timed out, process killed"
                );

                return Err(ExecutionError::TimedOut(self.timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        Ok(ExecutionOutcome {
            exit_code: output.status.code(),
            verdict: Verdict::from_output(&stdout),
            stdout,
            stderr,
            duration: start.elapsed(),
        })
    }
}
