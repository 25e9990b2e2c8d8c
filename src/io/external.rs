//! Blocking invocation of external programs (engine, catalog, DEM, upload).
//!
//! Arguments are templates: every `{name}` is replaced by the matching value
//! before the program is spawned. A command may carry a timeout; without one
//! the orchestrator waits for the child as long as it runs.
use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Errors raised by an external collaborator
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("No {tool} command configured")]
    NotConfigured { tool: &'static str },
    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {status}")]
    Failed { program: String, status: ExitStatus },
    #[error("`{program}` timed out after {seconds}s")]
    TimedOut { program: String, seconds: u64 },
    #[error("{0}")]
    Other(String),
}

/// Program plus argument template, as written in the orchestrator config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ExternalCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        ExternalCommand {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout_secs: None,
        }
    }

    pub fn with_timeout(mut self, seconds: Option<u64>) -> Self {
        self.timeout_secs = seconds;
        self
    }

    /// Substitute `{name}` placeholders in every argument.
    pub fn render_args(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (name, value)| {
                    acc.replace(&format!("{{{}}}", name), value)
                })
            })
            .collect()
    }

    /// Run to completion, failing on a non-zero exit or an exceeded timeout.
    pub fn run(&self, vars: &[(&str, &str)]) -> Result<(), ToolError> {
        let args = self.render_args(vars);
        debug!("Running: {} {}", self.program, args.join(" "));
        let child = Command::new(&self.program)
            .args(&args)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let status = match self.timeout_secs {
            None => wait(child, &self.program)?,
            Some(seconds) => wait_with_timeout(child, &self.program, seconds)?,
        };
        if status.success() {
            Ok(())
        } else {
            Err(ToolError::Failed {
                program: self.program.clone(),
                status,
            })
        }
    }
}

fn wait(mut child: Child, program: &str) -> Result<ExitStatus, ToolError> {
    child.wait().map_err(|source| ToolError::Spawn {
        program: program.to_string(),
        source,
    })
}

fn wait_with_timeout(
    mut child: Child,
    program: &str,
    seconds: u64,
) -> Result<ExitStatus, ToolError> {
    let deadline = Instant::now() + Duration::from_secs(seconds);
    loop {
        let polled = child.try_wait().map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;
        if let Some(status) = polled {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            warn!("`{}` exceeded {}s, killing it", program, seconds);
            // The child may have exited between the poll and the kill.
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::TimedOut {
                program: program.to_string(),
                seconds,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}
