//! Runs cloud command line tools and captures their output.

use glci_promote_core::error::PublishError;
use tokio::process::Command;

/// A command line tool, optionally invoked through a wrapper (e.g. `sh script`).
#[derive(Debug, Clone)]
pub struct Tool {
    program: String,
    leading_args: Vec<String>,
}

impl Tool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_leading_args(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Runs the tool with `args`, returning trimmed stdout on success.
    pub async fn run(&self, args: &[String]) -> Result<String, PublishError> {
        let program = self.program.as_str();
        tracing::debug!(program, ?args, "Running command");
        let output = Command::new(program)
            .args(&self.leading_args)
            .args(args)
            .output()
            .await
            .map_err(|source| {
                tracing::error!(error = ?source, program, "Failed to launch process");
                PublishError::Spawn {
                    program: program.to_string(),
                    source,
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(program, status = %output.status, stderr = %stderr, "Command failed");
            return Err(PublishError::Command {
                program: program.to_string(),
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Runs the tool and parses its stdout as JSON.
    pub async fn run_json(&self, args: &[String]) -> Result<serde_json::Value, PublishError> {
        let stdout = self.run(args).await?;
        serde_json::from_str(&stdout).map_err(|e| PublishError::UnexpectedOutput {
            program: self.program.clone(),
            detail: format!("invalid json ({e}): {stdout}"),
        })
    }

    /// Reads a string at a JSON pointer such as `/ImportTaskId`.
    pub fn json_str(&self, value: &serde_json::Value, pointer: &str) -> Result<String, PublishError> {
        value
            .pointer(pointer)
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PublishError::UnexpectedOutput {
                program: self.program.clone(),
                detail: format!("missing {pointer} in {value}"),
            })
    }
}

/// Converts a list of string literals into owned arguments.
pub fn args<const N: usize>(list: [&str; N]) -> Vec<String> {
    list.iter().map(|arg| arg.to_string()).collect()
}
