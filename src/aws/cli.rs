//! AWS CLI runner
//!
//! Builds `aws <service> <operation> ...` invocations, spawns them and hands
//! back stdout. Failures are reported as [`AwsCliError`] so that callers can
//! log and skip.

use serde_json::Value;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Maximum length of stderr kept in errors (CLI errors can echo whole requests)
const MAX_STDERR_LENGTH: usize = 300;

/// Output format requested from the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

impl OutputFormat {
    fn as_arg(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Text => "text",
        }
    }
}

/// One AWS CLI call, without the profile it runs under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCall {
    pub service: &'static str,
    pub operation: &'static str,
    pub args: Vec<String>,
    pub output: OutputFormat,
}

impl AwsCall {
    pub fn new(service: &'static str, operation: &'static str) -> Self {
        Self {
            service,
            operation,
            args: Vec::new(),
            output: OutputFormat::Json,
        }
    }

    /// Append a flag and its value
    pub fn arg(mut self, flag: &str, value: impl Into<String>) -> Self {
        self.args.push(flag.to_string());
        self.args.push(value.into());
        self
    }

    /// Append a bare flag
    pub fn flag(mut self, flag: &str) -> Self {
        self.args.push(flag.to_string());
        self
    }

    pub fn text_output(mut self) -> Self {
        self.output = OutputFormat::Text;
        self
    }

    /// `service operation args...` for logs and errors
    pub fn describe(&self) -> String {
        let mut parts = vec![self.service.to_string(), self.operation.to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Errors from a single CLI invocation
#[derive(Debug, Error)]
pub enum AwsCliError {
    #[error("failed to launch {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("aws {command} exited with code {code}: {stderr}")]
    Failed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("aws {command} returned malformed JSON: {source}")]
    Malformed {
        command: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Anything that can execute an [`AwsCall`] for a profile and return stdout
#[allow(async_fn_in_trait)]
pub trait AwsRunner {
    async fn run(&self, profile: &str, call: &AwsCall) -> Result<String, AwsCliError>;
}

/// Runner that spawns the real `aws` binary
#[derive(Debug, Clone)]
pub struct AwsCli {
    binary: String,
    region: Option<String>,
    verify_ssl: bool,
}

impl AwsCli {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
            region: None,
            verify_ssl: false,
        }
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    pub fn with_verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.verify_ssl = verify_ssl;
        self
    }

    /// Full argument list passed to the binary
    pub fn build_args(&self, profile: &str, call: &AwsCall) -> Vec<String> {
        let mut args = vec![call.service.to_string(), call.operation.to_string()];
        args.extend(call.args.iter().cloned());
        args.push("--output".to_string());
        args.push(call.output.as_arg().to_string());
        args.push("--profile".to_string());
        args.push(profile.to_string());

        if let Some(region) = &self.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }

        if !self.verify_ssl {
            args.push("--no-verify-ssl".to_string());
        }

        args
    }
}

impl AwsRunner for AwsCli {
    async fn run(&self, profile: &str, call: &AwsCall) -> Result<String, AwsCliError> {
        let args = self.build_args(profile, call);
        tracing::debug!("Executing: {} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| AwsCliError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AwsCliError::Failed {
                command: call.describe(),
                code: output.status.code().unwrap_or(-1),
                stderr: truncate_stderr(&stderr),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Run a call and parse stdout as JSON. Empty output parses as `null`.
pub async fn call_json<R: AwsRunner>(
    runner: &R,
    profile: &str,
    call: &AwsCall,
) -> Result<Value, AwsCliError> {
    let stdout = runner.run(profile, call).await?;
    let trimmed = stdout.trim();

    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(trimmed).map_err(|source| AwsCliError::Malformed {
        command: call.describe(),
        source,
    })
}

fn truncate_stderr(stderr: &str) -> String {
    let cleaned: String = stderr
        .trim()
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    if cleaned.chars().count() > MAX_STDERR_LENGTH {
        let head: String = cleaned.chars().take(MAX_STDERR_LENGTH).collect();
        format!("{}... [truncated]", head)
    } else {
        cleaned
    }
}

/// Format a CLI error for the console
pub fn format_cli_error(error: &AwsCliError) -> String {
    match error {
        AwsCliError::Spawn { binary, .. } => {
            format!("Could not run '{}'. Is the AWS CLI installed and on PATH?", binary)
        }
        AwsCliError::Failed { stderr, code, .. } => {
            if stderr.contains("ExpiredToken") || stderr.contains("Token has expired") {
                return "Credentials expired. Run 'aws sso login' for this profile.".to_string();
            }
            if stderr.contains("could not be found") && stderr.contains("profile") {
                return "Profile is not configured in ~/.aws/config.".to_string();
            }
            if stderr.contains("AccessDenied") || stderr.contains("UnauthorizedOperation") {
                return "Permission denied. Check the IAM permissions of this profile.".to_string();
            }
            if stderr.contains("Could not connect") {
                return "Could not reach the AWS endpoint. Check your network.".to_string();
            }
            if stderr.is_empty() {
                format!("AWS CLI exited with code {}", code)
            } else {
                stderr.clone()
            }
        }
        AwsCliError::Malformed { command, .. } => {
            format!("Unexpected output from 'aws {}'", command)
        }
    }
}
