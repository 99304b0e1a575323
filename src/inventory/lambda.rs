//! Lambda functions with last invocation time and inactivity report
//!
//! The last invocation is read from the newest CloudWatch log stream of the
//! function's log group. Functions neither modified nor invoked for two years
//! are listed on a second sheet.

use super::{export, log_skip, RunContext};
use crate::aws::{call_json, AwsCall, AwsCliError, AwsRunner};
use crate::flatten;
use crate::report::{summary, Record, Report, Sheet};
use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::Value;
use std::path::PathBuf;

pub const FILE_PREFIX: &str = "lambda_function_details";
pub const ALL_SHEET: &str = "All Functions";
pub const INACTIVE_SHEET: &str = "Inactive Functions (2+ years)";

/// Age after which a function counts as inactive
pub const INACTIVE_AFTER_DAYS: i64 = 730;

pub const NO_RECENT_INVOCATIONS: &str = "No recent invocations";
pub const LOGS_ERROR: &str = "Error retrieving logs";

const INVOCATION_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const COLUMNS: &[&str] = &[
    "Account",
    "FunctionName",
    "FunctionArn",
    "Runtime",
    "Role",
    "Handler",
    "CodeSize",
    "MemorySize",
    "Timeout",
    "LastModified",
    "LastInvocationTime",
    "EnvironmentVariables",
    "Tags",
];

/// Result of the log stream lookup
#[derive(Debug, Clone, PartialEq)]
pub enum LastInvocation {
    At(DateTime<Utc>),
    NoneRecent,
    Unavailable,
}

impl LastInvocation {
    /// Read `logStreams[0].lastEventTimestamp` (epoch milliseconds)
    pub fn from_log_streams(response: &Value) -> Self {
        flatten::lookup(response, "logStreams.0.lastEventTimestamp")
            .and_then(Value::as_i64)
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(LastInvocation::At)
            .unwrap_or(LastInvocation::NoneRecent)
    }

    pub fn label(&self) -> String {
        match self {
            LastInvocation::At(at) => at.format(INVOCATION_FORMAT).to_string(),
            LastInvocation::NoneRecent => NO_RECENT_INVOCATIONS.to_string(),
            LastInvocation::Unavailable => LOGS_ERROR.to_string(),
        }
    }
}

/// `K=V; K=V` rendering of the function environment
fn environment_variables(function: &Value) -> String {
    flatten::tag_pairs(flatten::lookup(function, "Environment.Variables"))
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn map_function(function: &Value, last_invocation: &LastInvocation, account: &str) -> Record {
    Record::for_account(account)
        .json("FunctionName", function, "FunctionName")
        .json("FunctionArn", function, "FunctionArn")
        .json("Runtime", function, "Runtime")
        .json("Role", function, "Role")
        .json("Handler", function, "Handler")
        .json("CodeSize", function, "CodeSize")
        .json("MemorySize", function, "MemorySize")
        .json("Timeout", function, "Timeout")
        .json("LastModified", function, "LastModified")
        .with("LastInvocationTime", last_invocation.label())
        .with("EnvironmentVariables", environment_variables(function))
        .with("Tags", flatten::tags_summary(function.get("Tags")))
}

/// Whether a LastModified / LastInvocationTime value is older than `cutoff`.
/// Missing values and lookup markers count as old; unreadable dates do not.
pub fn is_older_than(value: &str, cutoff: NaiveDate) -> bool {
    let value = value.trim();
    if value.is_empty() || value == NO_RECENT_INVOCATIONS || value == LOGS_ERROR {
        return true;
    }

    let date_part = value.split(['T', ' ']).next().unwrap_or(value);
    match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        Ok(date) => date < cutoff,
        Err(_) => false,
    }
}

pub fn is_inactive(record: &Record, cutoff: NaiveDate) -> bool {
    is_older_than(&record.text("LastModified"), cutoff)
        && is_older_than(&record.text("LastInvocationTime"), cutoff)
}

async fn last_invocation<R: AwsRunner>(runner: &R, profile: &str, function_name: &str) -> LastInvocation {
    tracing::debug!("Checking last invocation for {}", function_name);

    let call = AwsCall::new("logs", "describe-log-streams")
        .arg("--log-group-name", format!("/aws/lambda/{}", function_name))
        .arg("--order-by", "LastEventTime")
        .flag("--descending")
        .arg("--limit", "1");

    match call_json(runner, profile, &call).await {
        Ok(v) => LastInvocation::from_log_streams(&v),
        // A function that never ran has no log group
        Err(e) if e.to_string().contains("ResourceNotFoundException") => LastInvocation::NoneRecent,
        Err(e) => {
            tracing::warn!("Error retrieving logs for {}: {}", function_name, e);
            LastInvocation::Unavailable
        }
    }
}

/// All functions of a profile, following `NextToken`
async fn list_functions<R: AwsRunner>(runner: &R, profile: &str) -> Result<Vec<Value>, AwsCliError> {
    let mut functions = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let mut call = AwsCall::new("lambda", "list-functions");
        if let Some(t) = &token {
            call = call.arg("--starting-token", t);
        }

        let page = call_json(runner, profile, &call).await?;
        functions.extend(flatten::items(&page, "Functions").iter().cloned());

        token = flatten::lookup(&page, "NextToken")
            .and_then(Value::as_str)
            .map(str::to_string);
        if token.is_none() {
            return Ok(functions);
        }
    }
}

pub async fn collect<R: AwsRunner>(runner: &R, profile: &str, records: &mut Vec<Record>) {
    tracing::info!("Processing account: {}", profile);

    let functions = match list_functions(runner, profile).await {
        Ok(f) => f,
        Err(e) => return log_skip("Lambda functions", profile, &e),
    };
    tracing::info!("Found {} Lambda functions in {}", functions.len(), profile);

    for function in &functions {
        let name = flatten::text(function, "FunctionName");
        let invocation = last_invocation(runner, profile, &name).await;
        records.push(map_function(function, &invocation, profile));
    }
}

pub fn build_report(records: &[Record], now: DateTime<Utc>) -> Report {
    let cutoff = (now - Duration::days(INACTIVE_AFTER_DAYS)).date_naive();
    let inactive: Vec<Record> = records
        .iter()
        .filter(|r| is_inactive(r, cutoff))
        .cloned()
        .collect();

    let mut report = Report::new(FILE_PREFIX);
    report.push(Sheet::with_columns(ALL_SHEET, COLUMNS, records));
    report.push(Sheet::with_columns(INACTIVE_SHEET, COLUMNS, &inactive));
    report
}

pub async fn run<R: AwsRunner>(runner: &R, ctx: &RunContext) -> Result<Option<PathBuf>> {
    let mut records = Vec::new();
    for (i, profile) in ctx.profiles.iter().enumerate() {
        tracing::info!("Account {}/{}", i + 1, ctx.profiles.len());
        collect(runner, profile, &mut records).await;
    }

    let report = build_report(&records, ctx.now_utc());
    let path = export(&report, ctx)?;

    let inactive = report.sheet(INACTIVE_SHEET).map(Sheet::len).unwrap_or(0);
    summary::saved("Lambda function details", &path);
    summary::line("All Functions", records.len());
    summary::line("Inactive Functions (2+ years)", inactive);

    Ok(Some(path))
}
