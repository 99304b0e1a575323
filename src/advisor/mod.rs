//! Trusted Advisor exclusion command builder
//!
//! Finds a recommendation by keyword, picks the resources to exclude and
//! prints the `batch-update-recommendation-resource-exclusion` command that
//! would exclude them. The command is never executed.
//!
//! Unlike the inventories, every failure here ends the run.

pub mod prompt;

pub use prompt::{Prompt, StdinPrompt};

use crate::aws::{call_json, format_cli_error, AwsCall, AwsCliError, AwsRunner};
use colored::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_REGION: &str = "ap-southeast-2";

const SEPARATOR_WIDTH: usize = 80;

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("{}", format_cli_error(.0))]
    Aws(#[from] AwsCliError),

    #[error("unexpected response from trustedadvisor {operation}: {source}")]
    Response {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("no recommendations found matching '{0}'")]
    NoRecommendation(String),

    #[error("no resources found for recommendation '{0}'")]
    NoResources(String),

    #[error("{0} must not be empty")]
    EmptyAnswer(&'static str),

    #[error("failed to read input: {0}")]
    Input(#[source] std::io::Error),

    #[error("input closed before a selection was made")]
    InputClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Recommendation {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(default)]
    pub aws_resource_id: String,
    pub arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationList {
    #[serde(default)]
    recommendation_summaries: Vec<Recommendation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceList {
    #[serde(default)]
    recommendation_resource_summaries: Vec<Resource>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Exclusion<'a> {
    arn: &'a str,
    is_excluded: bool,
}

/// What the user asked for on the command line. Missing values are prompted.
#[derive(Debug, Clone, Default)]
pub struct ExclusionRequest {
    pub profile: Option<String>,
    pub check_keyword: Option<String>,
    pub resource_match: Option<String>,
    pub all: bool,
    pub region: String,
}

/// The finished command and what went into it
#[derive(Debug, Clone)]
pub struct ExclusionCommand {
    pub profile: String,
    pub region: String,
    pub recommendation: Recommendation,
    pub resources: Vec<Resource>,
    pub command: String,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn filter_recommendations(all: Vec<Recommendation>, keyword: &str) -> Vec<Recommendation> {
    all.into_iter()
        .filter(|r| contains_ignore_case(&r.name, keyword))
        .collect()
}

/// Resources whose id or ARN contains `pattern`. An empty pattern keeps all.
pub fn filter_resources(all: Vec<Resource>, pattern: &str) -> Vec<Resource> {
    if pattern.is_empty() {
        return all;
    }
    all.into_iter()
        .filter(|r| {
            contains_ignore_case(&r.aws_resource_id, pattern) || contains_ignore_case(&r.arn, pattern)
        })
        .collect()
}

/// Pick one recommendation: the only match, or the user's numbered choice
pub fn select_recommendation<P: Prompt>(
    prompt: &mut P,
    keyword: &str,
    mut matches: Vec<Recommendation>,
) -> Result<Recommendation, AdvisorError> {
    match matches.len() {
        0 => return Err(AdvisorError::NoRecommendation(keyword.to_string())),
        1 => {
            let only = matches.remove(0);
            println!("Found recommendation: {} (ID: {})", only.name.bold(), only.id);
            return Ok(only);
        }
        _ => {}
    }

    println!("\n{}", "Multiple recommendations found:".bold());
    for (i, r) in matches.iter().enumerate() {
        println!("  {}. {} (ID: {})", i + 1, r.name, r.id);
    }

    loop {
        let answer = prompt.ask("Select a recommendation (number): ")?;
        match answer.parse::<usize>() {
            Ok(n) if (1..=matches.len()).contains(&n) => return Ok(matches.swap_remove(n - 1)),
            _ => println!("{}", "Invalid selection. Please try again.".red()),
        }
    }
}

/// `[{"arn": ..., "isExcluded": true}, ...]`
pub fn build_exclusion_json(resources: &[Resource]) -> String {
    let exclusions: Vec<Exclusion> = resources
        .iter()
        .map(|r| Exclusion {
            arn: &r.arn,
            is_excluded: true,
        })
        .collect();

    serde_json::to_string(&exclusions).unwrap_or_else(|_| "[]".to_string())
}

/// Wrap `s` in single quotes for a POSIX shell
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

pub fn build_cli_command(exclusion_json: &str, region: &str) -> String {
    format!(
        "aws trustedadvisor batch-update-recommendation-resource-exclusion \
         --recommendation-resource-exclusions {} --region {}",
        shell_quote(exclusion_json),
        region
    )
}

fn required<P: Prompt>(
    prompt: &mut P,
    given: Option<String>,
    question: &str,
    what: &'static str,
) -> Result<String, AdvisorError> {
    let value = match given {
        Some(v) => v.trim().to_string(),
        None => prompt.ask(question)?,
    };
    if value.is_empty() {
        return Err(AdvisorError::EmptyAnswer(what));
    }
    Ok(value)
}

/// Resource pattern to apply: empty means every resource
fn resource_pattern<P: Prompt>(prompt: &mut P, request: &ExclusionRequest) -> Result<String, AdvisorError> {
    if request.all {
        return Ok(String::new());
    }
    if let Some(pattern) = &request.resource_match {
        return Ok(pattern.trim().to_string());
    }

    let answer = prompt.ask("Do you want to exclude all resources? (y/n): ")?;
    if answer.eq_ignore_ascii_case("y") {
        return Ok(String::new());
    }
    prompt.ask("Enter substring to match in resourceId or ARN: ")
}

async fn list_recommendations<R: AwsRunner>(runner: &R, profile: &str) -> Result<Vec<Recommendation>, AdvisorError> {
    let call = AwsCall::new("trustedadvisor", "list-recommendations");
    let value = call_json(runner, profile, &call).await?;
    let list: RecommendationList = serde_json::from_value(value).map_err(|source| AdvisorError::Response {
        operation: call.operation,
        source,
    })?;
    Ok(list.recommendation_summaries)
}

async fn list_resources<R: AwsRunner>(
    runner: &R,
    profile: &str,
    recommendation: &Recommendation,
) -> Result<Vec<Resource>, AdvisorError> {
    let call = AwsCall::new("trustedadvisor", "list-recommendation-resources")
        .arg("--recommendation-identifier", &recommendation.arn);
    let value = call_json(runner, profile, &call).await?;
    let list: ResourceList = serde_json::from_value(value).map_err(|source| AdvisorError::Response {
        operation: call.operation,
        source,
    })?;
    Ok(list.recommendation_resource_summaries)
}

/// Gather inputs, query Trusted Advisor and build the exclusion command
pub async fn build<R: AwsRunner, P: Prompt>(
    runner: &R,
    prompt: &mut P,
    request: ExclusionRequest,
) -> Result<ExclusionCommand, AdvisorError> {
    let profile = required(prompt, request.profile.clone(), "Enter AWS CLI profile name: ", "profile")?;
    let keyword = required(
        prompt,
        request.check_keyword.clone(),
        "Enter substring to search in recommendation name: ",
        "recommendation keyword",
    )?;

    tracing::info!("Searching recommendations matching '{}' in {}", keyword, profile);
    let matches = filter_recommendations(list_recommendations(runner, &profile).await?, &keyword);
    let recommendation = select_recommendation(prompt, &keyword, matches)?;

    let pattern = resource_pattern(prompt, &request)?;
    let resources = filter_resources(list_resources(runner, &profile, &recommendation).await?, &pattern);
    if resources.is_empty() {
        return Err(AdvisorError::NoResources(recommendation.name));
    }
    tracing::info!("{} resource(s) selected for exclusion", resources.len());

    let command = build_cli_command(&build_exclusion_json(&resources), &request.region);

    Ok(ExclusionCommand {
        profile,
        region: request.region,
        recommendation,
        resources,
        command,
    })
}

/// Print the selected resources, the command and a summary
pub fn print(result: &ExclusionCommand) {
    println!("\n{}", "Resources to exclude:".bold());
    for (i, r) in result.resources.iter().enumerate() {
        println!("  {}. ID: {}", i + 1, r.aws_resource_id);
        println!("     ARN: {}", r.arn.dimmed());
    }

    let rule = "=".repeat(SEPARATOR_WIDTH);
    println!("\n{}", rule);
    println!("{}", "AWS CLI COMMAND".bright_blue().bold());
    println!("{}", rule);
    println!("{}", result.command);
    println!("{}", rule);

    println!("\n{}", "Summary".bold());
    println!("  Recommendation: {}", result.recommendation.name);
    println!("  Recommendation ID: {}", result.recommendation.id);
    println!("  Resources to exclude: {}", result.resources.len());
    println!("  Profile: {}", result.profile);
    println!("  Region: {}", result.region);

    println!(
        "\n{} Command built successfully. Copy and paste it to execute.",
        "✔".bright_green().bold()
    );
}
