//! End-to-end runs against a canned AWS CLI
//!
//! These tests drive whole inventories and the exclusion builder through the
//! public API, with a runner that answers from a fixed table instead of
//! spawning the AWS CLI.

use aws_inventory::advisor::{self, AdvisorError, ExclusionRequest, Prompt};
use aws_inventory::aws::{AwsCall, AwsCliError, AwsRunner};
use aws_inventory::inventory::{self, dynamodb, Kind, RunContext};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Answers `profile|service operation args...` or `service operation args...`
#[derive(Default)]
struct CannedAws {
    responses: HashMap<String, Value>,
}

impl CannedAws {
    fn with(mut self, key: &str, value: Value) -> Self {
        self.responses.insert(key.to_string(), value);
        self
    }
}

impl AwsRunner for CannedAws {
    async fn run(&self, profile: &str, call: &AwsCall) -> Result<String, AwsCliError> {
        let full = call.describe();
        self.responses
            .get(&format!("{}|{}", profile, full))
            .or_else(|| self.responses.get(&full))
            .map(Value::to_string)
            .ok_or_else(|| AwsCliError::Failed {
                command: full,
                code: 254,
                stderr: "AccessDenied".to_string(),
            })
    }
}

struct NoInput;

impl Prompt for NoInput {
    fn ask(&mut self, _question: &str) -> Result<String, AdvisorError> {
        Err(AdvisorError::InputClosed)
    }
}

fn dynamodb_account() -> CannedAws {
    CannedAws::default()
        .with("shared|dynamodb list-tables", json!({"TableNames": ["orders"]}))
        .with(
            "shared|dynamodb describe-table --table-name orders",
            json!({"Table": {"TableName": "orders", "TableStatus": "ACTIVE", "ItemCount": 3}}),
        )
        .with(
            "shared|dynamodb describe-continuous-backups --table-name orders",
            json!({"ContinuousBackupsDescription": {
                "PointInTimeRecoveryDescription": {"PointInTimeRecoveryStatus": "ENABLED"}
            }}),
        )
}

#[test]
fn dynamodb_run_writes_timestamped_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = RunContext::new(
        vec!["shared".to_string(), "audit".to_string()],
        dir.path().to_path_buf(),
    );

    let written = tokio_test::block_on(inventory::run(Kind::DynamoDb, &dynamodb_account(), &ctx)).unwrap();

    let path = written.expect("a workbook should be written");
    assert!(path.exists());
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with(dynamodb::FILE_PREFIX));
    assert!(name.ends_with(".xlsx"));
}

#[test]
fn run_without_resources_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = RunContext::new(vec!["audit".to_string()], dir.path().to_path_buf());

    let written = tokio_test::block_on(inventory::run(Kind::DynamoDb, &CannedAws::default(), &ctx)).unwrap();

    assert!(written.is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn exclusion_command_from_flags_only() {
    let runner = CannedAws::default()
        .with(
            "sec|trustedadvisor list-recommendations",
            json!({"recommendationSummaries": [
                {"id": "abc", "name": "Amazon S3 Bucket Versioning", "arn": "arn:rec/abc"}
            ]}),
        )
        .with(
            "sec|trustedadvisor list-recommendation-resources --recommendation-identifier arn:rec/abc",
            json!({"recommendationResourceSummaries": [
                {"awsResourceId": "logs-bucket", "arn": "arn:aws:s3:::logs-bucket"},
                {"awsResourceId": "data-bucket", "arn": "arn:aws:s3:::data-bucket"}
            ]}),
        );
    let request = ExclusionRequest {
        profile: Some("sec".to_string()),
        check_keyword: Some("versioning".to_string()),
        resource_match: None,
        all: true,
        region: advisor::DEFAULT_REGION.to_string(),
    };

    let result = tokio_test::block_on(advisor::build(&runner, &mut NoInput, request)).unwrap();

    assert_eq!(result.resources.len(), 2);
    assert_eq!(
        result.command,
        "aws trustedadvisor batch-update-recommendation-resource-exclusion \
         --recommendation-resource-exclusions \
         '[{\"arn\":\"arn:aws:s3:::logs-bucket\",\"isExcluded\":true},\
         {\"arn\":\"arn:aws:s3:::data-bucket\",\"isExcluded\":true}]' \
         --region ap-southeast-2"
    );
}
