//! DynamoDB table inventory

use super::{export, log_skip, RunContext};
use crate::aws::{call_json, AwsCall, AwsRunner};
use crate::flatten::{self, LIST_SEPARATOR};
use crate::report::{summary, Cell, Record, Report, Sheet};
use anyhow::Result;
use serde_json::Value;
use std::path::PathBuf;

pub const FILE_PREFIX: &str = "dynamodb_inventory";
pub const SHEET_NAME: &str = "DynamoDB_Inventory";

fn enabled(on: bool) -> &'static str {
    if on {
        "Enabled"
    } else {
        "Disabled"
    }
}

/// `name(KEYTYPE)` joined
fn key_schema(table: &Value) -> String {
    flatten::items(table, "KeySchema")
        .iter()
        .map(|k| format!("{}({})", flatten::text(k, "AttributeName"), flatten::text(k, "KeyType")))
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// `name:TYPE` joined
fn attribute_definitions(table: &Value) -> String {
    flatten::items(table, "AttributeDefinitions")
        .iter()
        .map(|a| format!("{}:{}", flatten::text(a, "AttributeName"), flatten::text(a, "AttributeType")))
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// Map a `describe-table` `Table` object. `pitr` is the point-in-time
/// recovery status, if it could be read.
pub fn map_table(table: &Value, pitr: Option<&str>, account: &str) -> Record {
    let stream = flatten::lookup(table, "StreamSpecification.StreamEnabled")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let sse = flatten::text(table, "SSEDescription.Status") == "ENABLED";
    let count = |path: &str| match flatten::lookup(table, path) {
        Some(v) => Cell::from_json(Some(v)),
        None => Cell::Int(0),
    };

    Record::for_account(account)
        .json_or("TableName", table, "TableName", "")
        .json_or("TableStatus", table, "TableStatus", "")
        .json_or("CreationDateTime", table, "CreationDateTime", "")
        .json_or("BillingMode", table, "BillingModeSummary.BillingMode", "")
        .with("ItemCount", count("ItemCount"))
        .with("TableSizeBytes", count("TableSizeBytes"))
        .with("ReadCapacityUnits", count("ProvisionedThroughput.ReadCapacityUnits"))
        .with("WriteCapacityUnits", count("ProvisionedThroughput.WriteCapacityUnits"))
        .with("GlobalSecondaryIndexes", flatten::items(table, "GlobalSecondaryIndexes").len())
        .with("LocalSecondaryIndexes", flatten::items(table, "LocalSecondaryIndexes").len())
        .with("StreamSpecification", enabled(stream))
        .with("SSEDescription", enabled(sse))
        .with("PointInTimeRecovery", pitr.unwrap_or("Unknown"))
        .with(
            "TableClass",
            flatten::text_or(table, "TableClassSummary.TableClass", "STANDARD"),
        )
        .json_or("TableArn", table, "TableArn", "")
        .with("KeySchema", key_schema(table))
        .with("AttributeDefinitions", attribute_definitions(table))
}

async fn point_in_time_recovery<R: AwsRunner>(runner: &R, profile: &str, table: &str) -> Option<String> {
    let call = AwsCall::new("dynamodb", "describe-continuous-backups").arg("--table-name", table);
    match call_json(runner, profile, &call).await {
        Ok(v) => Some(flatten::text_or(
            &v,
            "ContinuousBackupsDescription.PointInTimeRecoveryDescription.PointInTimeRecoveryStatus",
            "Unknown",
        )),
        Err(e) => {
            tracing::debug!("No PITR status for {}: {}", table, e);
            None
        }
    }
}

pub async fn collect<R: AwsRunner>(runner: &R, profile: &str, records: &mut Vec<Record>) {
    let call = AwsCall::new("dynamodb", "list-tables");
    let response = match call_json(runner, profile, &call).await {
        Ok(v) => v,
        Err(e) => return log_skip("DynamoDB tables", profile, &e),
    };

    let names: Vec<String> = flatten::items(&response, "TableNames")
        .iter()
        .map(flatten::render)
        .collect();
    if names.is_empty() {
        tracing::info!("No DynamoDB tables found for {}", profile);
        return;
    }

    for name in &names {
        let call = AwsCall::new("dynamodb", "describe-table").arg("--table-name", name);
        let table = match call_json(runner, profile, &call).await {
            Ok(v) => v,
            Err(e) => {
                log_skip(&format!("table {}", name), profile, &e);
                continue;
            }
        };

        let Some(table) = table.get("Table") else {
            tracing::warn!("describe-table for {} returned no Table", name);
            continue;
        };

        let pitr = point_in_time_recovery(runner, profile, name).await;
        records.push(map_table(table, pitr.as_deref(), profile));
    }

    tracing::info!("DynamoDB tables for {} added ({} tables)", profile, names.len());
}

pub async fn run<R: AwsRunner>(runner: &R, ctx: &RunContext) -> Result<Option<PathBuf>> {
    let mut records = Vec::new();
    for profile in &ctx.profiles {
        collect(runner, profile, &mut records).await;
    }

    if records.is_empty() {
        summary::nothing_found("No DynamoDB tables found in any profiles.");
        return Ok(None);
    }

    let mut report = Report::new(FILE_PREFIX);
    report.push(Sheet::from_records(SHEET_NAME, &records));
    let path = export(&report, ctx)?;

    summary::saved("DynamoDB inventory", &path);
    summary::line("Total DynamoDB tables found", records.len());

    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::fake::FakeAws;
    use serde_json::json;

    fn table() -> Value {
        json!({
            "TableName": "orders",
            "TableStatus": "ACTIVE",
            "ItemCount": 42,
            "ProvisionedThroughput": {"ReadCapacityUnits": 5, "WriteCapacityUnits": 5},
            "GlobalSecondaryIndexes": [{"IndexName": "by-customer"}],
            "StreamSpecification": {"StreamEnabled": true},
            "SSEDescription": {"Status": "ENABLED"},
            "KeySchema": [
                {"AttributeName": "pk", "KeyType": "HASH"},
                {"AttributeName": "sk", "KeyType": "RANGE"}
            ],
            "AttributeDefinitions": [{"AttributeName": "pk", "AttributeType": "S"}]
        })
    }

    #[test]
    fn test_map_table() {
        let row = map_table(&table(), Some("ENABLED"), "shared");
        assert_eq!(row.text("Account"), "shared");
        assert_eq!(row.get("ItemCount"), Some(&Cell::Int(42)));
        assert_eq!(row.get("TableSizeBytes"), Some(&Cell::Int(0)));
        assert_eq!(row.get("GlobalSecondaryIndexes"), Some(&Cell::Int(1)));
        assert_eq!(row.get("LocalSecondaryIndexes"), Some(&Cell::Int(0)));
        assert_eq!(row.text("StreamSpecification"), "Enabled");
        assert_eq!(row.text("SSEDescription"), "Enabled");
        assert_eq!(row.text("PointInTimeRecovery"), "ENABLED");
        assert_eq!(row.text("TableClass"), "STANDARD");
        assert_eq!(row.text("KeySchema"), "pk(HASH), sk(RANGE)");
        assert_eq!(row.text("AttributeDefinitions"), "pk:S");
    }

    #[test]
    fn test_map_table_defaults() {
        let row = map_table(&json!({"TableName": "t"}), None, "int");
        assert_eq!(row.text("StreamSpecification"), "Disabled");
        assert_eq!(row.text("SSEDescription"), "Disabled");
        assert_eq!(row.text("PointInTimeRecovery"), "Unknown");
        assert_eq!(row.text("BillingMode"), "");
    }

    #[tokio::test]
    async fn test_collect_describes_each_table() {
        let fake = FakeAws::new()
            .json("dynamodb list-tables", json!({"TableNames": ["orders", "broken"]}))
            .json("dynamodb describe-table --table-name orders", json!({"Table": table()}))
            .fail("dynamodb describe-table --table-name broken", "ResourceNotFoundException")
            .json(
                "dynamodb describe-continuous-backups",
                json!({"ContinuousBackupsDescription": {
                    "PointInTimeRecoveryDescription": {"PointInTimeRecoveryStatus": "DISABLED"}
                }}),
            );

        let mut records = Vec::new();
        collect(&fake, "shared", &mut records).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text("TableName"), "orders");
        assert_eq!(records[0].text("PointInTimeRecovery"), "DISABLED");
    }
}
