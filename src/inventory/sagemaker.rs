//! SageMaker notebooks, endpoints, models and training jobs

use super::{export, log_skip, RunContext};
use crate::aws::{call_json, AwsCall, AwsRunner};
use crate::flatten;
use crate::report::{summary, Record, Report, Sheet};
use anyhow::Result;
use serde_json::Value;
use std::path::PathBuf;

pub const FILE_PREFIX: &str = "sagemaker_inventory";
pub const SHEET_NAME: &str = "SageMaker_Inventory";

/// One `sagemaker list-*` listing and the fields kept from it
pub struct Listing {
    pub resource_type: &'static str,
    pub operation: &'static str,
    pub list_key: &'static str,
    pub fields: &'static [&'static str],
}

pub const LISTINGS: &[Listing] = &[
    Listing {
        resource_type: "Notebook Instance",
        operation: "list-notebook-instances",
        list_key: "NotebookInstances",
        fields: &[
            "NotebookInstanceName",
            "NotebookInstanceStatus",
            "InstanceType",
            "CreationTime",
            "LastModifiedTime",
            "Url",
        ],
    },
    Listing {
        resource_type: "Endpoint",
        operation: "list-endpoints",
        list_key: "Endpoints",
        fields: &["EndpointName", "EndpointStatus", "CreationTime", "LastModifiedTime"],
    },
    Listing {
        resource_type: "Model",
        operation: "list-models",
        list_key: "Models",
        fields: &["ModelName", "CreationTime"],
    },
    Listing {
        resource_type: "Training Job",
        operation: "list-training-jobs",
        list_key: "TrainingJobSummaries",
        fields: &["TrainingJobName", "TrainingJobStatus", "CreationTime", "TrainingEndTime"],
    },
];

pub fn map_resource(listing: &Listing, item: &Value, account: &str) -> Record {
    let mut record = Record::new();
    for field in listing.fields {
        record = record.json(field, item, field);
    }
    record
        .with("ResourceType", listing.resource_type)
        .with("Account", account)
}

pub async fn collect<R: AwsRunner>(runner: &R, profile: &str, records: &mut Vec<Record>) {
    let mut counts = Vec::with_capacity(LISTINGS.len());

    for listing in LISTINGS {
        let call = AwsCall::new("sagemaker", listing.operation);
        let items = match call_json(runner, profile, &call).await {
            Ok(v) => flatten::items(&v, listing.list_key).to_vec(),
            Err(e) => {
                log_skip(listing.resource_type, profile, &e);
                Vec::new()
            }
        };

        counts.push(format!("{}: {}", listing.resource_type, items.len()));
        records.extend(items.iter().map(|i| map_resource(listing, i, profile)));
    }

    tracing::info!("SageMaker resources for {}: {}", profile, counts.join(", "));
}

pub async fn run<R: AwsRunner>(runner: &R, ctx: &RunContext) -> Result<Option<PathBuf>> {
    let mut records = Vec::new();
    for profile in &ctx.profiles {
        collect(runner, profile, &mut records).await;
    }

    if records.is_empty() {
        summary::nothing_found("No SageMaker resources found in any profiles.");
        return Ok(None);
    }

    let sheet = Sheet::from_records(SHEET_NAME, &records);
    let mut report = Report::new(FILE_PREFIX);
    report.push(sheet.clone());
    let path = export(&report, ctx)?;

    summary::saved("SageMaker inventory", &path);
    summary::line("Total SageMaker resources found", sheet.len());
    summary::counts("By resource type", &sheet.value_counts("ResourceType"), "");
    summary::counts("By account", &sheet.value_counts("Account"), "");

    Ok(Some(path))
}
