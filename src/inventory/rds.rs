//! RDS instances with a monthly cost estimate, and reserved DB instances

use super::{export, log_skip, RunContext};
use crate::aws::{call_json, AwsCall, AwsRunner};
use crate::flatten::{self, LIST_SEPARATOR};
use crate::report::{summary, Cell, Record, Report, Sheet};
use anyhow::Result;
use serde_json::Value;
use std::path::PathBuf;

pub const FILE_PREFIX: &str = "RDS_instance_inventory_and_reservations";
pub const INSTANCES_SHEET: &str = "RDS_Instances";
pub const RESERVATIONS_SHEET: &str = "RDS_Reservations";

/// On-demand price per instance class (USD/hour)
const HOURLY_PRICE_USD: &[(&str, f64)] = &[
    ("db.t4g.medium", 0.113),
    ("db.m5.xlarge", 1.367),
    ("db.r6g.large", 0.313),
];

const HOURS_PER_MONTH: f64 = 24.0 * 30.0;

/// Estimated monthly cost of an instance class, 0 when the class is not priced
pub fn monthly_cost(instance_class: &str) -> f64 {
    HOURLY_PRICE_USD
        .iter()
        .find(|(class, _)| *class == instance_class)
        .map(|(_, hourly)| hourly * HOURS_PER_MONTH)
        .unwrap_or(0.0)
}

pub fn map_instance(db: &Value, account: &str) -> Record {
    let class = flatten::text(db, "DBInstanceClass");
    let tags = flatten::tag_pairs(db.get("TagList"))
        .into_iter()
        .map(|(k, v)| format!("{}:{}", k, v))
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR);

    Record::for_account(account)
        .json("DBInstanceIdentifier", db, "DBInstanceIdentifier")
        .json("DBInstanceClass", db, "DBInstanceClass")
        .json("Engine", db, "Engine")
        .json("Status", db, "DBInstanceStatus")
        .json("AllocatedStorageGB", db, "AllocatedStorage")
        .json("MultiAZ", db, "MultiAZ")
        .json("StorageType", db, "StorageType")
        .json("BackupRetentionDays", db, "BackupRetentionPeriod")
        .json("CreationTime", db, "InstanceCreateTime")
        .with(
            "VpcSecurityGroups",
            flatten::join_field(db, "VpcSecurityGroups", "VpcSecurityGroupId", LIST_SEPARATOR),
        )
        .with("Tags", tags)
        .with("RDSInstanceCostEstimateMonthlyUSD", monthly_cost(&class))
}

pub fn map_reservation(ri: &Value, account: &str) -> Record {
    let count = flatten::lookup(ri, "DBInstanceCount")
        .and_then(Value::as_i64)
        .unwrap_or(1);
    let fixed = flatten::lookup(ri, "FixedPrice").and_then(Value::as_f64);

    Record::for_account(account)
        .json("ReservedDBInstanceId", ri, "ReservedDBInstanceId")
        .json("DBInstanceClass", ri, "DBInstanceClass")
        .json("Engine", ri, "Engine")
        .with("DBInstanceCount", count)
        .json("OfferingType", ri, "OfferingType")
        .json("Duration", ri, "Duration")
        .json("FixedPrice", ri, "FixedPrice")
        .with("TotalFixedPrice", fixed.map(|f| f * count as f64))
        .json("UsagePrice", ri, "UsagePrice")
        .json("ProductDescription", ri, "ProductDescription")
        .json("State", ri, "State")
        .json("StartTime", ri, "StartTime")
        .json("EndTime", ri, "EndTime")
        .json("RecurringChargeAmount", ri, "RecurringCharges.0.RecurringChargeAmount")
        .json("RecurringChargeFrequency", ri, "RecurringCharges.0.RecurringChargeFrequency")
}

pub async fn collect_instances<R: AwsRunner>(runner: &R, profile: &str, records: &mut Vec<Record>) {
    match call_json(runner, profile, &AwsCall::new("rds", "describe-db-instances")).await {
        Ok(v) => {
            records.extend(
                flatten::items(&v, "DBInstances")
                    .iter()
                    .map(|db| map_instance(db, profile)),
            );
            tracing::info!("{} - RDS info collected", profile);
        }
        Err(e) => log_skip("RDS instances", profile, &e),
    }
}

pub async fn collect_reservations<R: AwsRunner>(runner: &R, profile: &str, records: &mut Vec<Record>) {
    match call_json(runner, profile, &AwsCall::new("rds", "describe-reserved-db-instances")).await {
        Ok(v) => {
            records.extend(
                flatten::items(&v, "ReservedDBInstances")
                    .iter()
                    .map(|ri| map_reservation(ri, profile)),
            );
            tracing::info!("{} - RDS reservation info collected", profile);
        }
        Err(e) => log_skip("RDS reservations", profile, &e),
    }
}

pub async fn run<R: AwsRunner>(runner: &R, ctx: &RunContext) -> Result<Option<PathBuf>> {
    let mut instances = Vec::new();
    let mut reservations = Vec::new();
    for profile in &ctx.profiles {
        collect_instances(runner, profile, &mut instances).await;
        collect_reservations(runner, profile, &mut reservations).await;
    }

    if instances.is_empty() && reservations.is_empty() {
        summary::nothing_found("No data collected from any profiles.");
        return Ok(None);
    }

    let mut report = Report::new(FILE_PREFIX);
    report.push_if_not_empty(Sheet::from_records(INSTANCES_SHEET, &instances));
    report.push_if_not_empty(Sheet::from_records(RESERVATIONS_SHEET, &reservations));
    let path = export(&report, ctx)?;

    let estimate: f64 = instances
        .iter()
        .filter_map(|r| match r.get("RDSInstanceCostEstimateMonthlyUSD") {
            Some(Cell::Number(n)) => Some(*n),
            _ => None,
        })
        .sum();

    summary::saved("RDS report", &path);
    summary::line("Instances", instances.len());
    summary::line("Reservations", reservations.len());
    summary::line("Estimated monthly cost (USD)", format!("{:.2}", estimate));

    Ok(Some(path))
}
