//! Load balancer inventory: ALB/NLB/GWLB (elbv2) and classic ELBs

use super::{export, log_skip, RunContext};
use crate::aws::{call_json, AwsCall, AwsRunner};
use crate::flatten::{self, LIST_SEPARATOR};
use crate::report::{summary, Record, Report, Sheet};
use anyhow::Result;
use serde_json::Value;
use std::path::PathBuf;

pub const FILE_PREFIX: &str = "load_balancer_inventory";
pub const SHEET_NAME: &str = "Load_Balancers";

/// Policy marker for classic listeners carrying a certificate
pub const CLASSIC_SSL: &str = "Classic-SSL";

/// Joined non-empty `field` values of a list of objects
fn joined(list: &[Value], field: &str) -> String {
    list.iter()
        .map(|v| flatten::text(v, field))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// Details of an elbv2 load balancer gathered by follow-up calls
#[derive(Debug, Default)]
pub struct Elbv2Details {
    pub listeners: Vec<Value>,
    pub target_groups: Vec<Value>,
    pub tags: Vec<Value>,
}

pub fn map_elbv2(lb: &Value, details: &Elbv2Details, account: &str) -> Record {
    let tags: Value = details.tags.clone().into();
    let zones = flatten::items(lb, "AvailabilityZones");
    let listeners = &details.listeners;

    Record::for_account(account)
        .json("LoadBalancerName", lb, "LoadBalancerName")
        .with("Name", flatten::name_tag(Some(&tags)))
        .json("Type", lb, "Type")
        .json("DNSName", lb, "DNSName")
        .json("Scheme", lb, "Scheme")
        .json("State", lb, "State.Code")
        .json("VpcId", lb, "VpcId")
        .json("IpAddressType", lb, "IpAddressType")
        .json("CreatedTime", lb, "CreatedTime")
        .with("AvailabilityZones", joined(zones, "ZoneName"))
        .with("Subnets", joined(zones, "SubnetId"))
        .with("SecurityGroups", flatten::join_strings(lb, "SecurityGroups", LIST_SEPARATOR))
        .with("ListenerPorts", joined(listeners, "Port"))
        .with(
            "ListenerProtocols",
            flatten::join_distinct(listeners.iter().map(|l| flatten::text(l, "Protocol")), LIST_SEPARATOR),
        )
        .with(
            "SSLPolicies",
            flatten::join_distinct(listeners.iter().map(|l| flatten::text(l, "SslPolicy")), LIST_SEPARATOR),
        )
        .with("Certificates", joined(listeners, "Certificates.0.CertificateArn"))
        .with("TargetGroups", joined(&details.target_groups, "TargetGroupName"))
        .with("TargetGroupCount", details.target_groups.len())
        .with("Tags", flatten::tags_summary(Some(&tags)))
        .json("LoadBalancerArn", lb, "LoadBalancerArn")
}

pub fn map_classic(lb: &Value, account: &str) -> Record {
    let listeners: Vec<&Value> = flatten::items(lb, "ListenerDescriptions")
        .iter()
        .filter_map(|d| flatten::lookup(d, "Listener"))
        .collect();

    let ports = listeners
        .iter()
        .map(|l| flatten::text(l, "LoadBalancerPort"))
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR);
    let protocols = flatten::join_distinct(listeners.iter().map(|l| flatten::text(l, "Protocol")), LIST_SEPARATOR);
    let ssl = listeners
        .iter()
        .any(|l| !flatten::text(l, "SSLCertificateId").is_empty());

    Record::for_account(account)
        .json("LoadBalancerName", lb, "LoadBalancerName")
        .json("Name", lb, "LoadBalancerName")
        .with("Type", "classic")
        .json("DNSName", lb, "DNSName")
        .json("Scheme", lb, "Scheme")
        .with("State", "active")
        .json_or("VpcId", lb, "VPCId", "")
        .with("IpAddressType", "ipv4")
        .json("CreatedTime", lb, "CreatedTime")
        .with("AvailabilityZones", flatten::join_strings(lb, "AvailabilityZones", LIST_SEPARATOR))
        .with("Subnets", flatten::join_strings(lb, "Subnets", LIST_SEPARATOR))
        .with("SecurityGroups", flatten::join_strings(lb, "SecurityGroups", LIST_SEPARATOR))
        .with("ListenerPorts", ports)
        .with("ListenerProtocols", protocols)
        .with("SSLPolicies", if ssl { CLASSIC_SSL } else { "" })
        .with("Certificates", "")
        .with("TargetGroups", "")
        .with("TargetGroupCount", 0usize)
        .with("InstanceCount", flatten::items(lb, "Instances").len())
        .with("HealthCheckTarget", flatten::text(lb, "HealthCheck.Target"))
        .with("Tags", "")
        .with("LoadBalancerArn", "")
}

/// A list from a follow-up call; failures give an empty list
async fn sub_list<R: AwsRunner>(runner: &R, profile: &str, call: AwsCall, path: &str) -> Vec<Value> {
    match call_json(runner, profile, &call).await {
        Ok(v) => flatten::items(&v, path).to_vec(),
        Err(e) => {
            tracing::debug!("{} failed: {}", call.describe(), e);
            Vec::new()
        }
    }
}

async fn elbv2_details<R: AwsRunner>(runner: &R, profile: &str, arn: &str) -> Elbv2Details {
    let listeners = sub_list(
        runner,
        profile,
        AwsCall::new("elbv2", "describe-listeners").arg("--load-balancer-arn", arn),
        "Listeners",
    )
    .await;
    let target_groups = sub_list(
        runner,
        profile,
        AwsCall::new("elbv2", "describe-target-groups").arg("--load-balancer-arn", arn),
        "TargetGroups",
    )
    .await;
    let tags = sub_list(
        runner,
        profile,
        AwsCall::new("elbv2", "describe-tags").arg("--resource-arns", arn),
        "TagDescriptions.0.Tags",
    )
    .await;

    Elbv2Details {
        listeners,
        target_groups,
        tags,
    }
}

pub async fn collect<R: AwsRunner>(runner: &R, profile: &str, records: &mut Vec<Record>) {
    tracing::info!("Checking ALB/NLB for account: {}", profile);
    match call_json(runner, profile, &AwsCall::new("elbv2", "describe-load-balancers")).await {
        Ok(response) => {
            let lbs = flatten::items(&response, "LoadBalancers");
            tracing::info!("Found {} ALB/NLB load balancers", lbs.len());
            for lb in lbs {
                let details = elbv2_details(runner, profile, &flatten::text(lb, "LoadBalancerArn")).await;
                records.push(map_elbv2(lb, &details, profile));
            }
        }
        Err(e) => log_skip("ALB/NLB data", profile, &e),
    }

    tracing::info!("Checking CLB for account: {}", profile);
    match call_json(runner, profile, &AwsCall::new("elb", "describe-load-balancers")).await {
        Ok(response) => {
            let lbs = flatten::items(&response, "LoadBalancerDescriptions");
            tracing::info!("Found {} Classic Load Balancers", lbs.len());
            records.extend(lbs.iter().map(|lb| map_classic(lb, profile)));
        }
        Err(e) => log_skip("CLB data", profile, &e),
    }
}

pub async fn run<R: AwsRunner>(runner: &R, ctx: &RunContext) -> Result<Option<PathBuf>> {
    let mut records = Vec::new();
    for profile in &ctx.profiles {
        collect(runner, profile, &mut records).await;
    }

    let sheet = Sheet::from_records(SHEET_NAME, &records);
    let mut report = Report::new(FILE_PREFIX);
    report.push(sheet.clone());
    let path = export(&report, ctx)?;

    if sheet.is_empty() {
        summary::nothing_found("No load balancers found across all accounts");
        return Ok(Some(path));
    }

    summary::saved("Load balancer inventory", &path);
    summary::header("Summary");
    summary::line("Total Load Balancers", sheet.len());
    summary::counts("Load Balancer Types", &sheet.value_counts("Type"), "");
    summary::counts("Schemes", &sheet.value_counts("Scheme"), "");
    summary::line("Accounts processed", ctx.profiles.len());
    summary::counts("Load Balancers by account", &sheet.value_counts("Account"), "");

    Ok(Some(path))
}
