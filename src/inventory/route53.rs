//! Route 53 hosted zones, their record sets, and health checks

use super::{export, log_skip, RunContext};
use crate::aws::{call_json, AwsCall, AwsRunner};
use crate::flatten::{self, LIST_SEPARATOR};
use crate::report::{summary, Cell, Record, Report, Sheet};
use anyhow::Result;
use serde_json::Value;
use std::path::PathBuf;

pub const FILE_PREFIX: &str = "route53_inventory";
pub const ZONES_SHEET: &str = "Hosted_Zones";
pub const RECORDS_SHEET: &str = "DNS_Records";
pub const HEALTH_CHECKS_SHEET: &str = "Health_Checks";

const ZONE_ID_PREFIX: &str = "/hostedzone/";

/// (column, path under `HealthCheckConfig`)
const HEALTH_CHECK_FIELDS: &[(&str, &str)] = &[
    ("Type", "Type"),
    ("ResourcePath", "ResourcePath"),
    ("FQDN", "FullyQualifiedDomainName"),
    ("IPAddress", "IPAddress"),
    ("Port", "Port"),
    ("RequestInterval", "RequestInterval"),
    ("FailureThreshold", "FailureThreshold"),
    ("MeasureLatency", "MeasureLatency"),
    ("Inverted", "Inverted"),
    ("Disabled", "Disabled"),
    ("HealthThreshold", "HealthThreshold"),
];

pub fn map_zone(zone: &Value, account: &str) -> Record {
    Record::new()
        .with(
            "Id",
            flatten::strip_id_prefix(&flatten::text(zone, "Id"), ZONE_ID_PREFIX),
        )
        .json("Name", zone, "Name")
        .json("CallerReference", zone, "CallerReference")
        .json("ResourceRecordSetCount", zone, "ResourceRecordSetCount")
        .json("Comment", zone, "Config.Comment")
        .json("PrivateZone", zone, "Config.PrivateZone")
        .with("Account", account)
}

pub fn map_record(rr: &Value, account: &str, zone_id: &str, zone_name: &str) -> Record {
    let values = flatten::join_field(rr, "ResourceRecords", "Value", LIST_SEPARATOR);

    Record::new()
        .json("Name", rr, "Name")
        .json("Type", rr, "Type")
        .json("TTL", rr, "TTL")
        .with("ResourceRecords", if values.is_empty() { Cell::Empty } else { values.into() })
        .json("AliasTarget", rr, "AliasTarget.DNSName")
        .json("Weight", rr, "Weight")
        .json("Region", rr, "Region")
        .json("Failover", rr, "Failover")
        .json("SetIdentifier", rr, "SetIdentifier")
        .json("HealthCheckId", rr, "HealthCheckId")
        .with("Account", account)
        .with("ZoneId", zone_id)
        .with("ZoneName", zone_name)
}

pub fn map_health_check(check: &Value, account: &str) -> Record {
    let mut record = Record::new()
        .json("Id", check, "Id")
        .json("CallerReference", check, "CallerReference");

    for (column, field) in HEALTH_CHECK_FIELDS {
        record = record.json(column, check, &format!("HealthCheckConfig.{}", field));
    }

    record
        .json("ChildHealthChecks", check, "HealthCheckConfig.ChildHealthChecks")
        .json("EnableSNI", check, "HealthCheckConfig.EnableSNI")
        .json("Regions", check, "HealthCheckConfig.Regions")
        .with("Account", account)
}

/// Rows collected for one run
#[derive(Debug, Default)]
pub struct Route53Rows {
    pub zones: Vec<Record>,
    pub records: Vec<Record>,
    pub health_checks: Vec<Record>,
}

pub async fn collect<R: AwsRunner>(runner: &R, profile: &str, rows: &mut Route53Rows) {
    let mut zones = Vec::new();
    match call_json(runner, profile, &AwsCall::new("route53", "list-hosted-zones")).await {
        Ok(v) => {
            zones = flatten::items(&v, "HostedZones")
                .iter()
                .map(|z| map_zone(z, profile))
                .collect();
            if zones.is_empty() {
                tracing::info!("No hosted zones found for {}", profile);
            } else {
                tracing::info!("Found {} hosted zones for {}", zones.len(), profile);
            }
        }
        Err(e) => log_skip("hosted zones", profile, &e),
    }

    match call_json(runner, profile, &AwsCall::new("route53", "list-health-checks")).await {
        Ok(v) => {
            let checks = flatten::items(&v, "HealthChecks");
            tracing::info!("Found {} health checks for {}", checks.len(), profile);
            rows.health_checks
                .extend(checks.iter().map(|c| map_health_check(c, profile)));
        }
        Err(e) => log_skip("health checks", profile, &e),
    }

    for zone in &zones {
        let zone_id = zone.text("Id");
        let zone_name = zone.text("Name");
        let call = AwsCall::new("route53", "list-resource-record-sets").arg("--hosted-zone-id", &zone_id);

        match call_json(runner, profile, &call).await {
            Ok(v) => {
                let sets = flatten::items(&v, "ResourceRecordSets");
                tracing::info!("Found {} DNS records in zone {}", sets.len(), zone_name);
                rows.records
                    .extend(sets.iter().map(|rr| map_record(rr, profile, &zone_id, &zone_name)));
            }
            Err(e) => log_skip(&format!("DNS records of zone {}", zone_name), profile, &e),
        }
    }

    rows.zones.extend(zones);
}

pub fn build_report(rows: &Route53Rows) -> Report {
    let mut report = Report::new(FILE_PREFIX);
    report.push(Sheet::from_records(ZONES_SHEET, &rows.zones));
    report.push(Sheet::from_records(RECORDS_SHEET, &rows.records));
    report.push(Sheet::from_records(HEALTH_CHECKS_SHEET, &rows.health_checks));
    report
}

pub async fn run<R: AwsRunner>(runner: &R, ctx: &RunContext) -> Result<Option<PathBuf>> {
    let mut rows = Route53Rows::default();
    for profile in &ctx.profiles {
        collect(runner, profile, &mut rows).await;
    }

    let path = export(&build_report(&rows), ctx)?;

    summary::saved("Route53 inventory", &path);
    summary::header("Summary");
    summary::line("Total Hosted Zones", rows.zones.len());
    summary::line("Total DNS Records", rows.records.len());
    summary::line("Total Health Checks", rows.health_checks.len());
    summary::line("Accounts processed", ctx.profiles.len());

    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::fake::FakeAws;
    use serde_json::json;

    #[test]
    fn test_map_record_joins_values() {
        let rr = json!({
            "Name": "www.example.com.",
            "Type": "A",
            "TTL": 300,
            "ResourceRecords": [{"Value": "1.1.1.1"}, {"Value": "2.2.2.2"}]
        });
        let row = map_record(&rr, "shared", "Z1", "example.com.");
        assert_eq!(row.text("ResourceRecords"), "1.1.1.1, 2.2.2.2");
        assert_eq!(row.text("ZoneId"), "Z1");

        let alias = json!({"Name": "example.com.", "Type": "A", "AliasTarget": {"DNSName": "d1.cloudfront.net."}});
        let row = map_record(&alias, "shared", "Z1", "example.com.");
        assert_eq!(row.get("ResourceRecords"), Some(&Cell::Empty));
        assert_eq!(row.text("AliasTarget"), "d1.cloudfront.net.");
    }

    #[test]
    fn test_map_health_check_lists() {
        let check = json!({
            "Id": "hc-1",
            "HealthCheckConfig": {
                "Type": "HTTPS",
                "FullyQualifiedDomainName": "api.example.com",
                "Port": 443,
                "Regions": ["us-east-1", "eu-west-1"]
            }
        });
        let row = map_health_check(&check, "shared");
        assert_eq!(row.text("FQDN"), "api.example.com");
        assert_eq!(row.get("Port"), Some(&Cell::Int(443)));
        assert_eq!(row.text("Regions"), "us-east-1, eu-west-1");
        assert_eq!(row.get("ChildHealthChecks"), Some(&Cell::Empty));
    }

    #[tokio::test]
    async fn test_collect_walks_zones() {
        let fake = FakeAws::new()
            .json(
                "route53 list-hosted-zones",
                json!({"HostedZones": [{
                    "Id": "/hostedzone/Z123", "Name": "example.com.",
                    "ResourceRecordSetCount": 2, "Config": {"PrivateZone": false}
                }]}),
            )
            .json("route53 list-health-checks", json!({"HealthChecks": []}))
            .json(
                "route53 list-resource-record-sets --hosted-zone-id Z123",
                json!({"ResourceRecordSets": [
                    {"Name": "example.com.", "Type": "NS", "TTL": 172800, "ResourceRecords": [{"Value": "ns-1."}]},
                    {"Name": "example.com.", "Type": "SOA", "TTL": 900, "ResourceRecords": [{"Value": "ns-1. admin."}]}
                ]}),
            );

        let mut rows = Route53Rows::default();
        collect(&fake, "shared", &mut rows).await;

        assert_eq!(rows.zones.len(), 1);
        assert_eq!(rows.zones[0].text("Id"), "Z123");
        assert_eq!(rows.records.len(), 2);
        assert_eq!(rows.records[1].text("ZoneName"), "example.com.");

        let report = build_report(&rows);
        let names: Vec<&str> = report.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![ZONES_SHEET, RECORDS_SHEET, HEALTH_CHECKS_SHEET]);
    }
}
