//! WorkSpaces details, connection usage and running-mode analysis
//!
//! Two listings per profile feed six sheets: the raw details and usage rows,
//! a running-mode breakdown with the matching pricing model, a usage
//! summary, the unused desktops, and an outer join of details and usage on
//! (Account, WorkspaceId).

use super::{export, log_skip, RunContext};
use crate::aws::{call_json, AwsCall, AwsRunner};
use crate::flatten;
use crate::report::{summary, Cell, Record, Report, Sheet};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::PathBuf;

pub const FILE_PREFIX: &str = "workspaces_master_analysis";
pub const DETAILS_SHEET: &str = "WorkSpaces_Details";
pub const RUNNING_MODE_SHEET: &str = "Running_Mode_Analysis";
pub const USAGE_SHEET: &str = "Usage_Analysis";
pub const USAGE_SUMMARY_SHEET: &str = "Usage_Summary";
pub const UNUSED_SHEET: &str = "Unused_WorkSpaces";
pub const COMBINED_SHEET: &str = "Combined_Analysis";

const LAST_CONNECTION_FORMAT: &str = "%Y-%m-%d %H:%M";

/// (column, path) of the fields kept from `describe-workspaces`
const DETAIL_FIELDS: &[(&str, &str)] = &[
    ("WorkspaceId", "WorkspaceId"),
    ("DirectoryId", "DirectoryId"),
    ("UserName", "UserName"),
    ("IpAddress", "IpAddress"),
    ("State", "State"),
    ("BundleId", "BundleId"),
    ("SubnetId", "SubnetId"),
    ("ErrorMessage", "ErrorMessage"),
    ("VolumeEncryptionKey", "VolumeEncryptionKey"),
    ("UserVolumeEncryptionEnabled", "UserVolumeEncryptionEnabled"),
    ("RootVolumeEncryptionEnabled", "RootVolumeEncryptionEnabled"),
    ("ComputeTypeName", "WorkspaceProperties.ComputeTypeName"),
    ("RootVolumeSizeGib", "WorkspaceProperties.RootVolumeSizeGib"),
    ("UserVolumeSizeGib", "WorkspaceProperties.UserVolumeSizeGib"),
    ("RunningMode", "WorkspaceProperties.RunningMode"),
    (
        "RunningModeAutoStopTimeoutInMinutes",
        "WorkspaceProperties.RunningModeAutoStopTimeoutInMinutes",
    ),
    ("Protocols", "WorkspaceProperties.Protocols"),
];

/// Usage classification from the last user connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageStatus {
    NeverUsed,
    Unused90,
    Unused30,
    LowUsage,
    Active,
    Unknown,
}

impl UsageStatus {
    pub fn from_days(days: i64) -> Self {
        match days {
            d if d > 90 => UsageStatus::Unused90,
            d if d > 30 => UsageStatus::Unused30,
            d if d > 7 => UsageStatus::LowUsage,
            _ => UsageStatus::Active,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            UsageStatus::NeverUsed => "Never used",
            UsageStatus::Unused90 => "Unused (90+ days)",
            UsageStatus::Unused30 => "Unused (30+ days)",
            UsageStatus::LowUsage => "Low usage (7+ days)",
            UsageStatus::Active => "Active",
            UsageStatus::Unknown => "Unknown",
        }
    }

    pub fn recommendation(self) -> &'static str {
        match self {
            UsageStatus::NeverUsed => "Consider termination - never connected",
            UsageStatus::Unused90 => "Consider termination - long unused",
            UsageStatus::Unused30 => "Review with user - may be unused",
            UsageStatus::LowUsage => "Monitor usage patterns",
            UsageStatus::Active => "No action needed",
            UsageStatus::Unknown => "Manual review needed",
        }
    }
}

/// Whether a usage label marks a desktop nobody uses
pub fn is_unused_label(label: &str) -> bool {
    label.contains("Unused") || label.contains("Never")
}

/// Pricing model implied by a running mode
pub fn pricing_model(running_mode: &str) -> &'static str {
    match running_mode {
        "ALWAYS_ON" => "Personal (Monthly fixed cost)",
        "AUTO_STOP" => "Core/Pool (Pay per hour)",
        _ => "Unknown",
    }
}

/// LastConnection text, DaysUnused cell and status for a last-connection value
pub fn classify_usage(last_connection: Option<&Value>, now: DateTime<Utc>) -> (String, Cell, UsageStatus) {
    let Some(value) = last_connection.filter(|v| !flatten::render(v).is_empty()) else {
        return ("Never".to_string(), Cell::from("Never connected"), UsageStatus::NeverUsed);
    };

    match flatten::parse_timestamp(value) {
        Some(at) => {
            let days = flatten::days_between(now, at);
            (
                at.format(LAST_CONNECTION_FORMAT).to_string(),
                Cell::Int(days),
                UsageStatus::from_days(days),
            )
        }
        None => ("Never".to_string(), Cell::from("Parse error"), UsageStatus::Unknown),
    }
}

pub fn map_workspace(ws: &Value, account: &str) -> Record {
    let mut record = Record::for_account(account);
    for (column, path) in DETAIL_FIELDS {
        record = record.json(column, ws, path);
    }
    record
}

pub fn map_connection_status(status: &Value, account: &str, now: DateTime<Utc>) -> Record {
    let (last, days, usage_status) = classify_usage(status.get("LastKnownUserConnectionTimestamp"), now);

    Record::new()
        .json_or("WorkspaceId", status, "WorkspaceId", flatten::PLACEHOLDER)
        .json_or("ConnectionState", status, "ConnectionState", "UNKNOWN")
        .with("LastConnection", last)
        .with("DaysUnused", days)
        .with("UsageStatus", usage_status.label())
        .with("Recommendation", usage_status.recommendation())
        .with("Account", account)
}

/// Count per (Account, RunningMode, ComputeType) with the pricing model
pub fn running_mode_analysis(details: &Sheet) -> Sheet {
    let mut sheet = details.count_by(
        RUNNING_MODE_SHEET,
        &["Account", "RunningMode", "ComputeTypeName"],
        "Count",
    );
    sheet.columns[2] = "ComputeType".to_string();
    sheet.columns.push("PricingModel".to_string());
    for row in &mut sheet.rows {
        let model = pricing_model(&row[1].to_string());
        row.push(Cell::from(model));
    }
    sheet
}

/// Outer join on (Account, WorkspaceId), ordered by that key
pub fn combine(details: &[Record], usage: &[Record]) -> Vec<Record> {
    let key = |r: &Record| (r.text("Account"), r.text("WorkspaceId"));

    let mut combined: Vec<Record> = details
        .iter()
        .map(|d| {
            let mut merged = d.clone();
            if let Some(u) = usage.iter().find(|u| key(*u) == key(d)) {
                for (column, value) in u.fields() {
                    if merged.get(column).is_none() {
                        merged.set(column, value.clone());
                    }
                }
            }
            merged
        })
        .collect();

    combined.extend(
        usage
            .iter()
            .filter(|u| !details.iter().any(|d| key(d) == key(*u)))
            .cloned(),
    );
    combined.sort_by_key(key);
    combined
}

pub async fn collect_details<R: AwsRunner>(runner: &R, profile: &str, records: &mut Vec<Record>) {
    let call = AwsCall::new("workspaces", "describe-workspaces");
    match call_json(runner, profile, &call).await {
        Ok(v) => {
            let workspaces = flatten::items(&v, "Workspaces");
            if workspaces.is_empty() {
                tracing::info!("No WorkSpaces found for {}", profile);
            } else {
                tracing::info!("WorkSpaces details for {}: {} workspaces", profile, workspaces.len());
            }
            records.extend(workspaces.iter().map(|ws| map_workspace(ws, profile)));
        }
        Err(e) => log_skip("WorkSpaces", profile, &e),
    }
}

pub async fn collect_usage<R: AwsRunner>(
    runner: &R,
    profile: &str,
    now: DateTime<Utc>,
    records: &mut Vec<Record>,
) {
    let call = AwsCall::new("workspaces", "describe-workspaces-connection-status");
    match call_json(runner, profile, &call).await {
        Ok(v) => {
            let statuses = flatten::items(&v, "WorkspacesConnectionStatus");
            tracing::info!("Usage data for {}: {} workspaces", profile, statuses.len());
            records.extend(statuses.iter().map(|s| map_connection_status(s, profile, now)));
        }
        Err(e) => log_skip("WorkSpaces usage", profile, &e),
    }
}

pub fn build_report(details: &[Record], usage: &[Record]) -> Report {
    let mut report = Report::new(FILE_PREFIX);

    if !details.is_empty() {
        let sheet = Sheet::from_records(DETAILS_SHEET, details);
        report.push_if_not_empty(running_mode_analysis(&sheet));
        report.sheets.insert(0, sheet);
    }

    if !usage.is_empty() {
        let sheet = Sheet::from_records(USAGE_SHEET, usage);
        let usage_summary = sheet.count_by(USAGE_SUMMARY_SHEET, &["Account", "UsageStatus"], "Count");
        let unused = sheet.filter_by(UNUSED_SHEET, "UsageStatus", |c| is_unused_label(&c.to_string()));
        report.push(sheet);
        report.push(usage_summary);
        report.push_if_not_empty(unused);
    }

    if !details.is_empty() && !usage.is_empty() {
        report.push(Sheet::from_records(COMBINED_SHEET, &combine(details, usage)));
    }

    report
}

pub async fn run<R: AwsRunner>(runner: &R, ctx: &RunContext) -> Result<Option<PathBuf>> {
    let now = ctx.now_utc();
    let mut details = Vec::new();
    let mut usage = Vec::new();
    for profile in &ctx.profiles {
        tracing::info!("Processing profile: {}", profile);
        collect_details(runner, profile, &mut details).await;
        collect_usage(runner, profile, now, &mut usage).await;
    }

    if details.is_empty() && usage.is_empty() {
        summary::nothing_found("No WorkSpaces found across any profiles.");
        return Ok(None);
    }

    let report = build_report(&details, &usage);
    let path = export(&report, ctx)?;
    print_summary(&report, &path);

    Ok(Some(path))
}

fn print_summary(report: &Report, path: &std::path::Path) {
    summary::saved("WorkSpaces master analysis", path);

    if let Some(details) = report.sheet(DETAILS_SHEET) {
        summary::line("Total WorkSpaces found", details.len());
        summary::counts("Running Mode Distribution", &details.value_counts("RunningMode"), "workspaces");
    }

    if let Some(usage) = report.sheet(USAGE_SHEET) {
        summary::counts("Usage Status Summary", &usage.value_counts("UsageStatus"), "workspaces");

        let unused = report.sheet(UNUSED_SHEET).map(Sheet::len).unwrap_or(0);
        if unused > 0 {
            summary::attention(&format!(
                "{} WorkSpaces appear unused - potential cost savings!",
                unused
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::fake::FakeAws;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn workspace(id: &str, mode: &str) -> Value {
        json!({
            "WorkspaceId": id,
            "UserName": "jdoe",
            "State": "AVAILABLE",
            "WorkspaceProperties": {
                "ComputeTypeName": "STANDARD",
                "RunningMode": mode,
                "Protocols": ["PCOIP", "WSP"]
            }
        })
    }

    #[test]
    fn test_usage_thresholds() {
        let (last, days, status) = classify_usage(Some(&json!("2026-10-18T12:00:00Z")), now());
        assert_eq!(last, "2026-10-18 12:00");
        assert_eq!(days, Cell::Int(1));
        assert_eq!(status, UsageStatus::Active);

        assert_eq!(classify_usage(Some(&json!("2026-10-10T12:00:00Z")), now()).2, UsageStatus::LowUsage);
        assert_eq!(classify_usage(Some(&json!("2026-09-01T00:00:00Z")), now()).2, UsageStatus::Unused30);
        assert_eq!(classify_usage(Some(&json!("2026-01-01T00:00:00Z")), now()).2, UsageStatus::Unused90);
    }

    #[test]
    fn test_usage_never_and_parse_error() {
        let (last, days, status) = classify_usage(None, now());
        assert_eq!((last.as_str(), status), ("Never", UsageStatus::NeverUsed));
        assert_eq!(days, Cell::from("Never connected"));

        let (_, days, status) = classify_usage(Some(&json!("yesterday")), now());
        assert_eq!(days, Cell::from("Parse error"));
        assert_eq!(status.recommendation(), "Manual review needed");
    }

    #[test]
    fn test_running_mode_analysis() {
        let details = vec![
            map_workspace(&workspace("ws-1", "ALWAYS_ON"), "shared"),
            map_workspace(&workspace("ws-2", "ALWAYS_ON"), "shared"),
            map_workspace(&workspace("ws-3", "AUTO_STOP"), "shared"),
        ];
        let sheet = running_mode_analysis(&Sheet::from_records(DETAILS_SHEET, &details));

        assert_eq!(
            sheet.columns,
            vec!["Account", "RunningMode", "ComputeType", "Count", "PricingModel"]
        );
        assert_eq!(sheet.rows[0][3], Cell::Int(2));
        assert_eq!(sheet.rows[0][4], Cell::from("Personal (Monthly fixed cost)"));
        assert_eq!(sheet.rows[1][4], Cell::from("Core/Pool (Pay per hour)"));
    }

    #[test]
    fn test_combine_is_outer_join() {
        let details = vec![
            map_workspace(&workspace("ws-2", "AUTO_STOP"), "shared"),
            map_workspace(&workspace("ws-1", "ALWAYS_ON"), "shared"),
        ];
        let usage = vec![
            map_connection_status(&json!({"WorkspaceId": "ws-1"}), "shared", now()),
            map_connection_status(&json!({"WorkspaceId": "ws-9"}), "shared", now()),
        ];

        let combined = combine(&details, &usage);
        let ids: Vec<String> = combined.iter().map(|r| r.text("WorkspaceId")).collect();
        assert_eq!(ids, vec!["ws-1", "ws-2", "ws-9"]);
        assert_eq!(combined[0].text("UsageStatus"), "Never used");
        assert_eq!(combined[0].text("RunningMode"), "ALWAYS_ON");
        assert_eq!(combined[1].get("UsageStatus"), None);
        assert_eq!(combined[2].get("RunningMode"), None);
    }

    #[test]
    fn test_build_report_sheets() {
        let details = vec![map_workspace(&workspace("ws-1", "ALWAYS_ON"), "shared")];
        let usage = vec![map_connection_status(
            &json!({"WorkspaceId": "ws-1", "LastKnownUserConnectionTimestamp": "2026-10-19T08:00:00Z"}),
            "shared",
            now(),
        )];

        let report = build_report(&details, &usage);
        let names: Vec<&str> = report.sheets.iter().map(|s| s.name.as_str()).collect();
        // No unused desktops, so no Unused_WorkSpaces sheet
        assert_eq!(
            names,
            vec![DETAILS_SHEET, RUNNING_MODE_SHEET, USAGE_SHEET, USAGE_SUMMARY_SHEET, COMBINED_SHEET]
        );
        assert_eq!(report.sheets[0].columns[0], "Account");
    }

    #[tokio::test]
    async fn test_collect_usage_reads_epoch_timestamps() {
        let fake = FakeAws::new().json(
            "workspaces describe-workspaces-connection-status",
            json!({"WorkspacesConnectionStatus": [
                {"WorkspaceId": "ws-1", "ConnectionState": "DISCONNECTED",
                 "LastKnownUserConnectionTimestamp": 1760875200.0},
                {"WorkspaceId": "ws-2"}
            ]}),
        );

        let mut records = Vec::new();
        collect_usage(&fake, "shared", now(), &mut records).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text("LastConnection"), "2025-10-19 12:00");
        assert_eq!(records[0].text("UsageStatus"), "Unused (90+ days)");
        assert_eq!(records[1].text("ConnectionState"), "UNKNOWN");
        assert_eq!(records[1].text("LastConnection"), "Never");
    }
}
