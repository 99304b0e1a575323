//! ACM certificate inventory
//!
//! Lists certificates per profile, describes each one and classifies it by
//! days remaining until `NotAfter`.

use super::{export, log_skip, RunContext};
use crate::aws::{call_json, AwsCall, AwsRunner};
use crate::flatten::{self, LIST_SEPARATOR, PLACEHOLDER};
use crate::report::{summary, Cell, Record, Report, Sheet};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::PathBuf;

pub const FILE_PREFIX: &str = "acm_certificates";

const COLUMNS: &[&str] = &[
    "Account",
    "DomainName",
    "Status",
    "ExpiryStatus",
    "DaysUntilExpiry",
    "NotAfter",
    "Type",
    "SubjectAlternativeNames",
    "KeyAlgorithm",
    "SignatureAlgorithm",
    "RenewalEligibility",
    "Recommendation",
    "CertificateArn",
    "CreatedAt",
    "IssuedAt",
    "NotBefore",
    "KeyUsages",
    "ExtendedKeyUsages",
];

/// Text used when a list field is empty
const EMPTY_LIST: &str = "None";

/// Expiry classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryStatus {
    Expired,
    Within30Days,
    Within60Days,
    Valid,
    Unknown,
}

impl ExpiryStatus {
    pub fn from_days(days: i64) -> Self {
        match days {
            d if d < 0 => ExpiryStatus::Expired,
            d if d <= 30 => ExpiryStatus::Within30Days,
            d if d <= 60 => ExpiryStatus::Within60Days,
            _ => ExpiryStatus::Valid,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExpiryStatus::Expired => "Expired",
            ExpiryStatus::Within30Days => "Expires Soon (30 days)",
            ExpiryStatus::Within60Days => "Expires Soon (60 days)",
            ExpiryStatus::Valid => "Valid",
            ExpiryStatus::Unknown => "Unknown",
        }
    }

    pub fn needs_attention(self) -> bool {
        matches!(
            self,
            ExpiryStatus::Expired | ExpiryStatus::Within30Days | ExpiryStatus::Within60Days
        )
    }
}

/// Days until expiry and the resulting status.
/// Absent `NotAfter` gives `N/A`, an unparseable one gives `Parse Error`.
pub fn expiry(not_after: Option<&Value>, now: DateTime<Utc>) -> (Cell, ExpiryStatus) {
    let Some(not_after) = not_after else {
        return (Cell::from(PLACEHOLDER), ExpiryStatus::Unknown);
    };

    match flatten::parse_timestamp(not_after) {
        Some(expires) => {
            let days = flatten::days_between(expires, now);
            (Cell::Int(days), ExpiryStatus::from_days(days))
        }
        None => (Cell::from("Parse Error"), ExpiryStatus::Unknown),
    }
}

pub fn recommendation(expiry: ExpiryStatus, status: &str) -> String {
    match expiry {
        ExpiryStatus::Expired => "Certificate expired - immediate renewal required".to_string(),
        ExpiryStatus::Within30Days => "Renew certificate immediately".to_string(),
        ExpiryStatus::Within60Days => "Plan certificate renewal".to_string(),
        _ if status != "ISSUED" => format!("Certificate status is {} - review required", status),
        _ => "No immediate action needed".to_string(),
    }
}

fn joined_or_none(item: &Value, path: &str, field: Option<&str>) -> String {
    let joined = match field {
        Some(f) => flatten::join_field(item, path, f, LIST_SEPARATOR),
        None => flatten::join_strings(item, path, LIST_SEPARATOR),
    };
    if joined.is_empty() {
        EMPTY_LIST.to_string()
    } else {
        joined
    }
}

/// Map one `describe-certificate` `Certificate` object to a row
pub fn map_certificate(cert: &Value, arn: &str, account: &str, now: DateTime<Utc>) -> Record {
    let status = flatten::text_or(cert, "Status", PLACEHOLDER);
    let (days, expiry_status) = expiry(flatten::lookup(cert, "NotAfter"), now);

    Record::for_account(account)
        .json_or("DomainName", cert, "DomainName", PLACEHOLDER)
        .with("Status", status.as_str())
        .with("ExpiryStatus", expiry_status.label())
        .with("DaysUntilExpiry", days)
        .json_or("NotAfter", cert, "NotAfter", PLACEHOLDER)
        .json_or("Type", cert, "Type", PLACEHOLDER)
        .with(
            "SubjectAlternativeNames",
            joined_or_none(cert, "SubjectAlternativeNames", None),
        )
        .json_or("KeyAlgorithm", cert, "KeyAlgorithm", PLACEHOLDER)
        .json_or("SignatureAlgorithm", cert, "SignatureAlgorithm", PLACEHOLDER)
        .json_or("RenewalEligibility", cert, "RenewalEligibility", PLACEHOLDER)
        .with("Recommendation", recommendation(expiry_status, &status))
        .with("CertificateArn", arn)
        .json_or("CreatedAt", cert, "CreatedAt", PLACEHOLDER)
        .json_or("IssuedAt", cert, "IssuedAt", PLACEHOLDER)
        .json_or("NotBefore", cert, "NotBefore", PLACEHOLDER)
        .with("KeyUsages", joined_or_none(cert, "KeyUsages", Some("Name")))
        .with(
            "ExtendedKeyUsages",
            joined_or_none(cert, "ExtendedKeyUsages", Some("Name")),
        )
}

/// Collect certificate rows for one profile
pub async fn collect<R: AwsRunner>(
    runner: &R,
    profile: &str,
    now: DateTime<Utc>,
    records: &mut Vec<Record>,
) {
    let list = AwsCall::new("acm", "list-certificates");
    let response = match call_json(runner, profile, &list).await {
        Ok(v) => v,
        Err(e) => return log_skip("ACM certificates", profile, &e),
    };

    let arns: Vec<String> = flatten::items(&response, "CertificateSummaryList")
        .iter()
        .map(|c| flatten::text(c, "CertificateArn"))
        .filter(|a| !a.is_empty())
        .collect();

    if arns.is_empty() {
        tracing::info!("No ACM certificates found for {}", profile);
        return;
    }

    let mut found = 0;
    for arn in &arns {
        let describe = AwsCall::new("acm", "describe-certificate").arg("--certificate-arn", arn);
        match call_json(runner, profile, &describe).await {
            Ok(detail) => {
                let cert = detail.get("Certificate").cloned().unwrap_or(Value::Null);
                records.push(map_certificate(&cert, arn, profile, now));
                found += 1;
            }
            Err(e) => log_skip(&format!("details for certificate {}", arn), profile, &e),
        }
    }

    tracing::info!("ACM certificates for {}: {} certificates", profile, found);
}

fn is_expiring(cell: &Cell) -> bool {
    let text = cell.to_string();
    text.contains("Expires Soon") || text.contains("Expired")
}

pub fn build_report(records: &[Record]) -> Report {
    let certificates = Sheet::with_columns("ACM_Certificates", COLUMNS, records);

    let mut report = Report::new(FILE_PREFIX);
    report.push(certificates.count_by("Expiry_Summary", &["Account", "ExpiryStatus"], "Count"));
    report.push_if_not_empty(certificates.filter_by("Expiring_Soon", "ExpiryStatus", is_expiring));
    report.push(certificates.count_by("Status_Summary", &["Account", "Status"], "Count"));
    report.sheets.insert(0, certificates);
    report
}

pub async fn run<R: AwsRunner>(runner: &R, ctx: &RunContext) -> Result<Option<PathBuf>> {
    let now = ctx.now_utc();
    let mut records = Vec::new();

    for profile in &ctx.profiles {
        tracing::info!("Processing profile: {}", profile);
        collect(runner, profile, now, &mut records).await;
    }

    if records.is_empty() {
        summary::nothing_found("No ACM certificates found across any profiles.");
        return Ok(None);
    }

    let report = build_report(&records);
    let path = export(&report, ctx)?;
    print_summary(&report, &path);

    Ok(Some(path))
}

fn print_summary(report: &Report, path: &std::path::Path) {
    let Some(certificates) = report.sheet("ACM_Certificates") else {
        return;
    };

    summary::saved("ACM certificate inventory", path);
    summary::header("Summary");
    summary::line("Total certificates found", certificates.len());
    summary::counts("Certificate Status", &certificates.value_counts("Status"), "certificates");
    summary::counts("Expiry Status", &certificates.value_counts("ExpiryStatus"), "certificates");

    let attention = report.sheet("Expiring_Soon").map(Sheet::len).unwrap_or(0);
    if attention > 0 {
        summary::attention(&format!("{} certificates need immediate attention!", attention));
    }
}
