//! CloudFront distribution inventory

use super::{export, log_skip, RunContext};
use crate::aws::{call_json, AwsCall, AwsRunner};
use crate::flatten::{self, LIST_SEPARATOR};
use crate::report::{summary, Cell, Record, Report, Sheet};
use anyhow::Result;
use serde_json::Value;
use std::path::PathBuf;

pub const FILE_PREFIX: &str = "cloudfront_inventory";
pub const SHEET_NAME: &str = "CloudFront_Distributions";

/// Origin domains, distinct origin types and S3 origin domains
pub fn origins_info(origins: &[Value]) -> (String, String, String) {
    let mut domains = Vec::new();
    let mut types = Vec::new();
    let mut s3 = Vec::new();

    for origin in origins {
        let domain = flatten::text(origin, "DomainName");
        let kind = if flatten::lookup(origin, "S3OriginConfig").is_some() {
            s3.push(domain.clone());
            "S3"
        } else if flatten::lookup(origin, "CustomOriginConfig").is_some() {
            "Custom"
        } else {
            "Unknown"
        };
        domains.push(domain);
        types.push(kind);
    }

    (
        domains.join(LIST_SEPARATOR),
        flatten::join_distinct(types, LIST_SEPARATOR),
        s3.join(LIST_SEPARATOR),
    )
}

pub fn map_distribution(dist: &Value, tags: &Value, account: &str) -> Record {
    let tags = Some(tags);
    let (origin_domains, origin_types, s3_origins) = origins_info(flatten::items(dist, "Origins"));

    let logging_enabled = flatten::lookup(dist, "Logging.Enabled")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let logging_bucket = if logging_enabled {
        flatten::text(dist, "Logging.Bucket")
    } else {
        String::new()
    };

    Record::for_account(account)
        .json("DistributionId", dist, "Id")
        .with("Name", flatten::name_tag(tags))
        .json("DomainName", dist, "DomainName")
        .with("Aliases", flatten::join_strings(dist, "Aliases", LIST_SEPARATOR))
        .json("Status", dist, "Status")
        .json("Enabled", dist, "Enabled")
        .json_or("Comment", dist, "Comment", "")
        .json("PriceClass", dist, "PriceClass")
        .json("HttpVersion", dist, "HttpVersion")
        .json("IsIPV6Enabled", dist, "IsIPV6Enabled")
        .json_or("WebACLId", dist, "WebACLId", "")
        .json("LastModifiedTime", dist, "LastModifiedTime")
        .with("OriginDomains", origin_domains)
        .with("OriginTypes", origin_types)
        .with("S3Origins", s3_origins)
        .with("CacheBehaviorsCount", flatten::items(dist, "CacheBehaviors").len())
        .with("LoggingEnabled", logging_enabled)
        .with("LoggingBucket", logging_bucket)
        .with("CertificateSource", flatten::text(dist, "ViewerCertificate.CertificateSource"))
        .with("SSLSupportMethod", flatten::text(dist, "ViewerCertificate.SSLSupportMethod"))
        .with(
            "MinProtocolVersion",
            flatten::text(dist, "ViewerCertificate.MinimumProtocolVersion"),
        )
        .with(
            "GeoRestrictionType",
            flatten::text(dist, "Restrictions.GeoRestriction.RestrictionType"),
        )
        .with("Tags", flatten::tags_summary(tags))
        .json("ARN", dist, "ARN")
}

/// Tags of one distribution; failures yield no tags
async fn distribution_tags<R: AwsRunner>(runner: &R, profile: &str, arn: &str) -> Value {
    if arn.is_empty() {
        return Value::Null;
    }

    let call = AwsCall::new("cloudfront", "list-tags-for-resource").arg("--resource", arn);
    match call_json(runner, profile, &call).await {
        Ok(v) => flatten::items(&v, "Tags").to_vec().into(),
        Err(e) => {
            tracing::debug!("No tags for {}: {}", arn, e);
            Value::Null
        }
    }
}

pub async fn collect<R: AwsRunner>(runner: &R, profile: &str, records: &mut Vec<Record>) {
    tracing::info!("Checking CloudFront distributions for account: {}", profile);

    let call = AwsCall::new("cloudfront", "list-distributions");
    let response = match call_json(runner, profile, &call).await {
        Ok(v) => v,
        Err(e) => return log_skip("CloudFront data", profile, &e),
    };

    let distributions = flatten::items(&response, "DistributionList");
    if distributions.is_empty() {
        tracing::info!("No CloudFront distributions found for {}", profile);
        return;
    }
    tracing::info!("Found {} CloudFront distributions", distributions.len());

    for dist in distributions {
        let tags = distribution_tags(runner, profile, &flatten::text(dist, "ARN")).await;
        records.push(map_distribution(dist, &tags, profile));
    }
}

pub async fn run<R: AwsRunner>(runner: &R, ctx: &RunContext) -> Result<Option<PathBuf>> {
    let mut records = Vec::new();
    for profile in &ctx.profiles {
        collect(runner, profile, &mut records).await;
    }

    let mut report = Report::new(FILE_PREFIX);
    let sheet = Sheet::from_records(SHEET_NAME, &records);
    report.push(sheet.clone());
    let path = export(&report, ctx)?;

    if sheet.is_empty() {
        summary::nothing_found("No CloudFront distributions found across all accounts");
        return Ok(Some(path));
    }

    print_summary(&sheet, ctx.profiles.len(), &path);
    Ok(Some(path))
}

fn print_summary(sheet: &Sheet, profiles: usize, path: &std::path::Path) {
    let enabled = sheet
        .column_index("Enabled")
        .map(|idx| sheet.rows.iter().filter(|r| r[idx].as_bool()).count())
        .unwrap_or(0);

    let origin_types = Sheet::from_records(
        "OriginTypes",
        &sheet
            .rows
            .iter()
            .filter_map(|r| sheet.column_index("OriginTypes").map(|i| r[i].to_string()))
            .flat_map(|types| {
                types
                    .split(LIST_SEPARATOR)
                    .filter(|t| !t.is_empty())
                    .map(|t| Record::new().with("OriginType", Cell::from(t)))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>(),
    );

    summary::saved("CloudFront distributions", path);
    summary::header("Summary");
    summary::line("Total Distributions", sheet.len());
    summary::line("Enabled", enabled);
    summary::line("Disabled", sheet.len() - enabled);
    summary::line("Accounts processed", profiles);
    summary::counts("Distributions by account", &sheet.value_counts("Account"), "");
    summary::counts("Origin types", &origin_types.value_counts("OriginType"), "");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::fake::FakeAws;
    use serde_json::json;

    fn distribution() -> Value {
        json!({
            "Id": "E123",
            "ARN": "arn:aws:cloudfront::111:distribution/E123",
            "DomainName": "d1.cloudfront.net",
            "Status": "Deployed",
            "Enabled": true,
            "Aliases": {"Quantity": 1, "Items": ["cdn.example.com"]},
            "Origins": {"Quantity": 2, "Items": [
                {"DomainName": "bucket.s3.amazonaws.com", "S3OriginConfig": {"OriginAccessIdentity": ""}},
                {"DomainName": "api.example.com", "CustomOriginConfig": {"HTTPPort": 80}}
            ]},
            "CacheBehaviors": {"Quantity": 0},
            "Logging": {"Enabled": false, "Bucket": "logs.s3.amazonaws.com"},
            "ViewerCertificate": {"CertificateSource": "acm", "SSLSupportMethod": "sni-only", "MinimumProtocolVersion": "TLSv1.2_2021"},
            "Restrictions": {"GeoRestriction": {"RestrictionType": "none"}}
        })
    }

    #[test]
    fn test_origins_info() {
        let dist = distribution();
        let (domains, types, s3) = origins_info(flatten::items(&dist, "Origins"));
        assert_eq!(domains, "bucket.s3.amazonaws.com, api.example.com");
        assert_eq!(types, "Custom, S3");
        assert_eq!(s3, "bucket.s3.amazonaws.com");
    }

    #[test]
    fn test_map_distribution() {
        let tags = json!([{"Key": "Name", "Value": "web-cdn"}, {"Key": "team", "Value": "edge"}]);
        let row = map_distribution(&distribution(), &tags, "shared");
        assert_eq!(row.text("Name"), "web-cdn");
        assert_eq!(row.text("Aliases"), "cdn.example.com");
        assert_eq!(row.get("CacheBehaviorsCount"), Some(&Cell::Int(0)));
        assert_eq!(row.get("LoggingEnabled"), Some(&Cell::Bool(false)));
        assert_eq!(row.text("LoggingBucket"), "");
        assert_eq!(row.text("MinProtocolVersion"), "TLSv1.2_2021");
        assert_eq!(row.text("Tags"), "Name:web-cdn; team:edge");
    }

    #[tokio::test]
    async fn test_collect_fetches_tags_per_distribution() {
        let fake = FakeAws::new()
            .json(
                "cloudfront list-distributions",
                json!({"DistributionList": {"Quantity": 1, "Items": [distribution()]}}),
            )
            .json(
                "cloudfront list-tags-for-resource",
                json!({"Tags": {"Items": [{"Key": "Name", "Value": "cdn"}]}}),
            );

        let mut records = Vec::new();
        collect(&fake, "shared", &mut records).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text("Name"), "cdn");
        assert!(fake.calls()[1].contains("--resource arn:aws:cloudfront::111:distribution/E123"));
    }

    #[tokio::test]
    async fn test_collect_tolerates_tag_failure() {
        let fake = FakeAws::new().json(
            "cloudfront list-distributions",
            json!({"DistributionList": {"Items": [distribution()]}}),
        );

        let mut records = Vec::new();
        collect(&fake, "shared", &mut records).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text("Tags"), "");
    }
}
