//! AMI inventory (images owned by each account)

use super::{export, log_skip, RunContext};
use crate::aws::{call_json, AwsCall, AwsRunner};
use crate::flatten::{self, LIST_SEPARATOR};
use crate::report::{summary, Record, Report, Sheet};
use anyhow::Result;
use serde_json::Value;
use std::path::PathBuf;

pub const FILE_PREFIX: &str = "ami_inventory";
pub const SHEET_NAME: &str = "AMI_Inventory";

/// Scalar image fields copied as-is
const IMAGE_FIELDS: &[&str] = &[
    "ImageId",
    "Name",
    "Description",
    "Architecture",
    "State",
];

const PLATFORM_FIELDS: &[&str] = &[
    "OwnerId",
    "CreationDate",
    "Platform",
    "PlatformDetails",
    "VirtualizationType",
    "RootDeviceType",
    "RootDeviceName",
    "ImageType",
    "KernelId",
    "RamdiskId",
    "SriovNetSupport",
    "EnaSupport",
    "BootMode",
    "TpmSupport",
    "DeprecationTime",
];

/// (column, tag key)
const TAG_COLUMNS: &[(&str, &str)] = &[
    ("Environment", "Environment"),
    ("Application", "Application"),
    ("Owner", "Owner"),
    ("CostCentre", "Cost Centre"),
    ("Project", "Project"),
];

/// `device:sizeGB:type:Encrypted|Unencrypted` per EBS mapping, and the
/// snapshot ids behind them
pub fn block_devices(mappings: &[Value]) -> (String, String) {
    let mut devices = Vec::new();
    let mut snapshots = Vec::new();

    for mapping in mappings {
        let Some(ebs) = flatten::lookup(mapping, "Ebs") else {
            continue;
        };

        let encrypted = ebs.get("Encrypted").and_then(Value::as_bool).unwrap_or(false);
        devices.push(format!(
            "{}:{}GB:{}:{}",
            flatten::text(mapping, "DeviceName"),
            flatten::text(ebs, "VolumeSize"),
            flatten::text(ebs, "VolumeType"),
            if encrypted { "Encrypted" } else { "Unencrypted" }
        ));

        let snapshot = flatten::text(ebs, "SnapshotId");
        if !snapshot.is_empty() {
            snapshots.push(snapshot);
        }
    }

    (devices.join(LIST_SEPARATOR), snapshots.join(LIST_SEPARATOR))
}

pub fn map_image(image: &Value, account: &str) -> Record {
    let mut record = Record::new();

    for field in IMAGE_FIELDS {
        record = record.json_or(field, image, field, "");
    }
    record = record.with(
        "Public",
        image.get("Public").and_then(Value::as_bool).unwrap_or(false),
    );
    for field in PLATFORM_FIELDS {
        record = record.json_or(field, image, field, "");
    }

    let (devices, snapshots) = block_devices(flatten::items(image, "BlockDeviceMappings"));
    record = record
        .with("BlockDevices", devices)
        .with("SnapshotIds", snapshots);

    let tags = image.get("Tags");
    for (column, key) in TAG_COLUMNS {
        record = record.with(column, flatten::tag(tags, key));
    }

    record.with("Account", account)
}

pub async fn collect<R: AwsRunner>(runner: &R, profile: &str, records: &mut Vec<Record>) {
    let call = AwsCall::new("ec2", "describe-images").arg("--owners", "self");
    let response = match call_json(runner, profile, &call).await {
        Ok(v) => v,
        Err(e) => return log_skip("AMIs", profile, &e),
    };

    let images = flatten::items(&response, "Images");
    if images.is_empty() {
        tracing::info!("No AMIs found for {}", profile);
        return;
    }

    records.extend(images.iter().map(|i| map_image(i, profile)));
    tracing::info!("AMI details for {} added ({} AMIs)", profile, images.len());
}

pub async fn run<R: AwsRunner>(runner: &R, ctx: &RunContext) -> Result<Option<PathBuf>> {
    let mut records = Vec::new();
    for profile in &ctx.profiles {
        collect(runner, profile, &mut records).await;
    }

    if records.is_empty() {
        summary::nothing_found("No AMI data collected from any profiles.");
        return Ok(None);
    }

    let mut report = Report::new(FILE_PREFIX);
    report.push(Sheet::from_records(SHEET_NAME, &records));
    let path = export(&report, ctx)?;

    summary::saved("AMI inventory", &path);
    summary::line("Total AMIs found", records.len());

    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::fake::FakeAws;
    use crate::report::Cell;
    use serde_json::json;

    fn image() -> Value {
        json!({
            "ImageId": "ami-123",
            "Name": "golden-2026",
            "Architecture": "x86_64",
            "State": "available",
            "Public": false,
            "Platform": null,
            "BlockDeviceMappings": [
                {"DeviceName": "/dev/xvda", "Ebs": {"SnapshotId": "snap-1", "VolumeSize": 30, "VolumeType": "gp3", "Encrypted": true}},
                {"DeviceName": "/dev/sdb", "VirtualName": "ephemeral0"}
            ],
            "Tags": [{"Key": "Cost Centre", "Value": "CC-9"}, {"Key": "Environment", "Value": "prod"}]
        })
    }

    #[test]
    fn test_block_devices_skip_non_ebs() {
        let (devices, snapshots) = block_devices(flatten::items(&image(), "BlockDeviceMappings"));
        assert_eq!(devices, "/dev/xvda:30GB:gp3:Encrypted");
        assert_eq!(snapshots, "snap-1");
    }

    #[test]
    fn test_map_image_row() {
        let row = map_image(&image(), "shared");
        assert_eq!(row.text("ImageId"), "ami-123");
        assert_eq!(row.text("Platform"), "");
        assert_eq!(row.get("Public"), Some(&Cell::Bool(false)));
        assert_eq!(row.text("CostCentre"), "CC-9");
        assert_eq!(row.text("Environment"), "prod");
        assert_eq!(row.text("Owner"), "");
        assert_eq!(row.columns().last(), Some("Account"));
        assert_eq!(row.text("Account"), "shared");
    }

    #[tokio::test]
    async fn test_collect_reads_images() {
        let fake = FakeAws::new().json("ec2 describe-images", json!({"Images": [image(), image()]}));
        let mut records = Vec::new();
        collect(&fake, "shared", &mut records).await;
        assert_eq!(records.len(), 2);
        assert_eq!(fake.calls(), vec!["shared|ec2 describe-images --owners self"]);
    }
}
