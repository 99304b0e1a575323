//! EC2 instances, their attached EBS volumes, and reserved instances

use super::{export, log_skip, RunContext};
use crate::aws::{call_json, AwsCall, AwsRunner};
use crate::flatten::{self, LIST_SEPARATOR};
use crate::report::{summary, Cell, Record, Report, Sheet};
use anyhow::Result;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

pub const FILE_PREFIX: &str = "ec2_instance_and_reservations";
pub const INSTANCES_SHEET: &str = "EC2Instances";
pub const RESERVATIONS_SHEET: &str = "Reservations";

/// Tag keys copied into their own columns, in column order
const TAG_COLUMNS: &[&str] = &[
    "Application",
    "Application Owner",
    "Role",
    "Owner",
    "Environment",
    "Cost Centre",
    "Project",
];

/// Memory (GiB) of common instance types
#[rustfmt::skip]
const MEMORY_GIB: &[(&str, f64)] = &[
    // General purpose
    ("t2.nano", 0.5), ("t2.micro", 1.0), ("t2.small", 2.0), ("t2.medium", 4.0),
    ("t2.large", 8.0), ("t2.xlarge", 16.0), ("t2.2xlarge", 32.0),
    ("t3.nano", 0.5), ("t3.micro", 1.0), ("t3.small", 2.0), ("t3.medium", 4.0),
    ("t3.large", 8.0), ("t3.xlarge", 16.0), ("t3.2xlarge", 32.0),
    ("t3a.nano", 0.5), ("t3a.micro", 1.0), ("t3a.small", 2.0), ("t3a.medium", 4.0),
    ("t3a.large", 8.0), ("t3a.xlarge", 16.0), ("t3a.2xlarge", 32.0),
    ("m3.medium", 3.75), ("m3.large", 7.5), ("m3.xlarge", 15.0), ("m3.2xlarge", 30.0),
    ("m5.large", 8.0), ("m5.xlarge", 16.0), ("m5.2xlarge", 32.0), ("m5.4xlarge", 64.0),
    ("m5.8xlarge", 128.0), ("m5.12xlarge", 192.0), ("m5.16xlarge", 256.0), ("m5.24xlarge", 384.0),
    ("m5a.large", 8.0), ("m5a.xlarge", 16.0), ("m5a.2xlarge", 32.0), ("m5a.4xlarge", 64.0),
    ("m5a.8xlarge", 128.0), ("m5a.12xlarge", 192.0), ("m5a.16xlarge", 256.0), ("m5a.24xlarge", 384.0),
    ("m6i.large", 8.0), ("m6i.xlarge", 16.0), ("m6i.2xlarge", 32.0), ("m6i.4xlarge", 64.0),
    ("m6i.8xlarge", 128.0), ("m6i.12xlarge", 192.0), ("m6i.16xlarge", 256.0), ("m6i.24xlarge", 384.0),
    // Compute optimized
    ("c5.large", 4.0), ("c5.xlarge", 8.0), ("c5.2xlarge", 16.0), ("c5.4xlarge", 32.0),
    ("c5.9xlarge", 72.0), ("c5.12xlarge", 96.0), ("c5.18xlarge", 144.0), ("c5.24xlarge", 192.0),
    ("c5n.large", 5.25), ("c5n.xlarge", 10.5), ("c5n.2xlarge", 21.0), ("c5n.4xlarge", 42.0),
    ("c5n.9xlarge", 96.0), ("c5n.18xlarge", 192.0),
    // Memory optimized
    ("r4.xlarge", 30.5), ("r4.2xlarge", 61.0), ("r4.4xlarge", 122.0), ("r4.8xlarge", 244.0),
    ("r4.16xlarge", 488.0),
    ("r5.large", 16.0), ("r5.xlarge", 32.0), ("r5.2xlarge", 64.0), ("r5.4xlarge", 128.0),
    ("r5.8xlarge", 256.0), ("r5.12xlarge", 384.0), ("r5.16xlarge", 512.0), ("r5.24xlarge", 768.0),
    ("r5a.large", 16.0), ("r5a.xlarge", 32.0), ("r5a.2xlarge", 64.0), ("r5a.4xlarge", 128.0),
    ("r5a.8xlarge", 256.0), ("r5a.12xlarge", 384.0), ("r5a.16xlarge", 512.0), ("r5a.24xlarge", 768.0),
    ("r6i.large", 16.0), ("r6i.xlarge", 32.0), ("r6i.2xlarge", 64.0), ("r6i.4xlarge", 128.0),
    ("r6i.8xlarge", 256.0), ("r6i.12xlarge", 384.0), ("r6i.16xlarge", 512.0), ("r6i.24xlarge", 768.0),
    ("x1.16xlarge", 976.0), ("x1.32xlarge", 1952.0),
    ("x1e.xlarge", 122.0), ("x1e.2xlarge", 244.0), ("x1e.4xlarge", 488.0), ("x1e.8xlarge", 976.0),
    ("x1e.16xlarge", 1952.0), ("x1e.32xlarge", 3904.0),
    // Storage optimized
    ("i3.large", 15.25), ("i3.xlarge", 30.5), ("i3.2xlarge", 61.0), ("i3.4xlarge", 122.0),
    ("i3.8xlarge", 244.0), ("i3.16xlarge", 488.0),
    ("d2.xlarge", 30.5), ("d2.2xlarge", 61.0), ("d2.4xlarge", 122.0), ("d2.8xlarge", 244.0),
    // GPU
    ("p3.2xlarge", 61.0), ("p3.8xlarge", 244.0), ("p3.16xlarge", 488.0),
    ("g4dn.xlarge", 16.0), ("g4dn.2xlarge", 32.0), ("g4dn.4xlarge", 64.0), ("g4dn.8xlarge", 128.0),
    ("g4dn.12xlarge", 192.0), ("g4dn.16xlarge", 256.0),
];

/// Memory in GiB for a known instance type
pub fn instance_memory(instance_type: &str) -> Option<f64> {
    MEMORY_GIB
        .iter()
        .find(|(t, _)| *t == instance_type)
        .map(|(_, gib)| *gib)
}

/// An EBS volume attached to an instance
#[derive(Debug, Clone, PartialEq)]
pub struct AttachedVolume {
    pub device: String,
    pub volume_id: String,
    pub size_gib: i64,
    pub volume_type: String,
}

impl AttachedVolume {
    /// `device:volumeId:sizeGiB:type`
    pub fn describe(&self) -> String {
        format!(
            "{}:{}:{}GiB:{}",
            self.device, self.volume_id, self.size_gib, self.volume_type
        )
    }
}

/// Group a `describe-volumes` response by the instance of the first attachment
pub fn volumes_by_instance(response: &Value) -> HashMap<String, Vec<AttachedVolume>> {
    let mut by_instance: HashMap<String, Vec<AttachedVolume>> = HashMap::new();

    for volume in flatten::items(response, "Volumes") {
        let instance_id = flatten::text(volume, "Attachments.0.InstanceId");
        if instance_id.is_empty() {
            continue;
        }
        by_instance.entry(instance_id).or_default().push(AttachedVolume {
            device: flatten::text(volume, "Attachments.0.Device"),
            volume_id: flatten::text(volume, "VolumeId"),
            size_gib: flatten::lookup(volume, "Size").and_then(Value::as_i64).unwrap_or(0),
            volume_type: flatten::text(volume, "VolumeType"),
        });
    }

    by_instance
}

pub fn map_instance(instance: &Value, volumes: &[AttachedVolume], account: &str) -> Record {
    let tags = instance.get("Tags");
    let instance_type = flatten::text(instance, "InstanceType");

    let mut record = Record::for_account(account)
        .with("Name", flatten::name_tag(tags))
        .json("InstanceId", instance, "InstanceId")
        .json("InstanceType", instance, "InstanceType")
        .json("State", instance, "State.Name");
    for key in TAG_COLUMNS {
        let value = flatten::tag(tags, key);
        record = record.with(key, if value.is_empty() { Cell::Empty } else { value.into() });
    }

    let cores = flatten::lookup(instance, "CpuOptions.CoreCount").and_then(Value::as_i64);
    let threads = flatten::lookup(instance, "CpuOptions.ThreadsPerCore").and_then(Value::as_i64);
    let vcpu = match (cores, threads) {
        (Some(c), Some(t)) if c > 0 && t > 0 => Some(c * t),
        _ => None,
    };

    let ram = match instance_memory(&instance_type) {
        Some(gib) => Cell::from(gib),
        None => Cell::from("Unknown"),
    };

    let volume_types = volumes
        .iter()
        .map(|v| v.volume_type.as_str())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>();

    record
        .with("CoreCount", cores)
        .with("ThreadsPerCore", threads)
        .json("PrivateIp", instance, "PrivateIpAddress")
        .json("PublicIp", instance, "PublicIpAddress")
        .json("VpcId", instance, "VpcId")
        .json("SubnetId", instance, "SubnetId")
        .json("PlatformDetails", instance, "PlatformDetails")
        .with("vCPU", vcpu)
        .with("RAM_GB", ram)
        .with(
            "VolumeInfo",
            volumes
                .iter()
                .map(AttachedVolume::describe)
                .collect::<Vec<_>>()
                .join(LIST_SEPARATOR),
        )
        .with("TotalVolumeSizeGB", volumes.iter().map(|v| v.size_gib).sum::<i64>())
        .with(
            "VolumeTypes",
            volume_types.into_iter().collect::<Vec<_>>().join(LIST_SEPARATOR),
        )
}

pub fn map_reservation(ri: &Value, account: &str) -> Record {
    Record::new()
        .json("ReservationId", ri, "ReservedInstancesId")
        .json("InstanceType", ri, "InstanceType")
        .json("AvailabilityZone", ri, "AvailabilityZone")
        .json("State", ri, "State")
        .json("InstanceCount", ri, "InstanceCount")
        .json("Start", ri, "Start")
        .json("End", ri, "End")
        .json("Duration", ri, "Duration")
        .json("OfferingType", ri, "OfferingType")
        .json("InstancePlatform", ri, "ProductDescription")
        .json("Scope", ri, "Scope")
        .with("Account", account)
}

async fn attached_volumes<R: AwsRunner>(
    runner: &R,
    profile: &str,
    instance_ids: &[String],
) -> HashMap<String, Vec<AttachedVolume>> {
    if instance_ids.is_empty() {
        return HashMap::new();
    }

    let call = AwsCall::new("ec2", "describe-volumes").arg(
        "--filters",
        format!("Name=attachment.instance-id,Values={}", instance_ids.join(",")),
    );
    match call_json(runner, profile, &call).await {
        Ok(v) => volumes_by_instance(&v),
        Err(e) => {
            log_skip("volume data", profile, &e);
            HashMap::new()
        }
    }
}

pub async fn collect_instances<R: AwsRunner>(runner: &R, profile: &str, records: &mut Vec<Record>) {
    let call = AwsCall::new("ec2", "describe-instances");
    let response = match call_json(runner, profile, &call).await {
        Ok(v) => v,
        Err(e) => return log_skip("EC2 instances", profile, &e),
    };

    let instances: Vec<&Value> = flatten::items(&response, "Reservations")
        .iter()
        .flat_map(|r| flatten::items(r, "Instances"))
        .collect();

    let instance_ids: Vec<String> = instances
        .iter()
        .map(|i| flatten::text(i, "InstanceId"))
        .filter(|id| !id.is_empty())
        .collect();
    let volumes = attached_volumes(runner, profile, &instance_ids).await;

    for instance in instances {
        let id = flatten::text(instance, "InstanceId");
        let attached = volumes.get(&id).map(Vec::as_slice).unwrap_or(&[]);
        records.push(map_instance(instance, attached, profile));
    }

    tracing::info!("EC2 + volume details for {} added", profile);
}

pub async fn collect_reservations<R: AwsRunner>(runner: &R, profile: &str, records: &mut Vec<Record>) {
    let call = AwsCall::new("ec2", "describe-reserved-instances");
    let response = match call_json(runner, profile, &call).await {
        Ok(v) => v,
        Err(e) => return log_skip("reservation data", profile, &e),
    };

    records.extend(
        flatten::items(&response, "ReservedInstances")
            .iter()
            .map(|ri| map_reservation(ri, profile)),
    );
    tracing::info!("Reservation data for {} added", profile);
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

    summary::saved("EC2 instances and reservations", &path);
    summary::line("Instances", instances.len());
    summary::line("Reservations", reservations.len());

    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::fake::FakeAws;
    use serde_json::json;

    fn instance(id: &str, instance_type: &str) -> Value {
        json!({
            "InstanceId": id,
            "InstanceType": instance_type,
            "State": {"Name": "running"},
            "CpuOptions": {"CoreCount": 2, "ThreadsPerCore": 2},
            "PrivateIpAddress": "10.0.0.5",
            "Tags": [
                {"Key": "Name", "Value": "app-01"},
                {"Key": "Application Owner", "Value": "ops"}
            ]
        })
    }

    fn volumes() -> Value {
        json!({"Volumes": [
            {"VolumeId": "vol-2", "Size": 100, "VolumeType": "st1",
             "Attachments": [{"InstanceId": "i-1", "Device": "/dev/sdf"}]},
            {"VolumeId": "vol-1", "Size": 20, "VolumeType": "gp3",
             "Attachments": [{"InstanceId": "i-1", "Device": "/dev/xvda"}]},
            {"VolumeId": "vol-3", "Size": 8, "VolumeType": "gp3", "Attachments": []}
        ]})
    }

    #[test]
    fn test_instance_memory() {
        assert_eq!(instance_memory("t3.micro"), Some(1.0));
        assert_eq!(instance_memory("c5n.large"), Some(5.25));
        assert_eq!(instance_memory("z9.huge"), None);
    }

    #[test]
    fn test_volumes_by_instance() {
        let grouped = volumes_by_instance(&volumes());
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped["i-1"][0].describe(), "/dev/sdf:vol-2:100GiB:st1");
    }

    #[test]
    fn test_map_instance() {
        let grouped = volumes_by_instance(&volumes());
        let row = map_instance(&instance("i-1", "m5.large"), &grouped["i-1"], "shared");

        assert_eq!(row.columns().next(), Some("Account"));
        assert_eq!(row.text("Name"), "app-01");
        assert_eq!(row.text("State"), "running");
        assert_eq!(row.text("Application Owner"), "ops");
        assert_eq!(row.get("Role"), Some(&Cell::Empty));
        assert_eq!(row.get("vCPU"), Some(&Cell::Int(4)));
        assert_eq!(row.get("RAM_GB"), Some(&Cell::Number(8.0)));
        assert_eq!(row.get("TotalVolumeSizeGB"), Some(&Cell::Int(120)));
        assert_eq!(row.text("VolumeTypes"), "gp3, st1");
        assert_eq!(
            row.text("VolumeInfo"),
            "/dev/sdf:vol-2:100GiB:st1, /dev/xvda:vol-1:20GiB:gp3"
        );
    }

    #[test]
    fn test_map_instance_unknown_type_and_no_cpu_options() {
        let row = map_instance(&json!({"InstanceId": "i-9", "InstanceType": "z9.huge"}), &[], "int");
        assert_eq!(row.text("RAM_GB"), "Unknown");
        assert_eq!(row.get("vCPU"), Some(&Cell::Empty));
        assert_eq!(row.get("TotalVolumeSizeGB"), Some(&Cell::Int(0)));
        assert_eq!(row.text("VolumeInfo"), "");
    }

    #[tokio::test]
    async fn test_collect_instances_filters_volumes_by_instance() {
        let fake = FakeAws::new()
            .json(
                "ec2 describe-instances",
                json!({"Reservations": [
                    {"Instances": [instance("i-1", "t3.micro")]},
                    {"Instances": [instance("i-2", "t3.small")]}
                ]}),
            )
            .json("ec2 describe-volumes", volumes());

        let mut records = Vec::new();
        collect_instances(&fake, "shared", &mut records).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].text("VolumeInfo"), "");
        assert_eq!(
            fake.calls()[1],
            "shared|ec2 describe-volumes --filters Name=attachment.instance-id,Values=i-1,i-2"
        );
    }

    #[tokio::test]
    async fn test_collect_reservations() {
        let fake = FakeAws::new().json(
            "ec2 describe-reserved-instances",
            json!({"ReservedInstances": [{
                "ReservedInstancesId": "ri-1", "InstanceType": "m5.large",
                "InstanceCount": 2, "ProductDescription": "Linux/UNIX", "Scope": "Region"
            }]}),
        );

        let mut records = Vec::new();
        collect_reservations(&fake, "shared", &mut records).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text("InstancePlatform"), "Linux/UNIX");
        assert_eq!(records[0].columns().last(), Some("Account"));
    }
}
