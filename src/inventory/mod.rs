//! Per-service inventories
//!
//! Every inventory follows the same pipeline and shares nothing else:
//!
//! profiles → collector (AWS CLI calls) → row mapper → aggregator →
//! exporter (timestamped `.xlsx`) → console summary
//!
//! Collectors are best effort: a failed call is logged and the affected
//! resource or profile is skipped.
//!
//! - [`acm`] - Certificates and expiry analysis
//! - [`ami`] - Self-owned machine images
//! - [`cloudfront`] - CDN distributions
//! - [`dynamodb`] - Tables
//! - [`ec2`] - Instances, attached volumes and reservations
//! - [`lambda`] - Functions, last invocation and inactivity
//! - [`load_balancer`] - ALB/NLB/GWLB and classic load balancers
//! - [`rds`] - Database instances and reservations
//! - [`route53`] - Hosted zones, records and health checks
//! - [`sagemaker`] - Notebooks, endpoints, models and training jobs
//! - [`workspaces`] - Virtual desktops with usage analysis

pub mod acm;
pub mod ami;
pub mod cloudfront;
pub mod dynamodb;
pub mod ec2;
pub mod lambda;
pub mod load_balancer;
pub mod rds;
pub mod route53;
pub mod sagemaker;
pub mod workspaces;

use crate::aws::{format_cli_error, AwsCliError, AwsRunner};
use crate::report::{self, Report};
use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use std::path::PathBuf;

/// Organisation-wide account list used by the Lambda and RDS inventories
pub const ORGANISATION_PROFILES: &[&str] = &[
    "int",
    "shared",
    "dnaDev",
    "dnaProd",
    "poc",
    "sec",
    "lionDC",
    "sapDev",
    "sapProd",
    "hpMonitoring",
    "contactCentre",
    "contactCentreProd",
    "master",
    "genAI",
    "audit",
];

/// Inventory kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Acm,
    Ami,
    CloudFront,
    DynamoDb,
    Ec2,
    Lambda,
    LoadBalancer,
    Rds,
    Route53,
    SageMaker,
    WorkSpaces,
}

impl Kind {
    pub fn display_name(self) -> &'static str {
        match self {
            Kind::Acm => "ACM certificates",
            Kind::Ami => "AMIs",
            Kind::CloudFront => "CloudFront distributions",
            Kind::DynamoDb => "DynamoDB tables",
            Kind::Ec2 => "EC2 instances",
            Kind::Lambda => "Lambda functions",
            Kind::LoadBalancer => "Load balancers",
            Kind::Rds => "RDS instances",
            Kind::Route53 => "Route53 zones",
            Kind::SageMaker => "SageMaker resources",
            Kind::WorkSpaces => "WorkSpaces",
        }
    }

    /// Profiles used when neither the CLI nor a sidecar file names any
    pub fn default_profiles(self) -> &'static [&'static str] {
        match self {
            Kind::Acm => &["default"],
            Kind::Lambda | Kind::Rds => ORGANISATION_PROFILES,
            _ => &["shared"],
        }
    }
}

/// Inputs shared by every inventory run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub profiles: Vec<String>,
    pub output_dir: PathBuf,
    /// Generation time, used for the file name and all age arithmetic
    pub now: DateTime<Local>,
}

impl RunContext {
    pub fn new(profiles: Vec<String>, output_dir: PathBuf) -> Self {
        Self {
            profiles,
            output_dir,
            now: Local::now(),
        }
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        self.now.with_timezone(&Utc)
    }
}

/// Run one inventory end to end. Returns the written file, if any.
pub async fn run<R: AwsRunner>(kind: Kind, runner: &R, ctx: &RunContext) -> Result<Option<PathBuf>> {
    tracing::info!(
        "Starting {} inventory across {} profile(s)",
        kind.display_name(),
        ctx.profiles.len()
    );

    match kind {
        Kind::Acm => acm::run(runner, ctx).await,
        Kind::Ami => ami::run(runner, ctx).await,
        Kind::CloudFront => cloudfront::run(runner, ctx).await,
        Kind::DynamoDb => dynamodb::run(runner, ctx).await,
        Kind::Ec2 => ec2::run(runner, ctx).await,
        Kind::Lambda => lambda::run(runner, ctx).await,
        Kind::LoadBalancer => load_balancer::run(runner, ctx).await,
        Kind::Rds => rds::run(runner, ctx).await,
        Kind::Route53 => route53::run(runner, ctx).await,
        Kind::SageMaker => sagemaker::run(runner, ctx).await,
        Kind::WorkSpaces => workspaces::run(runner, ctx).await,
    }
}

/// Write a finished report into the run's output directory
pub(crate) fn export(report: &Report, ctx: &RunContext) -> Result<PathBuf> {
    report::write_xlsx(report, &ctx.output_dir, &ctx.now)
}

/// Log a failed call for a profile; the caller then skips that unit
pub(crate) fn log_skip(what: &str, profile: &str, error: &AwsCliError) {
    tracing::error!("Error retrieving {} for {}: {}", what, profile, format_cli_error(error));
    tracing::debug!("{}", error);
}
