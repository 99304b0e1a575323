use anyhow::{Context, Result};
use aws_inventory::advisor::{self, ExclusionRequest, StdinPrompt};
use aws_inventory::aws::AwsCli;
use aws_inventory::config::{self, Config};
use aws_inventory::inventory::{self, Kind, RunContext};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Version injected at compile time via AWS_INVENTORY_VERSION (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("AWS_INVENTORY_VERSION") {
    Some(v) => v,
    None => "dev",
};

/// Multi-account AWS inventory reports
#[derive(Parser, Debug)]
#[command(name = "aws-inventory", version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(ClapArgs, Debug)]
struct GlobalArgs {
    /// AWS profile to use (repeatable). Overrides the profiles file.
    #[arg(short, long = "profile", global = true)]
    profiles: Vec<String>,

    /// Sidecar file listing profiles (JSON or YAML)
    #[arg(long, global = true, default_value = config::PROFILES_FILE)]
    profiles_file: PathBuf,

    /// AWS region passed to every call
    #[arg(long, global = true)]
    region: Option<String>,

    /// Directory the workbook is written to
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Keep TLS certificate verification on
    #[arg(long, global = true)]
    verify_ssl: bool,

    /// AWS CLI binary to run
    #[arg(long, global = true)]
    aws_binary: Option<String>,

    /// Log level
    #[arg(long, value_enum, global = true, default_value = "info")]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// ACM certificates with expiry analysis
    Acm,
    /// Self-owned AMIs
    Ami,
    /// CloudFront distributions
    Cloudfront,
    /// DynamoDB tables
    Dynamodb,
    /// EC2 instances, attached volumes and reservations
    Ec2,
    /// Lambda functions with last invocation and inactivity
    Lambda,
    /// Application, network, gateway and classic load balancers
    LoadBalancers,
    /// RDS instances and reservations
    Rds,
    /// Route53 hosted zones, records and health checks
    Route53,
    /// SageMaker notebooks, endpoints, models and training jobs
    Sagemaker,
    /// WorkSpaces with usage analysis
    Workspaces,
    /// Build (but do not run) a Trusted Advisor resource exclusion command
    TaExclusion(TaExclusionArgs),
}

#[derive(ClapArgs, Debug)]
struct TaExclusionArgs {
    /// Substring of the recommendation name
    #[arg(long)]
    check_keyword: Option<String>,

    /// Substring of the resource id or ARN to exclude
    #[arg(long, conflicts_with = "all")]
    resource_match: Option<String>,

    /// Exclude every resource of the recommendation
    #[arg(long)]
    all: bool,
}

impl Command {
    fn kind(&self) -> Option<Kind> {
        Some(match self {
            Command::Acm => Kind::Acm,
            Command::Ami => Kind::Ami,
            Command::Cloudfront => Kind::CloudFront,
            Command::Dynamodb => Kind::DynamoDb,
            Command::Ec2 => Kind::Ec2,
            Command::Lambda => Kind::Lambda,
            Command::LoadBalancers => Kind::LoadBalancer,
            Command::Rds => Kind::Rds,
            Command::Route53 => Kind::Route53,
            Command::Sagemaker => Kind::SageMaker,
            Command::Workspaces => Kind::WorkSpaces,
            Command::TaExclusion(_) => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::new(level.as_directive());

    let Some(log_path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
        return Ok(None);
    };

    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("aws-inventory {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

async fn run_advisor(global: &GlobalArgs, config: &Config, args: TaExclusionArgs) -> Result<()> {
    if global.profiles.len() > 1 {
        tracing::warn!("ta-exclusion uses a single profile, ignoring all but {}", global.profiles[0]);
    }

    let region = config
        .effective_region(global.region.as_deref())
        .unwrap_or_else(|| advisor::DEFAULT_REGION.to_string());

    let runner = AwsCli::new(&config.effective_binary(global.aws_binary.as_deref()))
        .with_region(Some(region.clone()))
        .with_verify_ssl(global.verify_ssl || config.verify_ssl);

    let request = ExclusionRequest {
        profile: global.profiles.first().cloned(),
        check_keyword: args.check_keyword,
        resource_match: args.resource_match,
        all: args.all,
        region,
    };

    let result = advisor::build(&runner, &mut StdinPrompt, request).await?;
    advisor::print(&result);
    Ok(())
}

async fn run_inventory(global: &GlobalArgs, config: &Config, kind: Kind) -> Result<()> {
    let profiles = config::resolve_profiles(
        &global.profiles,
        &global.profiles_file,
        config,
        kind.default_profiles(),
    );

    let runner = AwsCli::new(&config.effective_binary(global.aws_binary.as_deref()))
        .with_region(config.effective_region(global.region.as_deref()))
        .with_verify_ssl(global.verify_ssl || config.verify_ssl);

    let ctx = RunContext::new(profiles, config.effective_output_dir(global.output_dir.as_deref()));

    if inventory::run(kind, &runner, &ctx).await?.is_none() {
        tracing::info!("No workbook written");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = setup_logging(args.global.log_level, args.global.log_file.as_deref())?;
    let config = Config::load();

    match args.command.kind() {
        Some(kind) => run_inventory(&args.global, &config, kind).await,
        None => match args.command {
            Command::TaExclusion(ta) => run_advisor(&args.global, &config, ta).await,
            _ => Ok(()),
        },
    }
}
