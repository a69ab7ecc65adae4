use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use skylift::aws::apigateway::ApiGatewayClient;
use skylift::aws::auth::{self, AwsCredentials};
use skylift::aws::client::AwsClient;
use skylift::aws::iam::IamClient;
use skylift::aws::lambda::LambdaClient;
use skylift::aws::s3::S3Client;
use skylift::config::DeployConfig;
use skylift::provision::Deployer;
use skylift::VERSION;
use std::path::PathBuf;
use tracing::Level;

/// Deploy serverless functions to AWS
#[derive(Parser, Debug)]
#[command(name = "skylift", version = VERSION, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Provision role, bucket, artifact, function, and optional API per entry
    Install(DeployArgs),
    /// Republish the artifact and swap function code only
    Update(DeployArgs),
}

#[derive(ClapArgs, Debug)]
struct DeployArgs {
    /// Stage to deploy (a key under `stages:` in the stage file)
    #[arg(short, long)]
    stage: String,

    /// Path to the stage file
    #[arg(short, long, default_value = "stages.yaml")]
    config: PathBuf,

    /// Path to the packaged code artifact
    #[arg(short, long)]
    artifact: PathBuf,

    /// Override the region of every entry in the stage
    #[arg(long)]
    region: Option<String>,

    /// Validate the stage and artifact, print the plan, issue no remote calls
    #[arg(long)]
    dry_run: bool,
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
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking)
        .with_target(false)
        .without_time()
        .init();

    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = setup_logging(cli.log_level);

    match cli.command {
        Command::Install(args) => run(Mode::Install, args).await,
        Command::Update(args) => run(Mode::Update, args).await,
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Install,
    Update,
}

async fn run(mode: Mode, args: DeployArgs) -> Result<()> {
    let config = DeployConfig::load(&args.config)?;
    let mut entries = config
        .stage(&args.stage)
        .with_context(|| format!("Stage '{}' not found in {}", args.stage, args.config.display()))?
        .to_vec();

    if entries.is_empty() {
        bail!("Stage '{}' has no entries", args.stage);
    }

    if let Some(region) = &args.region {
        for entry in &mut entries {
            entry.region = region.clone();
        }
    }

    // Entries without a region fall back to the ambient default
    if entries.iter().any(|entry| entry.region.is_empty()) {
        let ambient = auth::default_region().with_context(|| {
            format!(
                "Stage '{}' has entries without a region and no default region is configured \
                 (set AWS_REGION or a region in ~/.aws/config)",
                args.stage
            )
        })?;
        for entry in &mut entries {
            if entry.region.is_empty() {
                entry.region = ambient.clone();
            }
        }
    }

    // Reject bad configuration before touching credentials or the network
    for entry in &entries {
        entry.validate()?;
    }

    if !args.artifact.is_file() {
        bail!("Artifact {} does not exist", args.artifact.display());
    }

    if args.dry_run {
        let verb = match mode {
            Mode::Install => "install",
            Mode::Update => "update code of",
        };
        for entry in &entries {
            tracing::info!(
                "would {} {} in {} (bucket {}, key {}{})",
                verb,
                entry.function_name,
                entry.region,
                entry.bucket,
                entry.object_key,
                entry
                    .api_gateway
                    .as_ref()
                    .map(|gw| format!(", api {}", gw.name))
                    .unwrap_or_default()
            );
        }
        return Ok(());
    }

    let credentials = AwsCredentials::resolve().context("Failed to resolve AWS credentials")?;
    let aws = AwsClient::new(credentials)?;

    let deployer = Deployer {
        storage: S3Client::new(aws.clone()),
        identity: IamClient::new(aws.clone()),
        compute: LambdaClient::new(aws.clone()),
        gateway: ApiGatewayClient::new(aws),
    };

    match mode {
        Mode::Install => {
            deployer
                .install(&args.stage, &entries, &args.artifact)
                .await?
        }
        Mode::Update => {
            deployer
                .update(&args.stage, &entries, &args.artifact)
                .await?
        }
    }

    Ok(())
}
