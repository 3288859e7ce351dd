//! Stratus - deploys serverless services described by a manifest

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stratus::config::{Credentials, DeploySettings, PollSettings};
use stratus::image::DockerCli;
use stratus::info::Inspector;
use stratus::pipeline::{Collaborators, Pipeline};
use stratus::remove::remove_namespace;
use stratus::token::TokenIssuer;
use stratus::validate::validate;
use stratus_api::{ApiClient, ApiConfig};
use stratus_common::manifest::ServiceManifest;
use stratus_common::model::Kind;

/// Default filter when RUST_LOG is unset
const DEFAULT_LOG_FILTER: &str = "info,stratus=debug";

/// Stratus - reconcile a serverless service against the platform
#[derive(Parser, Debug)]
#[command(name = "stratus", version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or update the namespace, its functions, containers and triggers
    Deploy(DeployArgs),

    /// Delete the namespace and everything in it
    Remove(RemoveArgs),

    /// Print access tokens for the namespace and its private resources
    Token(TokenArgs),

    /// Check the manifest and credentials without calling the platform
    Validate(ServiceArgs),

    /// Show the namespace, its functions and containers with their endpoints
    Info(ServiceArgs),

    /// Print the log lines of one function or container, oldest first
    Logs(LogsArgs),
}

/// Arguments shared by every command
#[derive(Args, Debug)]
struct ServiceArgs {
    /// Directory holding serverless.yml
    #[arg(short = 'd', long, default_value = ".")]
    service_dir: PathBuf,

    /// API secret key
    #[arg(long, env = "SCW_SECRET_KEY", hide_env_values = true)]
    token: String,

    /// Project id; falls back to provider.scwProject
    #[arg(long, env = "SCW_DEFAULT_PROJECT_ID")]
    project: Option<String>,

    /// Region; falls back to provider.scwRegion, then fr-par
    #[arg(long, env = "SCW_REGION")]
    region: Option<String>,

    /// API scheme and host
    #[arg(long, env = "STRATUS_API_ROOT", hide = true)]
    api_root: Option<String>,
}

#[derive(Args, Debug)]
struct DeployArgs {
    #[command(flatten)]
    service: ServiceArgs,

    /// Prebuilt zip archive uploaded to every function
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Delete remote functions and containers missing from the manifest,
    /// overriding singleSource
    #[arg(long)]
    single_source: Option<bool>,

    /// Give up on any single wait after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Seconds between status polls while waiting for a rollout
    #[arg(long, default_value = "5")]
    deploy_poll_secs: u64,

    /// docker-compatible binary used to build container images
    #[arg(long, default_value = "docker")]
    docker: String,
}

#[derive(Args, Debug)]
struct RemoveArgs {
    #[command(flatten)]
    service: ServiceArgs,

    /// Give up waiting for the deletion after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Args, Debug)]
struct TokenArgs {
    #[command(flatten)]
    service: ServiceArgs,

    /// Token lifetime in days
    #[arg(long, default_value = "365")]
    expires_in_days: i64,
}

#[derive(Args, Debug)]
struct LogsArgs {
    #[command(flatten)]
    service: ServiceArgs,

    /// Function or container name
    #[arg(short = 'f', long = "function")]
    application: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Deploy(args) => run_deploy(args).await,
        Commands::Remove(args) => run_remove(args).await,
        Commands::Token(args) => run_token(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args).await,
        Commands::Logs(args) => run_logs(args).await,
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Manifest, resolved credentials and an API client for its namespace product
struct Service {
    manifest: ServiceManifest,
    credentials: Credentials,
    client: Arc<ApiClient>,
}

impl ServiceArgs {
    fn load(self) -> anyhow::Result<(ServiceManifest, Credentials)> {
        let manifest = ServiceManifest::load(&self.service_dir)?;
        let credentials = Credentials::resolve(self.token, self.project, self.region, &manifest);
        Ok((manifest, credentials))
    }

    fn connect(self) -> anyhow::Result<Service> {
        let api_root = self.api_root.clone();
        let (manifest, credentials) = self.load()?;

        // A service with functions lives in a functions namespace
        let product = if manifest.functions.is_empty() {
            Kind::Container
        } else {
            Kind::Function
        };
        let mut config = ApiConfig::new(
            &credentials.region,
            &credentials.token,
            &credentials.project_id,
            product,
        );
        if let Some(root) = api_root {
            config = config.with_api_root(root);
        }
        let client = Arc::new(ApiClient::new(&config)?);

        Ok(Service {
            manifest,
            credentials,
            client,
        })
    }
}

async fn run_deploy(args: DeployArgs) -> anyhow::Result<()> {
    let Service {
        manifest,
        credentials,
        client,
    } = args.service.connect()?;

    let mut polls = PollSettings::default();
    polls.deploy.interval = Duration::from_secs(args.deploy_poll_secs);
    if let Some(secs) = args.timeout_secs {
        polls = polls.with_timeout(Duration::from_secs(secs));
    }

    let images = DockerCli::new(&credentials.region, &credentials.token).with_binary(args.docker);
    let settings = DeploySettings {
        credentials,
        single_source: args.single_source,
        archive: args.archive,
        polls,
    };

    let report = Pipeline::new(
        Collaborators::from_client(client, Arc::new(images)),
        settings,
    )
    .deploy(&manifest)
    .await?;

    info!(
        namespace = %report.namespace.name,
        functions = report.functions.len(),
        containers = report.containers.len(),
        triggers = report.triggers.len(),
        orphans_removed = report.orphans_removed,
        "Deploy finished"
    );
    for function in &report.functions {
        println!("function {}: https://{}", function.name, function.domain_name);
    }
    for container in &report.containers {
        println!("container {}: https://{}", container.name, container.domain_name);
    }
    Ok(())
}

async fn run_remove(args: RemoveArgs) -> anyhow::Result<()> {
    let Service {
        manifest, client, ..
    } = args.service.connect()?;

    let mut policy = PollSettings::default().delete;
    if let Some(secs) = args.timeout_secs {
        policy = policy.with_timeout(Duration::from_secs(secs));
    }

    remove_namespace(client.as_ref(), &manifest.service, &policy).await?;
    println!("Namespace {} has been deleted", manifest.service);
    Ok(())
}

async fn run_token(args: TokenArgs) -> anyhow::Result<()> {
    let expires_in_days = args.expires_in_days;
    let Service {
        manifest, client, ..
    } = args.service.connect()?;

    let expires_at = chrono::Utc::now() + chrono::Duration::days(expires_in_days);
    let issuer = TokenIssuer::new(client.clone(), client.clone(), client.clone(), client);
    for issued in issuer.issue(&manifest.service, expires_at).await? {
        println!(
            "{} {} (valid until {}):\n{}\n",
            issued.scope,
            issued.name,
            issued.expires_at.to_rfc3339(),
            issued.token
        );
    }
    Ok(())
}

fn run_validate(args: ServiceArgs) -> anyhow::Result<()> {
    let (manifest, credentials) = args.load()?;
    validate(&manifest, &credentials)?;
    println!("Service {} is valid", manifest.service);
    Ok(())
}

fn inspector(client: Arc<ApiClient>) -> Inspector {
    Inspector::new(client.clone(), client.clone(), client.clone(), client)
}

async fn run_info(args: ServiceArgs) -> anyhow::Result<()> {
    let Service {
        manifest, client, ..
    } = args.connect()?;

    let info = inspector(client).info(&manifest.service).await?;
    println!(
        "namespace {} ({}): {}",
        info.namespace.name, info.namespace.id, info.namespace.status
    );
    for resource in &info.resources {
        println!(
            "{} {}: {} https://{}",
            resource.kind, resource.name, resource.status, resource.endpoint
        );
        if let Some(message) = &resource.error_message {
            println!("  error: {message}");
        }
    }
    Ok(())
}

async fn run_logs(args: LogsArgs) -> anyhow::Result<()> {
    let application = args.application;
    let Service {
        manifest, client, ..
    } = args.service.connect()?;

    for line in inspector(client).logs(&manifest.service, &application).await? {
        println!("{}", line.message);
    }
    Ok(())
}
