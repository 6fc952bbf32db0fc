// Main binary that starts the boot service
use bootward_server::config::DEFAULT_CONFIG_PATH;
use bootward_server::metrics::PrometheusMetrics;
use bootward_server::{Config, Directory, KubeDirectory, MemoryDirectory};
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, WrapErr};
use std::io::stderr;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Bootward network-boot service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output - shows more detailed logs
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, env = "LOG_FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve iPXE and Ignition requests
    Serve(ServeArgs),
    /// Print the effective configuration and exit
    CheckConfig(ConfigArgs),
}

#[derive(Parser, Debug)]
struct ConfigArgs {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[derive(Parser, Debug)]
struct ServeArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Directory backend: `kube` or `memory:<fixture.yaml>`
    #[arg(long, default_value = "kube")]
    directory: DirectorySource,

    /// Override the listen address from the configuration file
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug)]
enum DirectorySource {
    Kube,
    Memory(PathBuf),
}

impl FromStr for DirectorySource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "kube" => Ok(DirectorySource::Kube),
            _ => match s.strip_prefix("memory:") {
                Some(path) if !path.is_empty() => Ok(DirectorySource::Memory(PathBuf::from(path))),
                _ => Err(format!("expected `kube` or `memory:<file>`, got `{}`", s)),
            },
        }
    }
}

fn init_logging(verbose: bool, format: LogFormat) {
    let level = if verbose { "debug" } else { "info" };
    let default_directives = format!(
        "bootward={level},bootward_server={level},tower_http=warn,minijinja=warn,kube=warn,hyper=warn,rustls=warn,h2=warn,reqwest=warn",
        level = level
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    match format {
        LogFormat::Text => registry().with(filter).with(fmt::layer().with_writer(stderr)).init(),
        LogFormat::Json => registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(stderr))
            .init(),
    }
}

async fn connect(source: &DirectorySource) -> Result<Arc<dyn Directory>> {
    match source {
        DirectorySource::Kube => {
            let directory = KubeDirectory::connect()
                .await
                .wrap_err("Failed to connect to the Kubernetes API")?;
            Ok(Arc::new(directory))
        }
        DirectorySource::Memory(path) => {
            info!("Using in-memory directory from {}", path.display());
            let directory = MemoryDirectory::load(path)
                .wrap_err_with(|| format!("Failed to load directory fixture {}", path.display()))?;
            Ok(Arc::new(directory))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    match cli.command {
        Commands::CheckConfig(args) => {
            let config = Config::load(&args.config)?;
            print!("{}", config.to_yaml()?);
        }
        Commands::Serve(args) => {
            let mut config = Config::load(&args.config.config)?;
            if let Some(listen) = args.listen {
                config.listen_address = listen;
            }

            let metrics = Arc::new(PrometheusMetrics::new());
            let directory = connect(&args.directory).await?;
            bootward_server::run(config, directory, metrics)
                .await
                .wrap_err("Server failed to run")?;
        }
    }

    Ok(())
}
