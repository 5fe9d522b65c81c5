//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use content_viewer_core::{Session, server};
use content_viewer_host::{BridgeHost, SnapshotHost};
use content_viewer_shared::{AppConfig, TransportKind, init_config, load_config, validate_config};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Content Viewer: inspect content collections and their inferred schema.
#[derive(Parser)]
#[command(
    name = "content-viewer",
    version,
    about = "Discover content collections, infer their schema, and serve them to an inspection panel.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Transport selectable on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum TransportArg {
    Stdio,
    Websocket,
}

impl From<TransportArg> for TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Stdio => Self::Stdio,
            TransportArg::Websocket => Self::Websocket,
        }
    }
}

/// Where collection data comes from.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct HostArgs {
    /// Project root (overrides `project.root`).
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Answer from a snapshot file instead of spawning the bridge.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Serve the panel protocol.
    Serve {
        #[command(flatten)]
        host: HostArgs,

        /// Transport (overrides `server.transport`).
        #[arg(long)]
        transport: Option<TransportArg>,

        /// WebSocket port (overrides `server.port`).
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the collection names as a collections-data payload.
    Collections {
        #[command(flatten)]
        host: HostArgs,
    },

    /// Print the entries and inferred schema of one collection.
    Entries {
        /// Collection name.
        collection: String,

        #[command(flatten)]
        host: HostArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Crates whose events the default filter lets through.
const LOG_TARGETS: [&str; 6] = [
    "content_viewer",
    "content_viewer_core",
    "content_viewer_discovery",
    "content_viewer_inference",
    "content_viewer_host",
    "content_viewer_shared",
];

fn default_filter(verbose: u8) -> String {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize tracing based on CLI flags. Logs always go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose)));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve {
            host,
            transport,
            port,
        } => cmd_serve(&host, transport, port).await,
        Command::Collections { host } => cmd_collections(&host).await,
        Command::Entries { collection, host } => cmd_entries(&collection, &host).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Host selection
// ---------------------------------------------------------------------------

/// The host a session runs against.
enum Host {
    Bridge(Arc<BridgeHost>),
    Snapshot(Arc<SnapshotHost>),
}

impl Host {
    async fn open(config: &AppConfig, args: &HostArgs) -> Result<Self> {
        if let Some(path) = &args.snapshot {
            return Ok(Self::Snapshot(Arc::new(SnapshotHost::load(path)?)));
        }

        let root = resolve_root(config, args)?;
        let bridge = BridgeHost::spawn(&config.bridge, &root).await?;
        Ok(Self::Bridge(Arc::new(bridge)))
    }

    fn session(&self) -> Session {
        match self {
            Self::Bridge(host) => Session::from_host(Arc::clone(host)),
            Self::Snapshot(host) => Session::from_host(Arc::clone(host)),
        }
    }

    async fn close(self) -> Result<()> {
        if let Self::Bridge(bridge) = self {
            bridge.shutdown().await?;
        }
        Ok(())
    }
}

fn resolve_root(config: &AppConfig, args: &HostArgs) -> Result<PathBuf> {
    let root = args
        .root
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.project.root));
    std::fs::canonicalize(&root)
        .map_err(|e| eyre!("project root '{}' is not accessible: {e}", root.display()))
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    Ok(spinner)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(args: &HostArgs, transport: Option<TransportArg>, port: Option<u16>) -> Result<()> {
    let mut config = load_config()?;
    if let Some(transport) = transport {
        config.server.transport = transport.into();
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    validate_config(&config)?;

    let host = Host::open(&config, args).await?;
    let session = host.session();

    let served = match config.server.transport {
        TransportKind::Stdio => {
            tokio::select! {
                result = server::serve_stdio(session) => result.map_err(color_eyre::eyre::Report::from),
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    Ok(())
                }
            }
        }
        TransportKind::Websocket => {
            let addr = tokio::net::lookup_host((config.server.host.as_str(), config.server.port))
                .await?
                .next()
                .ok_or_else(|| eyre!("cannot resolve {}:{}", config.server.host, config.server.port))?;
            eprintln!("Content Viewer listening on ws://{addr}");

            tokio::select! {
                result = server::serve_websocket(session, addr) => result.map_err(color_eyre::eyre::Report::from),
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    Ok(())
                }
            }
        }
    };

    if let Err(e) = host.close().await {
        warn!(error = %e, "host did not shut down cleanly");
    }
    served
}

async fn cmd_collections(args: &HostArgs) -> Result<()> {
    let config = load_config()?;
    let progress = spinner("Starting host")?;
    let host = Host::open(&config, args).await?;

    progress.set_message("Discovering collections");
    let data = host.session().get_collections().await;
    progress.finish_and_clear();
    host.close().await?;

    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

async fn cmd_entries(collection: &str, args: &HostArgs) -> Result<()> {
    let config = load_config()?;
    let progress = spinner("Starting host")?;
    let host = Host::open(&config, args).await?;

    progress.set_message(format!("Loading {collection}"));
    let data = host.session().get_collection_entries(collection).await;
    progress.finish_and_clear();
    host.close().await?;

    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
