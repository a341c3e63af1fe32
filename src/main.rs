//! sgproxy - A session-routing reverse proxy for subgrid simulation backends
//!
//! Usage:
//!     sgproxy [--config <path>] [flags]
//!
//! See --help for more options.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use sgproxy::config::{load_config, validate_config, AddressMode, Config};
use sgproxy::frontend::FrontendListener;
use sgproxy::metrics::{MetricsCollector, MetricsServer};
use sgproxy::proxy::Director;
use sgproxy::routing::{AddressSource, RouteResolver, WorkloadSource};
use sgproxy::session::SessionResolver;
use sgproxy::store::RedisStore;
use sgproxy::util::{init_logging, ShutdownSignal};

/// A session-routing reverse proxy for subgrid simulation backends.
#[derive(Parser, Debug)]
#[command(name = "sgproxy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Port this reverse proxy serves on (overrides config)
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Key-value store host (overrides config)
    #[arg(long, value_name = "HOST")]
    store_host: Option<String>,

    /// Key-value store port (overrides config)
    #[arg(long, value_name = "PORT")]
    store_port: Option<u16>,

    /// Run without a store: route everything to this subgrid id on localhost
    #[arg(long, value_name = "SUBGRID_ID")]
    single_server: Option<String>,

    /// Cache session keys per client address (development environments)
    #[arg(long)]
    use_cache: bool,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration (defaults when no file is given)
    let mut config = match &cli.config {
        Some(path) => load_config(path).with_context(|| {
            format!("failed to load configuration from '{}'", path.display())
        })?,
        None => Config::default(),
    };

    apply_overrides(&mut config, &cli);
    validate_config(&config)
        .map_err(|e| anyhow::anyhow!(e))
        .context("configuration validation failed")?;

    // Initialize logging
    init_logging(&config.global.log_level, &config.global.log_format);

    // If --validate flag, just validate and exit
    if cli.validate {
        info!("Configuration is valid");
        println!("Configuration is valid.");
        println!("  Listen: {}", config.listen);
        println!("  Address mode: {:?}", config.routing.address_mode);
        match &config.routing.single_server {
            Some(subgrid_id) => println!("  Single server: {}", subgrid_id),
            None => println!("  Store: {}", config.store.address()),
        }
        println!("  Session cache: {}", config.routing.use_session_cache);
        return Ok(());
    }

    // Log startup information
    info!(
        listen = %config.listen,
        address_mode = ?config.routing.address_mode,
        use_session_cache = config.routing.use_session_cache,
        "sgproxy starting"
    );

    if config.routing.needs_store() {
        info!(store = %config.store.address(), "using routing metadata from key-value store");
    }
    if let Some(subgrid_id) = &config.routing.single_server {
        info!(subgrid = %subgrid_id, "single server mode");
    }

    // Run the proxy
    run(config)
}

/// Apply CLI flag overrides on top of the loaded configuration.
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(port) = cli.port {
        config.listen.set_port(port);
    }
    if let Some(host) = &cli.store_host {
        config.store.host = host.clone();
    }
    if let Some(port) = cli.store_port {
        config.store.port = port;
    }
    if let Some(subgrid_id) = &cli.single_server {
        // The flag means "no store": fixed subgrid, localhost address table.
        config.routing.single_server = Some(subgrid_id.clone());
        config.routing.address_mode = AddressMode::Local;
    }
    if cli.use_cache {
        config.routing.use_session_cache = true;
    }
    if let Some(level) = &cli.log_level {
        config.global.log_level = level.clone();
    }
}

/// Run the proxy with the given configuration.
fn run(config: Config) -> Result<()> {
    // Create tokio runtime
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    runtime.block_on(async { run_async(config).await })
}

/// Async entry point for the proxy.
async fn run_async(config: Config) -> Result<()> {
    // Create shutdown channel
    let shutdown = ShutdownSignal::new();

    // Build the routing director
    let routes = build_route_resolver(&config).await?;
    let sessions = SessionResolver::new(config.routing.use_session_cache);
    let director = Arc::new(Director::new(sessions, routes));

    let metrics = MetricsCollector::new();

    // Start metrics server if enabled
    let mut handles = Vec::new();
    if config.global.metrics.enabled {
        let server = MetricsServer::new(
            config.global.metrics.address,
            config.global.metrics.path.clone(),
            metrics.clone(),
        );
        let shutdown_rx = shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            server.run(shutdown_rx).await;
        }));
    }

    // Start the frontend listener
    let listener = FrontendListener::bind(config.listen, director, metrics)
        .await
        .with_context(|| format!("failed to bind frontend on {}", config.listen))?;

    let shutdown_rx = shutdown.subscribe();
    handles.push(tokio::spawn(async move {
        listener.run(shutdown_rx).await;
    }));

    info!("sgproxy is running");
    info!("press Ctrl+C to stop");

    // Wait for Ctrl-C and fan the shutdown signal out
    shutdown.on_ctrl_c().await;

    // Wait for all tasks to finish
    for handle in handles {
        let _ = handle.await;
    }

    info!("sgproxy shut down complete");
    Ok(())
}

/// Assemble the route resolver for the configured deployment mode.
async fn build_route_resolver(config: &Config) -> Result<RouteResolver> {
    if !config.routing.needs_store() {
        let subgrid_id = config
            .routing
            .single_server
            .clone()
            .context("local address mode requires a single_server subgrid id")?;
        return Ok(RouteResolver::local(subgrid_id, config.routing.ports));
    }

    let store = RedisStore::connect(&config.store)
        .await
        .with_context(|| format!("failed to set up store pool for {}", config.store.address()))?;

    let workload = match &config.routing.single_server {
        Some(subgrid_id) => WorkloadSource::Fixed(subgrid_id.clone()),
        None => WorkloadSource::Lookup,
    };

    let address = match config.routing.address_mode {
        AddressMode::Composed => AddressSource::Composed {
            ports: config.routing.ports,
        },
        AddressMode::Direct => AddressSource::Direct,
        AddressMode::Local => bail!("local address mode does not use a store"),
    };

    Ok(RouteResolver::with_store(Arc::new(store), workload, address))
}
