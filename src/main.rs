// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::path::Path;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{debug, error, info, info_span};
use upwatch::{
    cli::{BackendArgs, Cli, Command, ReplayArgs, ServeArgs},
    reconciler::Reconciler,
    registry::MonitorRegistry,
    server::{self, AppState},
    watch::{replay, run_ingress_watch},
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "upwatch", &mut std::io::stdout());
        return Ok(());
    }

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("upwatch-operator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    init_logging();

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Replay(args) => run_replay(args).await,
        Command::Completions { .. } => Ok(()),
    }
}

/// Initialize logging.
///
/// Respects `RUST_LOG` for filtering (default `info`) and `RUST_LOG_FORMAT`
/// for output (`json` or `text`).
fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

/// Build the registry and load it from the backend. Failing here is fatal.
async fn initialized_registry(args: &BackendArgs) -> Result<Arc<MonitorRegistry>> {
    let config = args.validate()?;
    if args.dry_run {
        info!("Dry run: monitors are kept in memory only");
    }

    let backend = config.build_backend()?;
    let registry = Arc::new(MonitorRegistry::new(backend, config.registry_config()));
    registry
        .initialize()
        .await
        .context("Failed to initialize monitor registry")?;
    Ok(registry)
}

async fn kube_client(kubeconfig: Option<&Path>) -> Result<Client> {
    let Some(path) = kubeconfig else {
        return Ok(Client::try_default().await?);
    };

    debug!(path = %path.display(), "Loading kubeconfig");
    let kubeconfig = Kubeconfig::read_from(path)
        .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
    let config =
        kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
    Ok(Client::try_from(config)?)
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    info!("Starting Upwatch operator");

    let registry = initialized_registry(&args.backend).await?;

    // Serve metrics and probes while the watch starts up
    let state = AppState::new(Arc::clone(&registry));
    let server = tokio::spawn(server::serve(args.metrics_addr, state));

    debug!("Initializing Kubernetes client");
    let client = kube_client(args.kubeconfig.as_deref()).await?;
    let reconciler = Reconciler::new(Arc::clone(&registry), info_span!("reconciler"));

    tokio::select! {
        result = run_ingress_watch(client, args.namespace.as_deref(), reconciler) => {
            error!("CRITICAL: Ingress watch exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Ingress watch exited unexpectedly without error")
        }
        result = server => {
            error!("CRITICAL: Metrics server exited unexpectedly: {:?}", result);
            result??;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        result = shutdown_signal() => {
            result?;
            info!("Shutdown signal received, stopping");
            Ok(())
        }
    }
}

async fn run_replay(args: ReplayArgs) -> Result<()> {
    let registry = initialized_registry(&args.backend).await?;
    let reconciler = Reconciler::new(Arc::clone(&registry), info_span!("replay"));

    let summary = if args.file == "-" {
        replay(BufReader::new(tokio::io::stdin()), &reconciler).await?
    } else {
        let file = tokio::fs::File::open(&args.file)
            .await
            .with_context(|| format!("Failed to open {}", args.file))?;
        replay(BufReader::new(file), &reconciler).await?
    };

    info!(
        events = summary.events,
        notifications = summary.notifications,
        malformed = summary.malformed,
        monitors = registry.len(),
        "Replay finished"
    );

    let mut monitors: Vec<_> = registry.snapshot().into_values().collect();
    monitors.sort_by(|a, b| a.hostname.cmp(&b.hostname));
    for monitor in monitors {
        info!(
            hostname = %monitor.hostname,
            monitor_id = %monitor.id,
            name = %monitor.name,
            "Monitor"
        );
    }
    Ok(())
}

/// Resolve on Ctrl+C, or on SIGTERM on Unix platforms.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}
