mod config;
mod error;
mod opcua_server;
mod simulator;
mod sink;

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use config::{load_config, Cli, READER_NAMESPACE_URI};
use error::StartupError;
use opcua_server::{build_server, load_namespace, log_devices, spawn_server, wait_for_shutdown, AddressSpaceSink};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting LADS luminescence reader sample server");

    match run(cli).await {
        Ok(()) => {
            tracing::info!("Shutting down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Exiting with error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), StartupError> {
    let mut config = load_config(&cli.config)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;

    // Server and device model
    let server = build_server(&config.server)?;
    let address_space = server.address_space();
    let di = load_namespace(&mut address_space.write())?;
    log_devices(&address_space.read(), di);

    // Every node the host addresses is resolved before anything runs
    let token = CancellationToken::new();
    let sink = AddressSpaceSink::new(address_space);
    let worker = simulator::start(sink, READER_NAMESPACE_URI, &config.simulation, token.clone())?;

    let mut server = match spawn_server(server) {
        Ok(server) => server,
        Err(e) => {
            token.cancel();
            let _ = worker.await;
            return Err(StartupError::Server(e.to_string()));
        }
    };
    tracing::info!(
        "OPC UA server starting on opc.tcp://{}:{}/",
        config.server.host,
        config.server.port
    );

    tokio::spawn({
        let token = token.clone();
        async move {
            shutdown_signal().await;
            token.cancel();
        }
    });

    tracing::info!("CTRL+C to stop");
    let outcome = wait_for_shutdown(&token, server.exited()).await;

    // The worker must be gone before the server and its address space are torn down
    match worker.await {
        Ok(state) => tracing::debug!("Sensor loop joined in state {:?}", state),
        Err(e) => tracing::error!("Sensor loop task failed: {}", e),
    }

    server.shutdown().await;
    outcome
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received CTRL+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
