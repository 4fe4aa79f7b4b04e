use std::future::Future;
use std::sync::Arc;
use std::thread::JoinHandle;

use opcua::server::prelude::*;
use opcua::sync::RwLock;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::StartupError;

/// Build the sample server: anonymous, unsecured endpoint on the configured
/// port with the LADS application description.
pub fn build_server(config: &ServerConfig) -> Result<Server, StartupError> {
    tracing::info!(
        "Creating OPC UA server '{}' on {}:{}",
        config.application_name,
        config.host,
        config.port
    );

    let server = ServerBuilder::new_anonymous(config.application_name.clone())
        .application_uri(config.application_uri.clone())
        .product_uri(config.product_uri.clone())
        .discovery_urls(vec!["/".into()])
        .create_sample_keypair(true)
        .pki_dir(config.pki_dir.clone())
        .discovery_server_url(None)
        .host_and_port(config.host.clone(), config.port)
        .server()
        .ok_or_else(|| StartupError::Server("invalid server configuration".to_string()))?;

    apply_build_info(&mut server.address_space().write(), config);

    Ok(server)
}

fn apply_build_info(address_space: &mut AddressSpace, config: &ServerConfig) {
    let now = DateTime::now();
    let fields = [
        (
            VariableId::Server_ServerStatus_BuildInfo_ManufacturerName,
            config.manufacturer_name.as_str(),
        ),
        (
            VariableId::Server_ServerStatus_BuildInfo_ProductUri,
            config.product_uri.as_str(),
        ),
        (
            VariableId::Server_ServerStatus_BuildInfo_SoftwareVersion,
            config.software_version.as_str(),
        ),
    ];
    for (id, value) in fields {
        if !address_space.set_variable_value(id, UAString::from(value), &now, &now) {
            tracing::warn!("Build info node {:?} missing from address space", id);
        }
    }
}

/// Handle to a server running on its own thread.
pub struct ServerHandle {
    server: Arc<RwLock<Server>>,
    thread: JoinHandle<()>,
    exited: oneshot::Receiver<()>,
}

/// Run the server's request-processing cycle on a dedicated thread. The
/// server keeps its own runtime so it is independent of the sensor loop's.
pub fn spawn_server(server: Server) -> std::io::Result<ServerHandle> {
    let server = Arc::new(RwLock::new(server));
    let runner = server.clone();
    let (exited_tx, exited) = oneshot::channel();
    let thread = std::thread::Builder::new()
        .name("opcua-server".to_string())
        .spawn(move || {
            // a panic drops the sender, which the receiver also sees as an exit
            Server::run_server(runner);
            let _ = exited_tx.send(());
        })?;
    Ok(ServerHandle {
        server,
        thread,
        exited,
    })
}

/// Wait until either the host is cancelled or the server stops by itself.
///
/// A server that stops before cancellation never came up or died while
/// serving; the token is cancelled so the rest of the host winds down too.
pub async fn wait_for_shutdown<F>(token: &CancellationToken, server_exited: F) -> Result<(), StartupError>
where
    F: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Ok(()),
        _ = server_exited => {
            tracing::error!("OPC UA server stopped unexpectedly");
            token.cancel();
            Err(StartupError::Server("server stopped before shutdown was requested".to_string()))
        }
    }
}

impl ServerHandle {
    /// Resolves once the server thread has finished, for whatever reason.
    pub async fn exited(&mut self) {
        let _ = (&mut self.exited).await;
    }

    /// Stop the server and join its thread.
    pub async fn shutdown(self) {
        tracing::info!("Stopping OPC UA server");
        self.server.write().abort();

        match tokio::task::spawn_blocking(move || self.thread.join()).await {
            Ok(Ok(())) => tracing::info!("OPC UA server stopped"),
            Ok(Err(_)) => tracing::error!("OPC UA server thread panicked"),
            Err(e) => tracing::error!("Failed to join OPC UA server thread: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancellation_is_a_clean_shutdown() {
        let token = CancellationToken::new();
        let (_tx, rx) = oneshot::channel::<()>();
        token.cancel();

        let result = wait_for_shutdown(&token, async move {
            let _ = rx.await;
        })
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_early_server_exit_fails_and_cancels() {
        let token = CancellationToken::new();
        let (tx, rx) = oneshot::channel::<()>();
        tx.send(()).unwrap();

        let result = wait_for_shutdown(&token, async move {
            let _ = rx.await;
        })
        .await;
        assert!(matches!(result, Err(StartupError::Server(_))));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_panicked_server_thread_counts_as_exit() {
        let token = CancellationToken::new();
        let (tx, rx) = oneshot::channel::<()>();
        let thread = std::thread::spawn(move || {
            let _tx = tx;
            panic!("bind failed");
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            wait_for_shutdown(&token, async move {
                let _ = rx.await;
            }),
        )
        .await
        .unwrap();
        assert!(thread.join().is_err());
        assert!(result.is_err());
        assert!(token.is_cancelled());
    }
}
