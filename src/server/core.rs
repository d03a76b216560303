use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::client::{Client, ClientRegistry, handle_client};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::protocol::responses::{self, format_response};
use crate::sandbox::{PathSandbox, ReadOnly};
use crate::storage::FileOps;

pub struct Server {
    client_registry: Arc<Mutex<ClientRegistry>>,
    listener: TcpListener,
    ops: Arc<FileOps>,
    config: Arc<ServerConfig>,
}

impl Server {
    /// Builds the sandboxed file operations from `config` and binds the
    /// control socket.
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let root = config.sandbox_root_path();
        if let Err(e) = std::fs::create_dir_all(&root) {
            warn!("Failed to create sandbox root {}: {}", root.display(), e);
        }

        let sandbox = PathSandbox::new(&root)?;
        info!("Sandbox root: {}", sandbox.root().display());

        let mut ops = FileOps::new(sandbox, config.extension_filter()?)
            .with_max_upload_bytes(config.max_upload_bytes());
        if config.read_only {
            info!("Serving read-only");
            ops = ops.with_policy(ReadOnly);
        }

        Self::with_file_ops(config, ops).await
    }

    /// Binds the control socket around already built file operations.
    pub async fn with_file_ops(config: ServerConfig, ops: FileOps) -> Result<Self, ServerError> {
        let addr = config.control_socket();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!("Server bound to {}", listener.local_addr()?);

        Ok(Self {
            client_registry: Arc::new(Mutex::new(ClientRegistry::new(config.max_clients))),
            listener,
            ops: Arc::new(ops),
            config: Arc::new(config),
        })
    }

    /// Address the control socket is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn file_ops(&self) -> &Arc<FileOps> {
        &self.ops
    }

    pub async fn start(&self) {
        info!(
            "Starting fileroot server on {} (max {} clients)",
            self.config.control_socket(),
            self.config.max_clients
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let client_registry = Arc::clone(&self.client_registry);
                    let ops = Arc::clone(&self.ops);
                    let max_command_length = self.config.max_command_length;

                    // Spawn a task for each client so accept loop doesn't block
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_new_client(stream, addr, client_registry, ops, max_command_length)
                                .await
                        {
                            warn!("Failed to handle client {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

/// Registers a new client, greets it, and runs its session.
async fn handle_new_client(
    mut stream: TcpStream,
    client_addr: SocketAddr,
    client_registry: Arc<Mutex<ClientRegistry>>,
    ops: Arc<FileOps>,
    max_command_length: usize,
) -> Result<(), std::io::Error> {
    let mut clients = client_registry.lock().await;
    if !clients.try_insert(Client::new(client_addr)) {
        let limit = clients.max_clients();
        drop(clients);
        warn!("Refusing {}: {} clients connected", client_addr, limit);
        let reply = format_response(
            responses::SERVICE_UNAVAILABLE,
            "Too many connections. Try again later.",
        );
        stream.write_all(reply.as_bytes()).await?;
        return Ok(());
    }
    info!(
        "Accepted client: {} ({}/{} clients)",
        client_addr,
        clients.len(),
        clients.max_clients()
    );
    drop(clients);

    let greeting = format_response(responses::READY, "fileroot ready");
    if let Err(e) = stream.write_all(greeting.as_bytes()).await {
        client_registry.lock().await.remove(&client_addr);
        return Err(e);
    }
    stream.flush().await?;

    handle_client(stream, client_registry, client_addr, ops, max_command_length).await;
    Ok(())
}
