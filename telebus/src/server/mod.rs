use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::context::SlaveContext;
use crate::decode::DecodeLevel;
use crate::tcp::server::ServerTask;

pub(crate) mod identity;
pub(crate) mod request;
pub(crate) mod response;
pub(crate) mod task;

pub use identity::ServerIdentity;

/// A handle to the running server task
///
/// Dropping the handle does not stop the server. Cancel the token passed to
/// [`spawn_tcp_server_task`] and then await [`ServerHandle::join`].
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener is bound to
    ///
    /// Useful when binding to port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the accept loop and all of its sessions to finish
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }
}

/// Spawns a TCP server task onto the runtime. This method can only
/// be called from within the runtime context.
///
/// Each incoming connection will spawn a new task to handle it. The listener is
/// bound before this function returns, so a bind failure is reported here.
///
/// * `max_sessions` - Maximum number of concurrent sessions
/// * `addr` - A socket address to bound to
/// * `context` - Register table served to every session
/// * `decode` - Decode log level
/// * `shutdown` - Stops the accept loop and every session when cancelled
pub async fn spawn_tcp_server_task(
    max_sessions: usize,
    addr: SocketAddr,
    context: Arc<SlaveContext>,
    decode: DecodeLevel,
    shutdown: CancellationToken,
) -> Result<ServerHandle, std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    let task = tokio::spawn(async move {
        ServerTask::new(max_sessions, listener, context, decode)
            .run(shutdown)
            .instrument(tracing::info_span!("Modbus-Server-TCP", "listen" = ?local_addr))
            .await
    });

    Ok(ServerHandle { local_addr, task })
}
