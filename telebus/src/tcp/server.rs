use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::common::phys::PhysLayer;
use crate::context::SlaveContext;
use crate::decode::DecodeLevel;
use crate::server::task::SessionTask;

/// Bounds the number of concurrent sessions, closing the oldest one when exceeded
pub(crate) struct SessionTracker {
    max: usize,
    id: u64,
    sessions: BTreeMap<u64, CancellationToken>,
}

type SessionTrackerWrapper = Arc<Mutex<SessionTracker>>;

impl SessionTracker {
    pub(crate) fn new(max: usize) -> SessionTracker {
        Self {
            max,
            id: 0,
            sessions: BTreeMap::new(),
        }
    }

    fn get_next_id(&mut self) -> u64 {
        let ret = self.id;
        self.id += 1;
        ret
    }

    fn wrapped(max: usize) -> SessionTrackerWrapper {
        Arc::new(Mutex::new(Self::new(max)))
    }

    pub(crate) fn add(&mut self, token: CancellationToken) -> u64 {
        if self.sessions.len() >= self.max {
            if let Some((id, oldest)) = self.sessions.pop_first() {
                tracing::warn!("exceeded max connections, closing oldest session: {}", id);
                oldest.cancel();
            }
        }

        let id = self.get_next_id();
        self.sessions.insert(id, token);
        id
    }

    pub(crate) fn remove(&mut self, id: u64) {
        self.sessions.remove(&id);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.sessions.len()
    }
}

const ACCEPT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Accept loop of the TCP server
pub(crate) struct ServerTask {
    listener: TcpListener,
    context: Arc<SlaveContext>,
    tracker: SessionTrackerWrapper,
    sessions: TaskTracker,
    decode: DecodeLevel,
}

impl ServerTask {
    pub(crate) fn new(
        max_sessions: usize,
        listener: TcpListener,
        context: Arc<SlaveContext>,
        decode: DecodeLevel,
    ) -> Self {
        Self {
            listener,
            context,
            tracker: SessionTracker::wrapped(max_sessions),
            sessions: TaskTracker::new(),
            decode,
        }
    }

    pub(crate) async fn run(&mut self, shutdown: CancellationToken) {
        let sessions = shutdown.child_token();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("server shutdown");
                    break;
                }
                result = self.listener.accept() => {
                    match result {
                        Err(err) => {
                            if !accept_failed(err, &shutdown).await {
                                tracing::info!("server shutdown");
                                break;
                            }
                        }
                        Ok((socket, addr)) => {
                            self.handle(socket, addr, &sessions);
                        }
                    }
                }
            }
        }

        // sessions finish the request in progress before observing this
        sessions.cancel();
        self.sessions.close();
        self.sessions.wait().await;
        tracing::info!("all sessions closed");
    }

    fn handle(&self, socket: TcpStream, addr: SocketAddr, shutdown: &CancellationToken) {
        let token = shutdown.child_token();
        let id = self
            .tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(token.clone());

        tracing::info!("accepted connection {} from: {}", id, addr);

        let phys = PhysLayer::new_tcp(socket);
        let context = self.context.clone();
        let tracker = self.tracker.clone();
        let decode = self.decode;

        self.sessions.spawn(
            async move {
                let result = SessionTask::new(phys, context, decode, token).run().await;
                tracing::info!("session shutdown ({})", result);
                tracker
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(id);
            }
            .instrument(tracing::info_span!("Session", "id" = id, "remote" = ?addr)),
        );
    }
}

/// Backs off after a failed accept such as running out of file descriptors.
/// Returns false if the server is shut down while waiting.
async fn accept_failed(err: std::io::Error, shutdown: &CancellationToken) -> bool {
    tracing::error!("error accepting connection: {}", err);
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(ACCEPT_RETRY_DELAY) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn too_many_open_files() -> std::io::Error {
        std::io::Error::other("too many open files")
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_accepting_after_accept_error() {
        let shutdown = CancellationToken::new();
        let start = tokio::time::Instant::now();
        assert!(accept_failed(too_many_open_files(), &shutdown).await);
        assert!(start.elapsed() >= ACCEPT_RETRY_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_retrying_accept_on_shutdown() {
        let shutdown = CancellationToken::new();
        let canceller = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });
        assert!(!accept_failed(too_many_open_files(), &shutdown).await);
    }

    #[test]
    fn closes_oldest_session_when_full() {
        let mut tracker = SessionTracker::new(2);
        let first = CancellationToken::new();
        let second = CancellationToken::new();
        let third = CancellationToken::new();

        assert_eq!(tracker.add(first.clone()), 0);
        assert_eq!(tracker.add(second.clone()), 1);
        assert_eq!(tracker.add(third.clone()), 2);

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!third.is_cancelled());
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn removed_sessions_free_a_slot() {
        let mut tracker = SessionTracker::new(1);
        let first = CancellationToken::new();
        let id = tracker.add(first.clone());
        tracker.remove(id);
        tracker.add(CancellationToken::new());
        assert!(!first.is_cancelled());
    }
}
