//! Dual-transport server lifecycle.
//!
//! One process serves the same [`HelloService`] over a gRPC listener and an HTTP listener at the
//! same time. The lifecycle is:
//!
//! ```text
//! Created --run--> Running --(cancel | either loop ends)--> Draining --> Stopped
//! ```
//!
//! [`BoundServer::run`] races three outcomes: the external cancellation token, the gRPC loop
//! ending and the HTTP loop ending. Cancellation is a clean return. A loop that ends on its own,
//! with or without an error, is fatal for the whole server and is reported as a [`ServerError`]
//! naming that transport. Either way the other loop is then told to stop, given
//! `shutdown_timeout` to finish and aborted if it has not.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error as ThisError;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{self, AppState};
use crate::config::Config;
use crate::rpc::proto::hello_bridge_server::HelloBridgeServer;
use crate::rpc::HelloResolver;
use crate::service::HelloService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Rpc,
    Http,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Rpc => write!(f, "rpc"),
            Transport::Http => write!(f, "http"),
        }
    }
}

#[derive(ThisError, Debug)]
pub enum ServerError {
    #[error("failed to bind {transport} listener on {addr}: {source}")]
    Bind {
        transport: Transport,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{transport} server failed: {message}")]
    Serve { transport: Transport, message: String },

    #[error("{transport} server stopped unexpectedly")]
    Exited { transport: Transport },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Running,
    Draining,
    Stopped,
}

/// A configured server whose listeners are not bound yet.
pub struct DualTransportServer {
    config: Config,
    service: Arc<dyn HelloService>,
}

impl DualTransportServer {
    pub fn new(config: Config, service: Arc<dyn HelloService>) -> Self {
        Self { config, service }
    }

    /// Bind both listeners. Port `0` picks a free port; the chosen address is on the result.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let rpc_listener = bind_listener(Transport::Rpc, &self.config.rpc.host).await?;
        let http_listener = bind_listener(Transport::Http, &self.config.http.host).await?;

        let rpc_addr = local_addr(Transport::Rpc, &self.config.rpc.host, &rpc_listener)?;
        let http_addr = local_addr(Transport::Http, &self.config.http.host, &http_listener)?;

        let (state, _) = watch::channel(ServerState::Created);

        Ok(BoundServer {
            rpc_listener,
            http_listener,
            rpc_addr,
            http_addr,
            config: self.config,
            service: self.service,
            state,
        })
    }

    /// Bind, then run until cancelled or until either transport fails.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ServerError> {
        self.bind().await?.run(cancel).await
    }
}

async fn bind_listener(transport: Transport, addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
        transport,
        addr: addr.to_string(),
        source,
    })
}

fn local_addr(transport: Transport, addr: &str, listener: &TcpListener) -> Result<SocketAddr, ServerError> {
    listener.local_addr().map_err(|source| ServerError::Bind {
        transport,
        addr: addr.to_string(),
        source,
    })
}

/// A server with both listeners bound, ready to accept once [`run`](Self::run) is called.
pub struct BoundServer {
    rpc_listener: TcpListener,
    http_listener: TcpListener,
    rpc_addr: SocketAddr,
    http_addr: SocketAddr,
    config: Config,
    service: Arc<dyn HelloService>,
    state: watch::Sender<ServerState>,
}

impl BoundServer {
    pub fn rpc_addr(&self) -> SocketAddr {
        self.rpc_addr
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Observe lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    pub async fn run(self, cancel: CancellationToken) -> Result<(), ServerError> {
        // Both loops stop on `shutdown`; the guard fires it on every exit path, including a panic
        let shutdown = cancel.child_token();
        let _guard = shutdown.clone().drop_guard();

        let rpc = tokio::spawn(serve_rpc(
            self.rpc_listener,
            HelloResolver::new(self.service.clone()),
            self.config.rpc.max_message_size,
            shutdown.clone(),
        ));

        let router = api::build_router(AppState::new(self.service), self.config.http.max_body_size);
        let http = tokio::spawn(serve_http(self.http_listener, router, shutdown.clone()));

        self.state.send_replace(ServerState::Running);
        info!(rpc = %self.rpc_addr, http = %self.http_addr, "Server listening");

        supervise(&cancel, &shutdown, rpc, http, self.config.shutdown_timeout, &self.state).await
    }
}

async fn serve_rpc(
    listener: TcpListener,
    resolver: HelloResolver,
    max_message_size: usize,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let service = HelloBridgeServer::new(resolver)
        .max_decoding_message_size(max_message_size)
        .max_encoding_message_size(max_message_size);

    tonic::transport::Server::builder()
        .add_service(service)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown.cancelled_owned())
        .await
        .map_err(|e| ServerError::Serve {
            transport: Transport::Rpc,
            message: e.to_string(),
        })?;

    debug!("gRPC loop finished");
    Ok(())
}

async fn serve_http(listener: TcpListener, router: axum::Router, shutdown: CancellationToken) -> Result<(), ServerError> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| ServerError::Serve {
            transport: Transport::Http,
            message: e.to_string(),
        })?;

    debug!("HTTP loop finished");
    Ok(())
}

type LoopHandle = JoinHandle<Result<(), ServerError>>;

enum First {
    Cancelled,
    Rpc(Result<Result<(), ServerError>, JoinError>),
    Http(Result<Result<(), ServerError>, JoinError>),
}

/// Wait for the first of {cancel, rpc loop end, http loop end}, then stop and reap both loops.
pub(crate) async fn supervise(
    cancel: &CancellationToken,
    shutdown: &CancellationToken,
    mut rpc: LoopHandle,
    mut http: LoopHandle,
    grace: Duration,
    state: &watch::Sender<ServerState>,
) -> Result<(), ServerError> {
    let first = tokio::select! {
        // Loops finishing because of the cancellation must not be mistaken for failures
        biased;
        _ = cancel.cancelled() => First::Cancelled,
        res = &mut rpc => First::Rpc(res),
        res = &mut http => First::Http(res),
    };

    state.send_replace(ServerState::Draining);
    shutdown.cancel();

    let (outcome, remaining) = match first {
        First::Cancelled => {
            info!("Shutdown requested, stopping both transports");
            (Ok(()), vec![(Transport::Rpc, rpc), (Transport::Http, http)])
        }
        First::Rpc(res) => (Err(loop_failure(Transport::Rpc, res)), vec![(Transport::Http, http)]),
        First::Http(res) => (Err(loop_failure(Transport::Http, res)), vec![(Transport::Rpc, rpc)]),
    };

    if let Err(e) = &outcome {
        warn!(error = %e, "Transport terminated, stopping the server");
    }

    drain(remaining, grace).await;
    state.send_replace(ServerState::Stopped);
    info!("Server stopped");

    outcome
}

fn loop_failure(transport: Transport, result: Result<Result<(), ServerError>, JoinError>) -> ServerError {
    match result {
        Ok(Ok(())) => ServerError::Exited { transport },
        Ok(Err(e)) => e,
        Err(join) => ServerError::Serve {
            transport,
            message: join.to_string(),
        },
    }
}

async fn drain(loops: Vec<(Transport, LoopHandle)>, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;

    for (transport, mut handle) in loops {
        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(Ok(()))) => debug!(%transport, "Transport stopped"),
            Ok(Ok(Err(e))) => warn!(%transport, error = %e, "Transport failed while stopping"),
            Ok(Err(join)) => warn!(%transport, error = %join, "Transport task did not complete"),
            Err(_) => {
                warn!(%transport, ?grace, "Transport did not stop in time, aborting");
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::sync::oneshot;

    /// A loop that runs until told to stop.
    fn obedient(token: CancellationToken) -> LoopHandle {
        tokio::spawn(async move {
            token.cancelled().await;
            Ok(())
        })
    }

    struct Harness {
        cancel: CancellationToken,
        shutdown: CancellationToken,
        state: watch::Sender<ServerState>,
    }

    impl Harness {
        fn new() -> Self {
            let cancel = CancellationToken::new();
            let shutdown = cancel.child_token();
            let (state, _) = watch::channel(ServerState::Running);
            Self { cancel, shutdown, state }
        }
    }

    #[tokio::test]
    async fn test_cancel_returns_ok_and_stops_both_loops() {
        let h = Harness::new();
        let rpc = obedient(h.shutdown.clone());
        let http = obedient(h.shutdown.clone());
        let state = h.state.subscribe();

        let cancel = h.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let result = supervise(&h.cancel, &h.shutdown, rpc, http, Duration::from_secs(1), &h.state).await;

        assert!(result.is_ok());
        assert_eq!(*state.borrow(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_rpc_failure_is_reported_and_http_is_stopped() {
        let h = Harness::new();
        let rpc: LoopHandle = tokio::spawn(async {
            Err(ServerError::Serve {
                transport: Transport::Rpc,
                message: "accept failed".to_string(),
            })
        });

        let http_token = h.shutdown.clone();
        let (stopped_tx, stopped_rx) = oneshot::channel();
        let http: LoopHandle = tokio::spawn(async move {
            http_token.cancelled().await;
            let _ = stopped_tx.send(());
            Ok(())
        });

        let err = supervise(&h.cancel, &h.shutdown, rpc, http, Duration::from_secs(1), &h.state)
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::Serve { transport: Transport::Rpc, .. }));
        assert_eq!(err.to_string(), "rpc server failed: accept failed");
        assert!(stopped_rx.await.is_ok(), "http loop should observe the stop signal");
        // The external token is left alone; only the child is cancelled
        assert!(!h.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_loop_ending_cleanly_is_still_fatal() {
        let h = Harness::new();
        let rpc = obedient(h.shutdown.clone());
        let http: LoopHandle = tokio::spawn(async { Ok(()) });

        let err = supervise(&h.cancel, &h.shutdown, rpc, http, Duration::from_secs(1), &h.state)
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::Exited { transport: Transport::Http }));
    }

    #[tokio::test]
    async fn test_panicking_loop_is_reported() {
        let h = Harness::new();
        fn explode() -> Result<(), ServerError> {
            panic!("boom")
        }
        let rpc: LoopHandle = tokio::spawn(async { explode() });
        let http = obedient(h.shutdown.clone());

        let err = supervise(&h.cancel, &h.shutdown, rpc, http, Duration::from_secs(1), &h.state)
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::Serve { transport: Transport::Rpc, .. }));
    }

    #[tokio::test]
    async fn test_stuck_loop_is_aborted_after_grace() {
        let h = Harness::new();
        let (alive_tx, alive_rx) = oneshot::channel::<()>();

        // Ignores the stop signal entirely
        let rpc: LoopHandle = tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await;
            Ok(())
        });
        let http = obedient(h.shutdown.clone());

        h.cancel.cancel();
        let started = Instant::now();
        let result = supervise(&h.cancel, &h.shutdown, rpc, http, Duration::from_millis(50), &h.state).await;

        assert!(result.is_ok());
        assert!(started.elapsed() < Duration::from_secs(2));
        // Dropping the aborted task closes the channel
        assert!(alive_rx.await.is_err());
    }

    #[test]
    fn test_transport_names() {
        assert_eq!(Transport::Rpc.to_string(), "rpc");
        assert_eq!(Transport::Http.to_string(), "http");
    }
}
