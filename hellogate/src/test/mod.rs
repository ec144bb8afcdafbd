//! End-to-end tests: a real dual-transport server on loopback ports, driven by the real senders.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::client::{HelloSender, JsonSender, MultipartSender, RpcSender};
use crate::config::{Config, RestClientConfig, RpcClientConfig, ServiceConfig};
use crate::errors::Error;
use crate::server::{DualTransportServer, ServerError, ServerState, Transport};
use crate::service::FileStore;
use crate::types::{Attachment, HelloRequest};

struct RunningServer {
    rpc_addr: SocketAddr,
    http_addr: SocketAddr,
    cancel: CancellationToken,
    state: watch::Receiver<ServerState>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl RunningServer {
    async fn start(store: &Path) -> Self {
        let mut config = Config::default();
        config.rpc.host = "127.0.0.1:0".to_string();
        config.http.host = "127.0.0.1:0".to_string();
        config.service = ServiceConfig {
            store_location: store.to_path_buf(),
        };
        config.shutdown_timeout = Duration::from_secs(2);

        let service = Arc::new(FileStore::new(config.service.clone()));
        let bound = DualTransportServer::new(config, service).bind().await.unwrap();

        let rpc_addr = bound.rpc_addr();
        let http_addr = bound.http_addr();
        let state = bound.state();
        assert_eq!(*state.borrow(), ServerState::Created);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(bound.run(cancel.clone()));

        let mut server = Self {
            rpc_addr,
            http_addr,
            cancel,
            state,
            handle,
        };
        server.wait_for(ServerState::Running).await;
        server
    }

    async fn wait_for(&mut self, target: ServerState) {
        tokio::time::timeout(Duration::from_secs(5), self.state.wait_for(|s| *s == target))
            .await
            .expect("state change timed out")
            .expect("state channel closed");
    }

    fn rpc_config(&self) -> RpcClientConfig {
        RpcClientConfig {
            host: self.rpc_addr.to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    fn rest_config(&self) -> RestClientConfig {
        RestClientConfig {
            url: Url::parse(&format!("http://{}", self.http_addr)).unwrap(),
            timeout: Duration::from_secs(5),
        }
    }

    async fn stop(self) -> Result<(), ServerError> {
        self.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop in time")
            .unwrap()
    }
}

fn hello(title: &str, attachments: Vec<Attachment>) -> HelloRequest {
    HelloRequest {
        title: title.to_string(),
        description: "desc".to_string(),
        int_value: 7,
        attachments,
    }
}

#[test_log::test(tokio::test)]
async fn test_both_transports_serve_concurrently_without_crosstalk() {
    let store = tempfile::tempdir().unwrap();
    let server = RunningServer::start(store.path()).await;

    let rpc = RpcSender::connect(&server.rpc_config(), true).await.unwrap();
    let rest = MultipartSender::new(&server.rest_config()).unwrap();

    let rpc_request = hello("via-rpc", vec![Attachment::new("rpc.txt", b"from rpc".to_vec())]);
    let rest_request = hello("via-http", vec![Attachment::new("http.txt", b"from http".to_vec())]);

    let (rpc_response, rest_response) = tokio::join!(rpc.send_hello(&rpc_request), rest.send_hello(&rest_request));

    let rpc_response = rpc_response.unwrap();
    let rest_response = rest_response.unwrap();
    assert_eq!(rpc_response, "via-rpc: [desc: 7]. [rpc.txt] were saved");
    assert_eq!(rest_response, "via-http: [desc: 7]. [http.txt] were saved");

    let mut stored: Vec<String> = std::fs::read_dir(store.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    stored.sort();
    assert_eq!(stored.len(), 2);
    assert!(stored[0].starts_with("http-") && stored[0].ends_with(".txt"));
    assert!(stored[1].starts_with("rpc-") && stored[1].ends_with(".txt"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_v1_transports_send_no_attachments() {
    let store = tempfile::tempdir().unwrap();
    let server = RunningServer::start(store.path()).await;

    let request = hello("legacy", vec![Attachment::new("ignored.txt", b"not sent".to_vec())]);

    let grpc_v1 = RpcSender::connect(&server.rpc_config(), false).await.unwrap();
    assert_eq!(
        grpc_v1.send_hello(&request).await.unwrap(),
        "legacy: [desc: 7]. [] were saved"
    );

    let rest_v1 = JsonSender::new(&server.rest_config()).unwrap();
    assert_eq!(
        rest_v1.send_hello(&request).await.unwrap(),
        "legacy: [desc: 7]. [] were saved"
    );

    assert_eq!(std::fs::read_dir(store.path()).unwrap().count(), 0);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_storage_failure_surfaces_on_each_transport() {
    let store = tempfile::tempdir().unwrap();
    let missing = store.path().join("not-created");
    let server = RunningServer::start(&missing).await;

    let request = hello("t", vec![Attachment::new("a.txt", b"x".to_vec())]);

    // gRPC carries the service message in an internal status
    let rpc = RpcSender::connect(&server.rpc_config(), true).await.unwrap();
    let err = rpc.send_hello(&request).await.unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
    assert!(err.to_string().contains("failed to save"));

    // HTTP answers an empty 500
    let rest = MultipartSender::new(&server.rest_config()).unwrap();
    match rest.send_hello(&request).await.unwrap_err() {
        Error::UnexpectedStatus { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert!(body.is_empty());
        }
        other => panic!("expected unexpected status, got {other:?}"),
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_ping_fails_once_server_is_gone() {
    let store = tempfile::tempdir().unwrap();
    let server = RunningServer::start(store.path()).await;

    let config = RpcClientConfig {
        timeout: Duration::from_secs(1),
        ..server.rpc_config()
    };
    let rpc = RpcSender::connect(&config, true).await.unwrap();
    rpc.ping().await.unwrap();

    server.stop().await.unwrap();

    let err = rpc.ping().await.unwrap_err();
    assert!(matches!(err, Error::Connectivity { .. }), "got {err:?}");

    // Sending checks connectivity first and never reaches the call
    let err = rpc.send_hello(&hello("late", Vec::new())).await.unwrap_err();
    assert!(matches!(err, Error::Connectivity { .. }), "got {err:?}");
    assert_eq!(std::fs::read_dir(store.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_cancel_stops_idle_server_cleanly() {
    let store = tempfile::tempdir().unwrap();
    let mut server = RunningServer::start(store.path()).await;

    server.cancel.cancel();
    server.wait_for(ServerState::Stopped).await;

    let rpc_addr = server.rpc_addr;
    let http_addr = server.http_addr;
    let result = tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server did not stop in time")
        .unwrap();
    assert!(result.is_ok());

    // Both listeners are released
    assert!(tokio::net::TcpListener::bind(rpc_addr).await.is_ok());
    assert!(tokio::net::TcpListener::bind(http_addr).await.is_ok());
}

#[tokio::test]
async fn test_bind_conflict_names_the_transport() {
    let squatter = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let taken = squatter.local_addr().unwrap();

    let mut config = Config::default();
    config.rpc.host = "127.0.0.1:0".to_string();
    config.http.host = taken.to_string();

    let service = Arc::new(FileStore::new(config.service.clone()));
    let err = DualTransportServer::new(config, service)
        .run(CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ServerError::Bind {
            transport: Transport::Http,
            ..
        }
    ));
}
