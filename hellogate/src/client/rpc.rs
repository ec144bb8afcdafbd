//! gRPC sender for the `grpcv1` and `grpcv2` transports.

use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, instrument};

use super::HelloSender;
use crate::config::RpcClientConfig;
use crate::errors::{Error, Result};
use crate::rpc::proto::{hello_bridge_client::HelloBridgeClient, SayHelloRequest};
use crate::types::HelloRequest;

pub struct RpcSender {
    endpoint: Endpoint,
    channel: Channel,
    timeout: Duration,
    /// `false` for the v1 contract, which never sends attachments
    with_attachments: bool,
}

impl RpcSender {
    /// Dial the server, bounded by the configured timeout.
    pub async fn connect(config: &RpcClientConfig, with_attachments: bool) -> Result<Self> {
        let uri = endpoint_uri(&config.host);

        let endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| Error::config(format!("invalid rpc.host '{}': {}", config.host, e)))?
            .connect_timeout(config.timeout)
            .timeout(config.timeout);
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| Error::transport(format!("failed to connect to '{uri}': {e}")))?;

        debug!(endpoint = %uri, with_attachments, "Connected gRPC channel");

        Ok(Self {
            endpoint,
            channel,
            timeout: config.timeout,
            with_attachments,
        })
    }

    /// Fails unless the server accepts a fresh connection within the timeout.
    ///
    /// A tonic channel does not expose its connectivity state and reports ready while the peer is
    /// gone, so this dials the endpoint instead of asking the channel.
    pub async fn ping(&self) -> Result<()> {
        match tokio::time::timeout(self.timeout, self.endpoint.connect()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(Error::Connectivity {
                message: format!("connection is not ready: {e}"),
            }),
            Err(_) => Err(Error::Connectivity {
                message: format!("connection did not become ready within {:?}", self.timeout),
            }),
        }
    }
}

#[async_trait]
impl HelloSender for RpcSender {
    #[instrument(skip_all, fields(title = %request.title))]
    async fn send_hello(&self, request: &HelloRequest) -> Result<String> {
        self.ping().await?;

        let mut client = HelloBridgeClient::new(self.channel.clone());
        let response = client
            .say_hello(SayHelloRequest::from_hello(request, self.with_attachments))
            .await
            .map_err(|status| Error::transport(format!("SayHello failed: {}: {}", status.code(), status.message())))?;

        Ok(response.into_inner().response)
    }
}

/// Accept both `host:port` and a full URI.
fn endpoint_uri(host: &str) -> String {
    if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}
