//! Client transport strategies
//!
//! This module defines the `HelloSender` trait which abstracts sending one hello request over
//! either wire protocol. Exactly one sender is built per process run, chosen by the configured
//! [`TransportKind`].

use async_trait::async_trait;

use crate::config::{ClientConfig, TransportKind};
use crate::errors::Result;
use crate::types::HelloRequest;

pub mod rest;
pub mod rpc;
pub mod runner;

pub use rest::{JsonSender, MultipartSender};
pub use rpc::RpcSender;
pub use runner::HelloClient;

/// Create a sender from configuration
///
/// This is the single point where the transport identifier is turned into a sender.
/// gRPC variants connect eagerly, so an unreachable server fails here.
pub async fn create_sender(config: &ClientConfig) -> Result<Box<dyn HelloSender>> {
    let sender: Box<dyn HelloSender> = match config.transport {
        TransportKind::GrpcV1 => Box::new(RpcSender::connect(&config.rpc, false).await?),
        TransportKind::GrpcV2 => Box::new(RpcSender::connect(&config.rpc, true).await?),
        TransportKind::RestV1 => Box::new(JsonSender::new(&config.rest)?),
        TransportKind::RestV2 => Box::new(MultipartSender::new(&config.rest)?),
    };

    Ok(sender)
}

/// Send one hello request and return the server's response string.
#[async_trait]
pub trait HelloSender: Send + Sync {
    async fn send_hello(&self, request: &HelloRequest) -> Result<String>;
}
