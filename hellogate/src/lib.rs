//! # hellogate: one hello operation over gRPC and multipart HTTP
//!
//! `hellogate` serves a single business operation, "say hello, optionally with binary
//! attachments", over two transports at once from one process, and ships a client that can speak
//! either of them.
//!
//! ## Architecture
//!
//! ```text
//!  client ──(grpcv1/grpcv2)──▶ gRPC listener ──▶ rpc::HelloResolver ─┐
//!                                                                    ├─▶ service::HelloService
//!  client ──(restv1/restv2)──▶ HTTP listener ──▶ api::handlers ──────┘        (FileStore)
//! ```
//!
//! - [`server`]: the dual-transport lifecycle. Both accept loops run concurrently; the first of
//!   {external cancellation, either loop ending} stops the whole server.
//! - [`multipart`]: the `multipart/form-data` codec used by the HTTP client and the HTTP handler.
//!   One JSON `object` part carries title, description and int value; each attachment travels as
//!   its own `attachment` file part.
//! - [`rpc`] and [`api`]: the two transport adapters onto the same [`service::HelloService`].
//! - [`service`]: persists non-empty attachments as `<stem>-<UTC timestamp>.<ext>` under the
//!   configured store location and returns a summary string.
//! - [`client`]: the `HelloSender` strategies (`grpcv1`, `grpcv2`, `restv1`, `restv2`) and the
//!   run loop used by the `hellogate-client` binary.
//!
//! ## Configuration
//!
//! See [`config`] for the YAML layout and the `HELLOGATE_` environment overrides.

pub mod api;
pub mod client;
pub mod config;
pub mod errors;
pub mod multipart;
mod openapi;
pub mod rpc;
pub mod server;
pub mod service;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test;

pub use config::{ClientConfig, Config};
pub use server::{BoundServer, DualTransportServer, ServerError, ServerState};
pub use service::{FileStore, HelloService};
