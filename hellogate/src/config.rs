//! Configuration for the server and the client.
//!
//! Both are loaded from a YAML file with environment variable overrides. The file path defaults
//! to `config.yaml` (server) or `client.yaml` (client) and can be given with `-f` or the
//! `HELLOGATE_CONFIG` environment variable.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration
//! 2. **Environment variables** - Variables prefixed with `HELLOGATE_` override YAML values
//!
//! Nested values use double underscores, e.g. `HELLOGATE_RPC__HOST=0.0.0.0:6000` sets `rpc.host`.
//!
//! ## Example
//!
//! ```yaml
//! log:
//!   level: debug
//!   format: json
//! rpc:
//!   host: 0.0.0.0:50051
//! http:
//!   host: 0.0.0.0:8080
//! service:
//!   store_location: ./data
//! ```

use std::net::ToSocketAddrs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::Error;

const ENV_PREFIX: &str = "HELLOGATE_";

/// Server CLI args - just for specifying the config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "HELLOGATE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Client CLI args
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct ClientArgs {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "HELLOGATE_CONFIG", default_value = "client.yaml")]
    pub config: String,

    /// Validate configuration and exit without sending anything.
    #[arg(long)]
    pub validate: bool,
}

/// Logging configuration, consumed once by [`crate::telemetry::init_telemetry`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `hellogate=debug,tower_http=info`. `RUST_LOG` wins if set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
    Pretty,
}

/// Root server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub log: LogConfig,
    pub rpc: RpcServerConfig,
    pub http: HttpServerConfig,
    pub service: ServiceConfig,
    /// How long a transport loop may take to finish after it was told to stop
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RpcServerConfig {
    /// Listen address of the gRPC endpoint
    pub host: String,
    /// Largest accepted or produced gRPC message, in bytes
    pub max_message_size: usize,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0:50051".to_string(),
            max_message_size: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpServerConfig {
    /// Listen address of the HTTP endpoint
    pub host: String,
    /// Largest accepted request body, in bytes
    pub max_body_size: usize,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0:8080".to_string(),
            max_body_size: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Directory attachments are written to. Must exist.
    pub store_location: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store_location: PathBuf::from("./data"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            rpc: RpcServerConfig::default(),
            http: HttpServerConfig::default(),
            service: ServiceConfig::default(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = figment_for(&args.config).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        check_listen_address("rpc.host", &self.rpc.host)?;
        check_listen_address("http.host", &self.http.host)?;

        if self.service.store_location.as_os_str().is_empty() {
            return Err(Error::config("service.store_location must not be empty"));
        }
        if self.rpc.max_message_size == 0 {
            return Err(Error::config("rpc.max_message_size must be greater than 0"));
        }
        if self.http.max_body_size == 0 {
            return Err(Error::config("http.max_body_size must be greater than 0"));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(Error::config("shutdown_timeout must be greater than 0"));
        }

        Ok(())
    }
}

/// `host:port` with an IP literal or a resolvable host name, the same forms the listener binds.
fn check_listen_address(field: &str, value: &str) -> Result<(), Error> {
    let mut addrs = value
        .to_socket_addrs()
        .map_err(|e| Error::config(format!("{field} '{value}' is not a valid listen address: {e}")))?;

    match addrs.next() {
        Some(_) => Ok(()),
        None => Err(Error::config(format!("{field} '{value}' resolves to no address"))),
    }
}

/// The closed set of client transports, selected once per process run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// gRPC without attachments
    GrpcV1,
    /// gRPC with attachments
    #[default]
    GrpcV2,
    /// JSON POST to `/v1/sayhello`
    RestV1,
    /// multipart POST to `/v2/sayhello`
    RestV2,
}

/// Root client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub log: LogConfig,
    pub transport: TransportKind,
    pub rpc: RpcClientConfig,
    pub rest: RestClientConfig,
    pub request: RequestConfig,
    /// Files sent as attachments, named by their base name
    pub data_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RpcClientConfig {
    /// Server address, `host:port` or a full `http://` URI
    pub host: String,
    /// Bounds both dialing and each call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost:50051".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RestClientConfig {
    /// Base URL of the HTTP endpoint
    pub url: Url,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for RestClientConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://localhost:8080").expect("static URL is valid"),
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestConfig {
    pub title: String,
    pub description: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            title: "tit".to_string(),
            description: "desc".to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            transport: TransportKind::default(),
            rpc: RpcClientConfig::default(),
            rest: RestClientConfig::default(),
            request: RequestConfig::default(),
            data_files: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn load(args: &ClientArgs) -> Result<Self, figment::Error> {
        let config: Self = figment_for(&args.config).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        match self.transport {
            TransportKind::GrpcV1 | TransportKind::GrpcV2 => {
                if self.rpc.host.trim().is_empty() {
                    return Err(Error::config("rpc.host must not be empty"));
                }
                if self.rpc.timeout.is_zero() {
                    return Err(Error::config("rpc.timeout must be greater than 0"));
                }
            }
            TransportKind::RestV1 | TransportKind::RestV2 => {
                if !matches!(self.rest.url.scheme(), "http" | "https") {
                    return Err(Error::config(format!(
                        "rest.url must be an http(s) URL, got '{}'",
                        self.rest.url
                    )));
                }
                if self.rest.timeout.is_zero() {
                    return Err(Error::config("rest.timeout must be greater than 0"));
                }
            }
        }

        Ok(())
    }
}

fn figment_for(path: &str) -> Figment {
    Figment::new()
        .merge(Yaml::file(path))
        // HELLOGATE_CONFIG names the file itself and is not a config key
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"))
}
