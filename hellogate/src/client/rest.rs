//! HTTP senders for the `restv1` (JSON) and `restv2` (multipart) transports.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use super::HelloSender;
use crate::config::RestClientConfig;
use crate::errors::{Error, Result};
use crate::multipart;
use crate::types::{HelloRequest, SayHelloResponse};

/// Read limit for a response that carries no usable `Content-Length`.
pub const FALLBACK_READ_LIMIT: usize = 4096;

const V1_PATH: &str = "v1/sayhello";
const V2_PATH: &str = "v2/sayhello";

fn build_client(config: &RestClientConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))
}

fn endpoint(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| Error::config(format!("invalid rest.url '{base}': {e}")))
}

/// POSTs the object fields as JSON to `/v1/sayhello` and expects `200 OK`. Attachments are not sent.
pub struct JsonSender {
    client: Client,
    url: Url,
}

impl JsonSender {
    pub fn new(config: &RestClientConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            url: endpoint(&config.url, V1_PATH)?,
        })
    }
}

#[async_trait]
impl HelloSender for JsonSender {
    #[instrument(skip_all, fields(url = %self.url))]
    async fn send_hello(&self, request: &HelloRequest) -> Result<String> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&request.object_part())
            .send()
            .await
            .map_err(Error::transport)?;

        let response = expect_status(response, StatusCode::OK).await?;
        let body: SayHelloResponse = response
            .json()
            .await
            .map_err(|e| Error::decoding("response body", e))?;

        Ok(body.response)
    }
}

/// POSTs a multipart body to `/v2/sayhello` and expects `201 Created`.
pub struct MultipartSender {
    client: Client,
    url: Url,
}

impl MultipartSender {
    pub fn new(config: &RestClientConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            url: endpoint(&config.url, V2_PATH)?,
        })
    }
}

#[async_trait]
impl HelloSender for MultipartSender {
    #[instrument(skip_all, fields(url = %self.url))]
    async fn send_hello(&self, request: &HelloRequest) -> Result<String> {
        let encoded = multipart::encode(request)?;
        debug!(size = encoded.body.len(), attachments = request.attachments.len(), "Encoded multipart body");

        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, encoded.content_type)
            .body(encoded.body)
            .send()
            .await
            .map_err(Error::transport)?;

        let response = expect_status(response, StatusCode::CREATED).await?;
        let body = read_limited(response).await?;
        let body: SayHelloResponse =
            serde_json::from_slice(&body).map_err(|e| Error::decoding("response body", e))?;

        Ok(body.response)
    }
}

async fn expect_status(response: Response, expected: StatusCode) -> Result<Response> {
    let status = response.status();
    if status == expected {
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, %status, "Failed to read error response body");
            String::new()
        }
    };
    Err(Error::UnexpectedStatus { status, body })
}

/// How many response bytes to read: the declared `Content-Length`, else [`FALLBACK_READ_LIMIT`].
pub fn read_limit(headers: &HeaderMap) -> usize {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(FALLBACK_READ_LIMIT)
}

/// Read the body up to [`read_limit`] bytes. Anything past the limit is dropped, not an error.
async fn read_limited(mut response: Response) -> Result<Vec<u8>> {
    let limit = read_limit(response.headers());
    let mut body = Vec::with_capacity(limit.min(FALLBACK_READ_LIMIT));

    while body.len() < limit {
        match response.chunk().await.map_err(Error::transport)? {
            Some(chunk) => body.extend_from_slice(&chunk),
            None => break,
        }
    }

    body.truncate(limit);
    Ok(body)
}
