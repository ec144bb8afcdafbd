//! HTTP handlers for the hello endpoints.

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection},
        State,
    },
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    Json,
};
use tracing::debug;

use crate::api::AppState;
use crate::errors::{Error, Result};
use crate::multipart;
use crate::types::{ObjectPart, SayHelloResponse};

#[utoipa::path(
    post,
    path = "/v1/sayhello",
    tag = "hello",
    summary = "Say hello",
    description = "Say hello with a JSON body. No attachments are accepted on this endpoint.",
    request_body = ObjectPart,
    responses(
        (status = 200, description = "Service response", body = SayHelloResponse),
        (status = 500, description = "The request could not be processed; the body is empty"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn say_hello_v1(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ObjectPart>, JsonRejection>,
) -> Result<Json<SayHelloResponse>> {
    // Rejections go through our error type so they answer an empty 500 like every other failure
    let Json(object) = payload.map_err(|e| Error::decoding("request body", e))?;
    debug!(title = %object.title, "Received SayHello over HTTP v1");

    let response = state
        .service
        .react_on_hello(&object.title, &object.description, object.int_value, Vec::new())
        .await?;

    Ok(Json(SayHelloResponse { response }))
}

#[utoipa::path(
    post,
    path = "/v2/sayhello",
    tag = "hello",
    summary = "Say hello with attachments",
    description = "Say hello with a multipart/form-data body: one JSON `object` field followed by any \
                   number of `attachment` file fields.",
    request_body(
        content_type = "multipart/form-data",
        description = "An `object` part holding title, description and int_value, then zero or more `attachment` parts"
    ),
    responses(
        (status = 201, description = "Attachments saved", body = SayHelloResponse),
        (status = 500, description = "The body could not be read or decoded, or saving failed; the body is empty"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn say_hello_v2(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<SayHelloResponse>)> {
    // Includes bodies over the configured size limit
    let body = body.map_err(|e| Error::decoding("request body", e))?;
    debug!("got request body of {} bytes", body.len());

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::decoding("content type", "missing or non-ASCII Content-Type header"))?;
    let boundary = multipart::boundary_from_content_type(content_type)?;

    let request = multipart::decode(body, &boundary).await?.into_request();

    let response = state
        .service
        .react_on_hello(&request.title, &request.description, request.int_value, request.attachments)
        .await?;

    Ok((StatusCode::CREATED, Json(SayHelloResponse { response })))
}
