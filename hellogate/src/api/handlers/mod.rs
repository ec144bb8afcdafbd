//! HTTP request handlers.
//!
//! - [`hello`]: the JSON and multipart `sayhello` endpoints
//!
//! Handlers return [`crate::errors::Error`], which converts to an empty `500` response.

pub mod hello;
