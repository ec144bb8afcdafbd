//! OpenAPI document for the HTTP endpoints, served at `/swagger`.

use utoipa::OpenApi;

use crate::api;
use crate::types::{ObjectPart, SayHelloResponse};

#[derive(OpenApi)]
#[openapi(
    info(title = "hellogate", description = "The hello operation over HTTP"),
    paths(
        api::handlers::hello::say_hello_v1,
        api::handlers::hello::say_hello_v2,
    ),
    components(schemas(ObjectPart, SayHelloResponse)),
    tags(
        (name = "hello", description = "Hello requests with optional attachments"),
    )
)]
pub struct ApiDoc;
