use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{debug, instrument};

use super::proto::{self, hello_bridge_server::HelloBridge};
use crate::service::HelloService;
use crate::types::Attachment;

/// Serves `HelloBridge/SayHello` by delegating to the shared service.
#[derive(Clone)]
pub struct HelloResolver {
    service: Arc<dyn HelloService>,
}

impl HelloResolver {
    pub fn new(service: Arc<dyn HelloService>) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl HelloBridge for HelloResolver {
    #[instrument(skip_all)]
    async fn say_hello(&self, request: Request<proto::SayHelloRequest>) -> Result<Response<proto::SayHelloResponse>, Status> {
        let request = request.into_inner();
        debug!(
            title = %request.title,
            attachments = request.attachments.len(),
            "Received SayHello over gRPC"
        );

        let attachments: Vec<Attachment> = request.attachments.into_iter().map(Attachment::from).collect();

        let response = self
            .service
            .react_on_hello(&request.title, &request.description, request.int_value, attachments)
            .await?;

        Ok(Response::new(proto::SayHelloResponse { response }))
    }
}
