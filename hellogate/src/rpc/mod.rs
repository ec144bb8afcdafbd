//! gRPC transport: generated protobuf bindings and the adapter onto [`crate::service::HelloService`].

pub mod resolver;

pub use resolver::HelloResolver;

/// Generated from `proto/hellogate.proto`.
pub mod proto {
    tonic::include_proto!("hellogate");
}

use crate::types::{Attachment, HelloRequest};

impl From<proto::Attachment> for Attachment {
    fn from(attachment: proto::Attachment) -> Self {
        Attachment {
            file_name: attachment.file_name,
            data: attachment.binary_data,
        }
    }
}

impl From<&Attachment> for proto::Attachment {
    fn from(attachment: &Attachment) -> Self {
        proto::Attachment {
            file_name: attachment.file_name.clone(),
            binary_data: attachment.data.clone(),
        }
    }
}

impl proto::SayHelloRequest {
    /// Build the wire request, optionally leaving attachments out.
    pub fn from_hello(request: &HelloRequest, with_attachments: bool) -> Self {
        let attachments = if with_attachments {
            request.attachments.iter().map(proto::Attachment::from).collect()
        } else {
            Vec::new()
        };

        proto::SayHelloRequest {
            title: request.title.clone(),
            description: request.description.clone(),
            int_value: request.int_value,
            attachments,
        }
    }
}
