//! Transport-agnostic request vocabulary shared by the codecs, the adapters and the service.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A named binary blob. Empty `data` means "no file to save"; an empty `file_name` is allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }
}

/// One hello invocation as built by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelloRequest {
    pub title: String,
    pub description: String,
    pub int_value: i64,
    pub attachments: Vec<Attachment>,
}

impl HelloRequest {
    /// The JSON-serializable part of the request. Attachments never travel inside it.
    pub fn object_part(&self) -> ObjectPart {
        ObjectPart {
            title: self.title.clone(),
            description: self.description.clone(),
            int_value: self.int_value,
        }
    }
}

/// Wire shape of the `object` multipart field and of the v1 JSON body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ObjectPart {
    pub title: String,
    pub description: String,
    pub int_value: i64,
}

/// JSON reply of both HTTP endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SayHelloResponse {
    pub response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_part_serializes_without_attachments() {
        let request = HelloRequest {
            title: "tit".to_string(),
            description: "desc".to_string(),
            int_value: 42,
            attachments: vec![Attachment::new("a.bin", vec![1, 2, 3])],
        };

        let json = serde_json::to_value(request.object_part()).unwrap();
        assert_eq!(json, serde_json::json!({"title": "tit", "description": "desc", "int_value": 42}));
    }

    #[test]
    fn test_object_part_missing_fields_default() {
        let part: ObjectPart = serde_json::from_str(r#"{"title": "only"}"#).unwrap();
        assert_eq!(part.title, "only");
        assert_eq!(part.description, "");
        assert_eq!(part.int_value, 0);
    }
}
