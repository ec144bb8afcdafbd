use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, instrument};

use super::HelloSender;
use crate::config::{ClientConfig, RequestConfig};
use crate::errors::{Error, Result};
use crate::types::{Attachment, HelloRequest};

/// Builds one request from configuration and sends it through the selected transport.
pub struct HelloClient {
    sender: Box<dyn HelloSender>,
    request: RequestConfig,
    data_files: Vec<PathBuf>,
}

impl HelloClient {
    pub fn new(sender: Box<dyn HelloSender>, config: &ClientConfig) -> Self {
        Self {
            sender,
            request: config.request.clone(),
            data_files: config.data_files.clone(),
        }
    }

    /// Read every data file and assemble the request. `int_value` is the current unix second mod 1000.
    pub async fn build_request(&self) -> Result<HelloRequest> {
        let mut attachments = Vec::with_capacity(self.data_files.len());
        for path in &self.data_files {
            attachments.push(read_attachment(path).await?);
        }

        Ok(HelloRequest {
            title: self.request.title.clone(),
            description: self.request.description.clone(),
            int_value: Utc::now().timestamp().rem_euclid(1000),
            attachments,
        })
    }

    #[instrument(skip_all)]
    pub async fn run(&self) -> Result<String> {
        let request = self.build_request().await?;
        info!(
            title = %request.title,
            attachments = request.attachments.len(),
            "Sending hello"
        );

        let response = self.sender.send_hello(&request).await?;
        println!("RESPONSE: {response}");

        Ok(response)
    }
}

async fn read_attachment(path: &Path) -> Result<Attachment> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| Error::config(format!("failed to read data file {}: {e}", path.display())))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Attachment { file_name, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture {
        sent: Arc<Mutex<Vec<HelloRequest>>>,
    }

    #[async_trait]
    impl HelloSender for Capture {
        async fn send_hello(&self, request: &HelloRequest) -> Result<String> {
            self.sent.lock().unwrap().push(request.clone());
            Ok("ack".to_string())
        }
    }

    #[tokio::test]
    async fn test_run_sends_data_files_as_attachments() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.txt");
        let second = dir.path().join("nested.data.bin");
        std::fs::write(&first, b"1st").unwrap();
        std::fs::write(&second, b"2nd").unwrap();

        let capture = Capture::default();
        let config = ClientConfig {
            data_files: vec![first, second],
            ..Default::default()
        };

        let client = HelloClient::new(Box::new(capture.clone()), &config);
        assert_eq!(client.run().await.unwrap(), "ack");

        let sent = capture.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "tit");
        assert_eq!(sent[0].description, "desc");
        assert!((0..1000).contains(&sent[0].int_value));
        assert_eq!(
            sent[0].attachments,
            vec![Attachment::new("first.txt", b"1st".to_vec()), Attachment::new("nested.data.bin", b"2nd".to_vec())]
        );
    }

    #[tokio::test]
    async fn test_unreadable_data_file_aborts_before_sending() {
        let capture = Capture::default();
        let config = ClientConfig {
            data_files: vec![PathBuf::from("/definitely/not/here.txt")],
            ..Default::default()
        };

        let client = HelloClient::new(Box::new(capture.clone()), &config);
        let err = client.run().await.unwrap_err();

        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("/definitely/not/here.txt"));
        assert!(capture.sent.lock().unwrap().is_empty());
    }
}
