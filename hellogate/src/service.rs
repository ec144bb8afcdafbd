//! The hello business logic, independent of any transport.
//!
//! [`FileStore`] persists every non-empty attachment under the configured store location as
//! `<stem>-<UTC timestamp>.<extension>` and answers with a summary of what was saved. Write
//! failures are collected across all attachments of a call and reported together.
//!
//! Derived names have second granularity and no uniqueness suffix: two saves of the same stem
//! within one second target the same path and the last write wins.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::config::ServiceConfig;
use crate::errors::{Result, StorageError, StorageFailure};
use crate::types::Attachment;

/// Stem used when an attachment arrives without a file name.
pub const PLACEHOLDER_STEM: &str = "empty-filename";
/// Extension used when an attachment arrives without a file name.
pub const PLACEHOLDER_EXTENSION: &str = "data";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// The single operation every transport adapter calls.
#[async_trait]
pub trait HelloService: Send + Sync {
    async fn react_on_hello(&self, title: &str, description: &str, int_value: i64, attachments: Vec<Attachment>) -> Result<String>;
}

/// Source of the timestamp embedded in stored file names.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Saves attachments to a directory on the local file system.
pub struct FileStore {
    store_location: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileStore {
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ServiceConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store_location: config.store_location,
            clock,
        }
    }

    /// Target path for an attachment saved at `now`.
    pub fn path_for(&self, file_name: &str, now: DateTime<Utc>) -> PathBuf {
        let (stem, extension) = split_file_name(file_name);
        let timestamp = now.format(TIMESTAMP_FORMAT);

        let name = if extension.is_empty() {
            format!("{stem}-{timestamp}")
        } else {
            format!("{stem}-{timestamp}.{extension}")
        };

        self.store_location.join(name)
    }
}

/// Split a file name on its first `.` into stem and extension.
///
/// Directory components are dropped so a crafted name cannot escape the store location.
pub fn split_file_name(file_name: &str) -> (String, String) {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("");

    if base.is_empty() {
        return (PLACEHOLDER_STEM.to_string(), PLACEHOLDER_EXTENSION.to_string());
    }

    match base.split_once('.') {
        Some((stem, extension)) => (stem.to_string(), extension.to_string()),
        None => (base.to_string(), String::new()),
    }
}

#[async_trait]
impl HelloService for FileStore {
    #[instrument(skip_all, fields(title = %title, attachments = attachments.len()))]
    async fn react_on_hello(&self, title: &str, description: &str, int_value: i64, attachments: Vec<Attachment>) -> Result<String> {
        debug!("service got a Hello request: {}", title);

        let mut failures = Vec::new();
        let mut saved_files = Vec::with_capacity(attachments.len());

        for attachment in attachments {
            if attachment.data.is_empty() {
                info!("{}: [{}: {}]. Data is empty, nothing was saved", title, description, int_value);
                continue;
            }

            let path = self.path_for(&attachment.file_name, self.clock.now());

            match tokio::fs::write(&path, &attachment.data).await {
                Ok(()) => {
                    debug!(path = %path.display(), size = attachment.data.len(), "Saved attachment");
                    saved_files.push(attachment.file_name);
                }
                Err(source) => {
                    tracing::warn!(path = %path.display(), error = %source, "Failed to save attachment");
                    failures.push(StorageFailure {
                        file_name: attachment.file_name,
                        path,
                        source,
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(StorageError { failures }.into());
        }

        Ok(format!(
            "{}: [{}: {}]. [{}] were saved",
            title,
            description,
            int_value,
            saved_files.join(",")
        ))
    }
}
