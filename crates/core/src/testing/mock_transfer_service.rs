//! Mock file transfer service for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::chat::{ChannelId, ChatError, TransferService};

/// A recorded upload for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub channel_id: ChannelId,
    pub filename: String,
    pub data: Vec<u8>,
    pub message: Option<String>,
}

/// Mock implementation of the TransferService trait.
///
/// Downloads are served from seeded URL -> bytes mappings; unknown URLs
/// fail like a dead CDN link would. Uploads are recorded for assertions.
pub struct MockTransferService {
    downloads: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    uploads: Arc<RwLock<Vec<RecordedUpload>>>,
    fail_next_upload: Arc<RwLock<bool>>,
}

impl Default for MockTransferService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransferService {
    pub fn new() -> Self {
        Self {
            downloads: Arc::new(RwLock::new(HashMap::new())),
            uploads: Arc::new(RwLock::new(Vec::new())),
            fail_next_upload: Arc::new(RwLock::new(false)),
        }
    }

    /// Make a URL downloadable.
    pub async fn seed_download(&self, url: &str, data: Vec<u8>) {
        self.downloads.write().await.insert(url.to_string(), data);
    }

    pub async fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.read().await.clone()
    }

    pub async fn fail_next_upload(&self) {
        *self.fail_next_upload.write().await = true;
    }
}

#[async_trait]
impl TransferService for MockTransferService {
    async fn download(&self, url: &str) -> Result<Vec<u8>, ChatError> {
        self.downloads
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| ChatError::Api {
                status: 404,
                message: format!("no seeded download for {url}"),
            })
    }

    async fn upload_file(
        &self,
        channel_id: ChannelId,
        filename: &str,
        data: Vec<u8>,
        message: Option<&str>,
    ) -> Result<(), ChatError> {
        let fail = {
            let mut flag = self.fail_next_upload.write().await;
            std::mem::take(&mut *flag)
        };
        if fail {
            return Err(ChatError::Api {
                status: 500,
                message: "injected upload failure".to_string(),
            });
        }

        self.uploads.write().await.push(RecordedUpload {
            channel_id,
            filename: filename.to_string(),
            data,
            message: message.map(|m| m.to_string()),
        });
        Ok(())
    }
}
