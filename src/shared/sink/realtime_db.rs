use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::HistorySink;
use crate::modules::device::HistoryRecord;
use crate::shared::errors::SinkError;

/// Realtime database REST endpoint. Each append is a `POST` to
/// `<base_url>/<path>.json`, which pushes a new child under `path`.
#[derive(Debug, Clone)]
pub struct RealtimeDbSink {
    client: Client,
    url: String,
    auth_token: Option<String>,
}

impl RealtimeDbSink {
    pub fn new(
        base_url: &str,
        path: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let client = Client::builder().timeout(timeout).build()?;
        let url = format!(
            "{}/{}.json",
            base_url.trim_end_matches('/'),
            path.trim_matches('/')
        );

        Ok(RealtimeDbSink {
            client,
            url,
            auth_token,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HistorySink for RealtimeDbSink {
    async fn append(&self, record: &HistoryRecord) -> Result<(), SinkError> {
        let mut request = self.client.post(&self.url).json(record);
        if let Some(token) = &self.auth_token {
            request = request.query(&[("auth", token)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status(status.as_u16()));
        }

        Ok(())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
