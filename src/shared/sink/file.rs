use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{fs, io::AsyncWriteExt, sync::Mutex, time::timeout};

use super::HistorySink;
use crate::modules::device::HistoryRecord;
use crate::shared::errors::SinkError;

/// Appends one JSON document per line to `<dir>/<path>.jsonl`.
///
/// Each append, including the wait for earlier appends, is bounded by
/// `write_timeout`.
#[derive(Debug)]
pub struct JsonFileSink {
    dir: PathBuf,
    file_path: PathBuf,
    write_timeout: Duration,
    write_lock: Mutex<()>,
}

impl JsonFileSink {
    pub fn new<P: AsRef<Path>>(dir: P, path: &str, write_timeout: Duration) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let file_name = format!("{}.jsonl", path.trim_matches('/').replace('/', "_"));
        let file_path = dir.join(file_name);

        JsonFileSink {
            dir,
            file_path,
            write_timeout,
            write_lock: Mutex::new(()),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    async fn write_line(&self, line: &[u8]) -> Result<(), SinkError> {
        // spawned appends may overlap
        let _guard = self.write_lock.lock().await;

        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .await?;
        file.write_all(line).await?;
        file.flush().await?;

        Ok(())
    }
}

#[async_trait]
impl HistorySink for JsonFileSink {
    async fn append(&self, record: &HistoryRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        timeout(self.write_timeout, self.write_line(&line))
            .await
            .map_err(|_| SinkError::Timeout(self.write_timeout))?
    }

    fn describe(&self) -> String {
        self.file_path.display().to_string()
    }
}
