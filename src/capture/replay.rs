use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::device::{AudioChunk, CaptureError, ChunkFormat, RecorderDevice};

/// Recorder device that replays an encoded audio file as timed chunks
///
/// Stands in for a live input when analyzing existing call audio through
/// the capture path, and gives tests a deterministic device. Chunks are
/// byte slices of the source file, so concatenating them reproduces it
/// exactly.
pub struct ReplayDevice {
    path: PathBuf,
    extension: String,
    display_name: String,

    /// Bytes per emitted chunk
    chunk_bytes: usize,
    /// Delay between chunk emissions
    cadence: Duration,

    active: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl ReplayDevice {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_ascii_lowercase();

        Self {
            display_name: format!("replay:{}", path.display()),
            path,
            extension,
            chunk_bytes: 32 * 1024,
            cadence: Duration::from_millis(250),
            active: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    pub fn with_chunking(mut self, chunk_bytes: usize, cadence: Duration) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self.cadence = cadence;
        self
    }
}

#[async_trait::async_trait]
impl RecorderDevice for ReplayDevice {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>, CaptureError> {
        if self.task.is_some() {
            return Err(CaptureError::Device("replay already running".to_string()));
        }

        let data = tokio::fs::read(&self.path).await.map_err(|e| {
            CaptureError::DeviceUnavailable(format!(
                "cannot read {}: {}",
                self.path.display(),
                e
            ))
        })?;

        info!(
            "Replaying {} ({} bytes, {} byte chunks)",
            self.path.display(),
            data.len(),
            self.chunk_bytes
        );

        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        self.active.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);

        let active = Arc::clone(&self.active);
        let paused = Arc::clone(&self.paused);
        let chunk_bytes = self.chunk_bytes;
        let cadence = self.cadence;

        self.task = Some(tokio::spawn(async move {
            let cadence_ms = cadence.as_millis() as u64;
            let mut offset = 0;
            let mut emitted = 0u64;

            while offset < data.len() && active.load(Ordering::SeqCst) {
                if paused.load(Ordering::SeqCst) {
                    tokio::time::sleep(Duration::from_millis(25)).await;
                    continue;
                }

                let end = (offset + chunk_bytes).min(data.len());
                let chunk = AudioChunk {
                    data: data[offset..end].to_vec(),
                    timestamp_ms: emitted * cadence_ms,
                };
                if chunk_tx.send(chunk).await.is_err() {
                    break;
                }
                offset = end;
                emitted += 1;

                tokio::time::sleep(cadence).await;
            }

            // Source exhausted: hold the sender open until stop, like a live
            // device that has simply gone quiet.
            while active.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }));

        Ok(chunk_rx)
    }

    async fn pause(&mut self) -> Result<(), CaptureError> {
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), CaptureError> {
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.active.store(false, Ordering::SeqCst);

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Replay task panicked: {}", e);
            }
        }

        Ok(())
    }

    fn format(&self) -> ChunkFormat {
        ChunkFormat::Encoded {
            extension: self.extension.clone(),
        }
    }

    fn name(&self) -> &str {
        &self.display_name
    }
}

impl Drop for ReplayDevice {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
