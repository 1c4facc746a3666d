use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::clock::ElapsedClock;
use super::device::{AudioChunk, CaptureError, ChunkFormat, RecorderDevice};

/// Capture session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
    Paused,
    /// Transient teardown phase of the stop transition
    Stopping,
}

/// A finalized capture, ready for submission
#[derive(Debug, Clone)]
pub struct Recording {
    /// Complete container bytes
    pub bytes: Vec<u8>,
    /// Container extension ("wav", "mp3", ...)
    pub extension: String,
    /// Elapsed recording time at stop, in whole seconds
    pub duration_seconds: u64,
}

/// A capture session that manages one recording lifecycle over an abstract
/// recorder device
///
/// State machine: Idle → Recording ⇄ Paused, with stop returning to Idle
/// through a transient Stopping phase. The session accumulates the device's
/// chunks and finalizes them into a single [`Recording`] on stop. The device
/// resource is released exactly once regardless of exit path.
pub struct CaptureSession {
    session_id: String,
    device: Box<dyn RecorderDevice>,
    state: CaptureState,

    /// Chunks drained from the device channel
    chunks: Arc<Mutex<Vec<AudioChunk>>>,

    /// One-second elapsed ticker, running iff state is Recording
    clock: ElapsedClock,

    /// Handle for the chunk drain task
    drain_task: Option<JoinHandle<()>>,
}

impl CaptureSession {
    pub fn new(device: Box<dyn RecorderDevice>) -> Self {
        Self {
            session_id: format!("capture-{}", Uuid::new_v4()),
            device,
            state: CaptureState::Idle,
            chunks: Arc::new(Mutex::new(Vec::new())),
            clock: ElapsedClock::new(),
            drain_task: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.clock.seconds()
    }

    /// Number of chunks accumulated so far
    pub async fn chunk_count(&self) -> usize {
        self.chunks.lock().await.len()
    }

    /// Start capturing
    ///
    /// The device is a single exclusive resource: a start while a capture is
    /// already active is a no-op rather than a second device handle. On
    /// device failure the session stays Idle.
    pub async fn start(&mut self) -> Result<(), CaptureError> {
        if self.state != CaptureState::Idle {
            warn!("Capture already active, ignoring start");
            return Ok(());
        }

        info!(
            "Starting capture session {} on device '{}'",
            self.session_id,
            self.device.name()
        );

        let mut chunk_rx = self.device.start().await?;

        self.chunks.lock().await.clear();

        // Drain everything the device emits, including the trailing chunks
        // it flushes after stop; the task ends when the device drops its
        // sender.
        let chunks = Arc::clone(&self.chunks);
        self.drain_task = Some(tokio::spawn(async move {
            while let Some(chunk) = chunk_rx.recv().await {
                chunks.lock().await.push(chunk);
            }
        }));

        self.clock.reset();
        self.clock.resume();
        self.state = CaptureState::Recording;

        Ok(())
    }

    /// Pause capturing; valid only while Recording, otherwise a no-op
    pub async fn pause(&mut self) -> Result<(), CaptureError> {
        if self.state != CaptureState::Recording {
            warn!("Pause requested in state {:?}, ignoring", self.state);
            return Ok(());
        }

        self.device.pause().await?;
        self.clock.pause();
        self.state = CaptureState::Paused;
        info!("Capture session {} paused", self.session_id);

        Ok(())
    }

    /// Resume capturing; valid only while Paused, otherwise a no-op
    pub async fn resume(&mut self) -> Result<(), CaptureError> {
        if self.state != CaptureState::Paused {
            warn!("Resume requested in state {:?}, ignoring", self.state);
            return Ok(());
        }

        self.device.resume().await?;
        self.clock.resume();
        self.state = CaptureState::Recording;
        info!("Capture session {} resumed", self.session_id);

        Ok(())
    }

    /// Stop capturing and finalize the accumulated chunks
    ///
    /// The device is stopped and released before finalization runs, so the
    /// hardware is freed on every exit path; finalization errors propagate
    /// only after release. Rejected with `NotActive` outside
    /// Recording/Paused.
    pub async fn stop(&mut self) -> Result<Recording, CaptureError> {
        match self.state {
            CaptureState::Recording | CaptureState::Paused => {}
            _ => return Err(CaptureError::NotActive),
        }

        info!("Stopping capture session {}", self.session_id);
        self.state = CaptureState::Stopping;
        self.clock.pause();

        let stop_result = self.device.stop().await;

        // The device drops its chunk sender only after the final flush;
        // waiting for the drain task here guarantees trailing buffered
        // chunks end up in the finalized recording.
        if let Some(drain) = self.drain_task.take() {
            if let Err(e) = drain.await {
                warn!("Chunk drain task panicked: {}", e);
            }
        }

        let elapsed = self.clock.seconds();
        self.state = CaptureState::Idle;
        stop_result?;

        let chunks = {
            let mut chunks = self.chunks.lock().await;
            std::mem::take(&mut *chunks)
        };

        info!(
            "Capture session {} finished: {} chunks, {}s elapsed",
            self.session_id,
            chunks.len(),
            elapsed
        );

        finalize_chunks(&chunks, &self.device.format(), elapsed)
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if matches!(self.state, CaptureState::Recording | CaptureState::Paused) {
            warn!(
                "Capture session {} dropped while active; device releases on drop",
                self.session_id
            );
        }
        if let Some(drain) = self.drain_task.take() {
            drain.abort();
        }
    }
}

/// Combine accumulated chunks into a single recording
fn finalize_chunks(
    chunks: &[AudioChunk],
    format: &ChunkFormat,
    duration_seconds: u64,
) -> Result<Recording, CaptureError> {
    match format {
        ChunkFormat::Encoded { extension } => {
            let mut bytes = Vec::new();
            for chunk in chunks {
                bytes.extend_from_slice(&chunk.data);
            }
            Ok(Recording {
                bytes,
                extension: extension.clone(),
                duration_seconds,
            })
        }

        ChunkFormat::Pcm {
            sample_rate,
            channels,
        } => {
            let mut pcm = Vec::with_capacity(chunks.iter().map(|c| c.data.len()).sum());
            for chunk in chunks {
                pcm.extend_from_slice(&chunk.data);
            }

            if pcm.len() % 2 != 0 {
                return Err(CaptureError::Finalize(format!(
                    "PCM capture is not i16-aligned ({} bytes)",
                    pcm.len()
                )));
            }

            let spec = hound::WavSpec {
                channels: *channels,
                sample_rate: *sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };

            let mut bytes = Vec::new();
            {
                let cursor = Cursor::new(&mut bytes);
                let mut writer = hound::WavWriter::new(cursor, spec)
                    .map_err(|e| CaptureError::Finalize(e.to_string()))?;

                for sample in pcm.chunks_exact(2) {
                    let sample = i16::from_le_bytes([sample[0], sample[1]]);
                    writer
                        .write_sample(sample)
                        .map_err(|e| CaptureError::Finalize(e.to_string()))?;
                }

                writer
                    .finalize()
                    .map_err(|e| CaptureError::Finalize(e.to_string()))?;
            }

            Ok(Recording {
                bytes,
                extension: "wav".to_string(),
                duration_seconds,
            })
        }
    }
}
