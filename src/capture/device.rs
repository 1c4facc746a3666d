use thiserror::Error;
use tokio::sync::mpsc;

/// A single buffer of captured audio handed up by a device
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Chunk payload; interpretation depends on the device's [`ChunkFormat`]
    pub data: Vec<u8>,
    /// Milliseconds since capture started
    pub timestamp_ms: u64,
}

/// How a device's chunks combine into a finalized recording
#[derive(Debug, Clone)]
pub enum ChunkFormat {
    /// Chunks are slices of an encoded container; concatenating them in
    /// order yields a valid file with the given extension.
    Encoded { extension: String },
    /// Chunks are interleaved little-endian i16 PCM; finalization wraps
    /// them in a WAV container.
    Pcm { sample_rate: u32, channels: u16 },
}

/// Errors raised by recorder devices and the capture session
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Recording device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Recording device error: {0}")]
    Device(String),

    #[error("No capture in progress")]
    NotActive,

    #[error("Failed to finalize recording: {0}")]
    Finalize(String),
}

/// Recorder device capability interface
///
/// Hides the platform recording primitive from the capture state machine.
/// Implementations:
/// - `MicDevice`: cpal microphone capture on a dedicated thread
/// - `ReplayDevice`: emits an encoded audio file as timed chunks
/// - test fakes driven by scripted chunk sequences
///
/// Contract: chunks are emitted only while the device is actively capturing
/// (between start/resume and pause/stop), plus a final flush of buffered
/// data after `stop`; the chunk sender is dropped only once that flush is
/// complete. `stop` must release the underlying hardware exactly once, even
/// when it returns an error, and dropping an active device must release it
/// as well.
#[async_trait::async_trait]
pub trait RecorderDevice: Send {
    /// Begin capture
    ///
    /// Returns a channel receiver that will receive audio chunks
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>, CaptureError>;

    /// Suspend capture; buffered data is retained, no new chunks are emitted
    async fn pause(&mut self) -> Result<(), CaptureError>;

    /// Continue a suspended capture
    async fn resume(&mut self) -> Result<(), CaptureError>;

    /// Stop capture, flush remaining buffered chunks, release the hardware
    async fn stop(&mut self) -> Result<(), CaptureError>;

    /// Chunk interpretation for finalization
    fn format(&self) -> ChunkFormat;

    /// Get device name for logging
    fn name(&self) -> &str;
}
