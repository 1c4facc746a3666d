use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::device::{AudioChunk, CaptureError, ChunkFormat, RecorderDevice};

/// PCM bytes accumulated by the stream callback, drained by the chunker loop
type SharedBuffer = Arc<StdMutex<Vec<u8>>>;

/// Microphone recorder driven by cpal
///
/// The cpal stream is not `Send`, so capture runs on a dedicated thread that
/// owns the stream for its whole lifetime. The async side controls it
/// through two atomic flags: `capturing` (cleared on stop, ends the thread)
/// and `paused` (makes the data callback discard samples). Readiness and the
/// negotiated stream format are reported back through a oneshot so that a
/// missing or misconfigured input device surfaces as `DeviceUnavailable`
/// at `start()`.
pub struct MicDevice {
    requested_sample_rate: u32,
    chunk_duration_ms: u64,
    capturing: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
    negotiated: Option<(u32, u16)>,
}

impl MicDevice {
    pub fn new(requested_sample_rate: u32, chunk_duration_ms: u64) -> Self {
        Self {
            requested_sample_rate,
            chunk_duration_ms,
            capturing: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            thread: None,
            negotiated: None,
        }
    }

    fn join_thread(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Microphone capture thread panicked");
            }
        }
    }
}

#[async_trait::async_trait]
impl RecorderDevice for MicDevice {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>, CaptureError> {
        if self.thread.is_some() {
            return Err(CaptureError::Device(
                "microphone capture already running".to_string(),
            ));
        }

        let (chunk_tx, chunk_rx) = mpsc::channel(600);
        let (ready_tx, ready_rx) = oneshot::channel();

        self.capturing.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);

        let capturing = Arc::clone(&self.capturing);
        let paused = Arc::clone(&self.paused);
        let requested_rate = self.requested_sample_rate;
        let chunk_duration_ms = self.chunk_duration_ms;

        self.thread = Some(thread::spawn(move || {
            run_capture(
                capturing,
                paused,
                chunk_tx,
                ready_tx,
                requested_rate,
                chunk_duration_ms,
            );
        }));

        match ready_rx.await {
            Ok(Ok((sample_rate, channels))) => {
                self.negotiated = Some((sample_rate, channels));
                Ok(chunk_rx)
            }
            Ok(Err(e)) => {
                self.capturing.store(false, Ordering::SeqCst);
                self.join_thread();
                Err(e)
            }
            Err(_) => {
                self.capturing.store(false, Ordering::SeqCst);
                self.join_thread();
                Err(CaptureError::Device(
                    "capture thread exited before reporting readiness".to_string(),
                ))
            }
        }
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
        self.capturing.store(false, Ordering::SeqCst);

        if let Some(thread) = self.thread.take() {
            // Hardware teardown and the final chunk flush happen on the
            // capture thread; join it off the async runtime.
            tokio::task::spawn_blocking(move || thread.join())
                .await
                .map_err(|e| CaptureError::Device(e.to_string()))?
                .map_err(|_| CaptureError::Device("capture thread panicked".to_string()))?;
        }

        Ok(())
    }

    fn format(&self) -> ChunkFormat {
        let (sample_rate, channels) = self
            .negotiated
            .unwrap_or((self.requested_sample_rate, 1));
        ChunkFormat::Pcm {
            sample_rate,
            channels,
        }
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

impl Drop for MicDevice {
    fn drop(&mut self) {
        self.capturing.store(false, Ordering::SeqCst);
        self.join_thread();
    }
}

/// Run microphone capture on the current thread (blocking)
fn run_capture(
    capturing: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    chunk_tx: mpsc::Sender<AudioChunk>,
    ready_tx: oneshot::Sender<Result<(u32, u16), CaptureError>>,
    requested_rate: u32,
    chunk_duration_ms: u64,
) {
    let (stream, sample_rate, channels, buffer) =
        match open_input_stream(&capturing, &paused, requested_rate) {
            Ok(parts) => parts,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(CaptureError::Device(e.to_string())));
        return;
    }

    if ready_tx.send(Ok((sample_rate, channels))).is_err() {
        // Caller vanished between spawn and readiness
        return;
    }

    info!("Microphone capture started");

    let bytes_per_second = sample_rate as u64 * channels as u64 * 2;
    let chunk_bytes = ((bytes_per_second * chunk_duration_ms) / 1000).max(2) as usize;
    let mut emitted_bytes: u64 = 0;

    loop {
        let stopping = !capturing.load(Ordering::SeqCst);

        let drained: Vec<u8> = {
            let mut buf = buffer.lock().unwrap();
            if stopping {
                // Final flush: trailing buffered data must reach the session
                std::mem::take(&mut *buf)
            } else if buf.len() >= chunk_bytes {
                buf.drain(..chunk_bytes).collect()
            } else {
                Vec::new()
            }
        };

        if !drained.is_empty() {
            let timestamp_ms = emitted_bytes * 1000 / bytes_per_second;
            emitted_bytes += drained.len() as u64;
            if chunk_tx
                .try_send(AudioChunk {
                    data: drained,
                    timestamp_ms,
                })
                .is_err()
            {
                warn!("Audio chunk receiver lagging, dropping chunk");
            }
        } else if stopping {
            break;
        } else {
            thread::sleep(Duration::from_millis(50));
        }
    }

    drop(stream);
    info!("Microphone capture stopped");
}

/// Open the default input device with a config as close to the requested
/// sample rate as the hardware allows
fn open_input_stream(
    capturing: &Arc<AtomicBool>,
    paused: &Arc<AtomicBool>,
    requested_rate: u32,
) -> Result<(cpal::Stream, u32, u16, SharedBuffer), CaptureError> {
    let host = cpal::default_host();

    let device = host.default_input_device().ok_or_else(|| {
        CaptureError::DeviceUnavailable("no audio input device found".to_string())
    })?;

    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    info!("Using audio input device: {}", device_name);

    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

    // Prefer the requested rate when the device supports it; otherwise keep
    // the device default and let the finalized WAV carry the actual rate.
    let mut config: cpal::StreamConfig = supported.config();
    if config.sample_rate.0 != requested_rate {
        if let Ok(mut ranges) = device.supported_input_configs() {
            if let Some(range) = ranges.find(|r| {
                r.sample_format() == supported.sample_format()
                    && r.min_sample_rate().0 <= requested_rate
                    && requested_rate <= r.max_sample_rate().0
            }) {
                config = range
                    .with_sample_rate(cpal::SampleRate(requested_rate))
                    .config();
            } else {
                warn!(
                    "{}Hz not supported, capturing at {}Hz instead",
                    requested_rate, config.sample_rate.0
                );
            }
        }
    }

    let sample_rate = config.sample_rate.0;
    let channels = config.channels;
    info!("Audio config: {} channels, {} Hz", channels, sample_rate);

    let buffer: SharedBuffer = Arc::new(StdMutex::new(Vec::new()));
    let err_callback = |err| {
        error!("Audio stream error: {}", err);
    };

    let stream = match supported.sample_format() {
        SampleFormat::I16 => {
            let buffer = Arc::clone(&buffer);
            let capturing = Arc::clone(capturing);
            let paused = Arc::clone(paused);
            device.build_input_stream(
                &config,
                move |data: &[i16], _| {
                    if !capturing.load(Ordering::SeqCst) || paused.load(Ordering::SeqCst) {
                        return;
                    }
                    let mut buf = buffer.lock().unwrap();
                    for &sample in data {
                        buf.extend_from_slice(&sample.to_le_bytes());
                    }
                },
                err_callback,
                None,
            )
        }
        SampleFormat::F32 => {
            let buffer = Arc::clone(&buffer);
            let capturing = Arc::clone(capturing);
            let paused = Arc::clone(paused);
            device.build_input_stream(
                &config,
                move |data: &[f32], _| {
                    if !capturing.load(Ordering::SeqCst) || paused.load(Ordering::SeqCst) {
                        return;
                    }
                    let mut buf = buffer.lock().unwrap();
                    for &sample in data {
                        let sample = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
                        buf.extend_from_slice(&sample.to_le_bytes());
                    }
                },
                err_callback,
                None,
            )
        }
        other => {
            return Err(CaptureError::Device(format!(
                "unsupported sample format {:?}",
                other
            )));
        }
    }
    .map_err(|e| CaptureError::Device(e.to_string()))?;

    Ok((stream, sample_rate, channels, buffer))
}
