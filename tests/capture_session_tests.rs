// Integration tests for the capture session state machine
//
// A scripted fake device implements RecorderDevice so transitions, chunk
// accumulation, and resource release can be verified without any real
// recording hardware.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use callsentry::capture::{
    AudioChunk, CaptureError, CaptureSession, CaptureState, ChunkFormat, RecorderDevice,
};
use tokio::sync::mpsc;

/// Test-side handle for driving a ScriptedDevice owned by a session
#[derive(Clone)]
struct DeviceProbe {
    sender: Arc<Mutex<Option<mpsc::Sender<AudioChunk>>>>,
    starts: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl DeviceProbe {
    fn new() -> Self {
        Self {
            sender: Arc::new(Mutex::new(None)),
            starts: Arc::new(AtomicUsize::new(0)),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    async fn emit(&self, data: &[u8], timestamp_ms: u64) {
        let tx = self
            .sender
            .lock()
            .unwrap()
            .clone()
            .expect("device not started");
        tx.send(AudioChunk {
            data: data.to_vec(),
            timestamp_ms,
        })
        .await
        .expect("session stopped draining");
    }

    fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

struct ScriptedDevice {
    probe: DeviceProbe,
    format: ChunkFormat,
    fail_start: bool,
    /// Chunks the device flushes during stop, after the stop request but
    /// before dropping its sender
    trailing_flush: Vec<Vec<u8>>,
}

impl ScriptedDevice {
    fn new(format: ChunkFormat) -> (Self, DeviceProbe) {
        let probe = DeviceProbe::new();
        (
            Self {
                probe: probe.clone(),
                format,
                fail_start: false,
                trailing_flush: Vec::new(),
            },
            probe,
        )
    }

    fn encoded() -> (Self, DeviceProbe) {
        Self::new(ChunkFormat::Encoded {
            extension: "mp3".to_string(),
        })
    }

    fn unavailable() -> (Self, DeviceProbe) {
        let (mut device, probe) = Self::encoded();
        device.fail_start = true;
        (device, probe)
    }

    fn with_trailing_flush(mut self, chunks: Vec<Vec<u8>>) -> Self {
        self.trailing_flush = chunks;
        self
    }
}

#[async_trait::async_trait]
impl RecorderDevice for ScriptedDevice {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>, CaptureError> {
        if self.fail_start {
            return Err(CaptureError::DeviceUnavailable(
                "microphone permission denied".to_string(),
            ));
        }

        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(64);
        *self.probe.sender.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn pause(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        let tx = self.probe.sender.lock().unwrap().take();
        if let Some(tx) = tx {
            for data in self.trailing_flush.drain(..) {
                let _ = tx
                    .send(AudioChunk {
                        data,
                        timestamp_ms: 0,
                    })
                    .await;
            }
        }
        self.probe.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn format(&self) -> ChunkFormat {
        self.format.clone()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

impl Drop for ScriptedDevice {
    fn drop(&mut self) {
        // A still-armed sender means stop never ran; release on drop like a
        // real device would.
        if self.probe.sender.lock().unwrap().take().is_some() {
            self.probe.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Wait until the session has drained at least `n` chunks
async fn wait_for_chunks(session: &CaptureSession, n: usize) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while session.chunk_count().await < n {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("chunks never arrived");
}

#[tokio::test]
async fn test_valid_transition_sequence() {
    let (device, probe) = ScriptedDevice::encoded();
    let mut session = CaptureSession::new(Box::new(device));

    assert_eq!(session.state(), CaptureState::Idle);

    session.start().await.unwrap();
    assert_eq!(session.state(), CaptureState::Recording);

    session.pause().await.unwrap();
    assert_eq!(session.state(), CaptureState::Paused);

    session.resume().await.unwrap();
    assert_eq!(session.state(), CaptureState::Recording);

    let recording = session.stop().await.unwrap();
    assert_eq!(session.state(), CaptureState::Idle);
    assert_eq!(recording.extension, "mp3");
    assert_eq!(probe.release_count(), 1);
}

#[tokio::test]
async fn test_invalid_transitions_are_state_preserving_noops() {
    let (device, probe) = ScriptedDevice::encoded();
    let mut session = CaptureSession::new(Box::new(device));

    // Nothing to pause, resume, or stop yet
    session.pause().await.unwrap();
    assert_eq!(session.state(), CaptureState::Idle);
    session.resume().await.unwrap();
    assert_eq!(session.state(), CaptureState::Idle);
    assert!(matches!(
        session.stop().await,
        Err(CaptureError::NotActive)
    ));
    assert_eq!(session.state(), CaptureState::Idle);

    session.start().await.unwrap();

    // Redundant start must not open a second device handle
    session.start().await.unwrap();
    assert_eq!(probe.start_count(), 1);
    assert_eq!(session.state(), CaptureState::Recording);

    // Resume only applies when paused
    session.resume().await.unwrap();
    assert_eq!(session.state(), CaptureState::Recording);

    session.pause().await.unwrap();
    session.pause().await.unwrap();
    assert_eq!(session.state(), CaptureState::Paused);

    // Stop is valid from Paused
    session.stop().await.unwrap();
    assert_eq!(session.state(), CaptureState::Idle);
    assert_eq!(probe.release_count(), 1);
}

#[tokio::test]
async fn test_chunks_accumulate_and_trailing_flush_is_kept() {
    let (device, probe) = ScriptedDevice::encoded();
    let device = device.with_trailing_flush(vec![b"gh".to_vec()]);
    let mut session = CaptureSession::new(Box::new(device));

    session.start().await.unwrap();
    probe.emit(b"abc", 0).await;
    probe.emit(b"def", 250).await;
    wait_for_chunks(&session, 2).await;

    // Stopping must not drop the trailing data the device flushes on the
    // way down
    let recording = session.stop().await.unwrap();
    assert_eq!(recording.bytes, b"abcdefgh");
    assert_eq!(probe.release_count(), 1);
}

#[tokio::test]
async fn test_device_released_once_even_when_finalization_fails() {
    let (device, probe) = ScriptedDevice::new(ChunkFormat::Pcm {
        sample_rate: 16000,
        channels: 1,
    });
    // Odd-length PCM flush forces the finalization integrity check to fail
    let device = device.with_trailing_flush(vec![vec![0x01, 0x02, 0x03]]);
    let mut session = CaptureSession::new(Box::new(device));

    session.start().await.unwrap();
    let err = session.stop().await.unwrap_err();

    assert!(matches!(err, CaptureError::Finalize(_)));
    assert_eq!(probe.release_count(), 1, "release must happen exactly once");
    assert_eq!(session.state(), CaptureState::Idle);

    // The session is restartable after the failed finalization
    session.start().await.unwrap();
    assert_eq!(session.state(), CaptureState::Recording);
    assert_eq!(probe.start_count(), 2);
    session.stop().await.unwrap();
    assert_eq!(probe.release_count(), 2);
}

#[tokio::test]
async fn test_unavailable_device_leaves_session_idle() {
    let (device, probe) = ScriptedDevice::unavailable();
    let mut session = CaptureSession::new(Box::new(device));

    let err = session.start().await.unwrap_err();
    assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
    assert_eq!(session.state(), CaptureState::Idle);
    assert_eq!(session.elapsed_seconds(), 0);
    assert_eq!(probe.release_count(), 0, "nothing was acquired");
}

#[tokio::test(start_paused = true)]
async fn test_elapsed_seconds_follow_recording_state() {
    let (device, _probe) = ScriptedDevice::encoded();
    let mut session = CaptureSession::new(Box::new(device));

    session.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(session.elapsed_seconds(), 3);

    session.pause().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(session.elapsed_seconds(), 3, "paused time must not count");

    session.resume().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(session.elapsed_seconds(), 4);

    let recording = session.stop().await.unwrap();
    assert_eq!(recording.duration_seconds, 4);

    // Frozen after stop, no stray ticks
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(session.elapsed_seconds(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_new_session_start_resets_elapsed_and_chunks() {
    let (device, probe) = ScriptedDevice::encoded();
    let mut session = CaptureSession::new(Box::new(device));

    session.start().await.unwrap();
    probe.emit(b"old", 0).await;
    wait_for_chunks(&session, 1).await;
    tokio::time::sleep(Duration::from_millis(2500)).await;
    session.stop().await.unwrap();
    assert_eq!(session.elapsed_seconds(), 2);

    session.start().await.unwrap();
    assert_eq!(session.elapsed_seconds(), 0);
    assert_eq!(session.chunk_count().await, 0);

    probe.emit(b"new", 0).await;
    wait_for_chunks(&session, 1).await;
    let recording = session.stop().await.unwrap();
    assert_eq!(recording.bytes, b"new");
}
