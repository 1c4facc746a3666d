//! Live capture session management
//!
//! This module provides the `CaptureSession` state machine that manages:
//! - One recording lifecycle (start/pause/resume/stop) over an abstract
//!   recorder device
//! - Chunk accumulation and finalization into a single in-memory recording
//! - Elapsed-time tracking, active only while recording
//!
//! The platform recording primitive is hidden behind the `RecorderDevice`
//! trait; `MicDevice` (cpal) and `ReplayDevice` (file playback) are the
//! shipped drivers.

mod clock;
mod device;
mod mic;
mod replay;
mod session;

pub use clock::{format_elapsed, ElapsedClock};
pub use device::{AudioChunk, CaptureError, ChunkFormat, RecorderDevice};
pub use mic::MicDevice;
pub use replay::ReplayDevice;
pub use session::{CaptureSession, CaptureState, Recording};
