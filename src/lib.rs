pub mod api;
pub mod app;
pub mod capture;
pub mod config;

pub use api::{
    AnalysisResult, ApiClient, ApiError, FraudDetection, HistoryEntry, RiskLevel, StatsSummary,
    TrainingOutcome,
};
pub use app::{AppContext, SessionAggregateState};
pub use capture::{
    format_elapsed, AudioChunk, CaptureError, CaptureSession, CaptureState, ChunkFormat,
    MicDevice, RecorderDevice, Recording, ReplayDevice,
};
pub use config::Config;
