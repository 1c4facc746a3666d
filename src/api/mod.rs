//! Analysis service HTTP boundary
//!
//! Typed client and wire types for the six backend endpoints:
//! - POST /upload-audio, POST /process-live-recording - submit audio
//! - GET /get-history, GET /stats - server-authoritative reads
//! - DELETE /clear-history, POST /train-model - mutating actions

mod client;
mod types;

pub use client::{ApiClient, ApiError, LIVE_RECORDING_FILENAME};
pub use types::{
    AnalysisResult, FraudDetection, HistoryEntry, HistoryResponse, RiskLevel, StatsSummary,
    TrainingMetrics, TrainingOutcome,
};
