use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::state::SessionAggregateState;
use crate::api::{AnalysisResult, ApiClient, ApiError, TrainingOutcome};
use crate::capture::Recording;

/// Upload extensions the service advertises; advisory only, the server is
/// the authority on acceptance
pub const SUPPORTED_UPLOAD_EXTENSIONS: [&str; 4] = ["mp3", "wav", "flac", "m4a"];

/// Submission pipeline failures
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Another request is still processing")]
    Busy,

    #[error("Audio payload is empty")]
    EmptyPayload,

    #[error("Cannot read {path}: {source}")]
    UnreadableFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Submission failed: {0}")]
    Api(#[from] ApiError),
}

/// Failures of the thin server actions (clear, train)
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Another request is still processing")]
    Busy,

    #[error("Action failed: {0}")]
    Api(#[from] ApiError),
}

enum SubmissionKind {
    Upload { filename: String },
    LiveRecording,
}

/// Owned application context: the analysis client plus the aggregate state
///
/// Passed explicitly to whatever drives it (CLI, tests) instead of living
/// in ambient shared mutable state. Cloning shares the same underlying
/// state.
#[derive(Clone)]
pub struct AppContext {
    client: ApiClient,
    state: Arc<RwLock<SessionAggregateState>>,
}

impl AppContext {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            state: Arc::new(RwLock::new(SessionAggregateState::default())),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Current aggregate state, by value
    pub async fn snapshot(&self) -> SessionAggregateState {
        self.state.read().await.clone()
    }

    /// Clear the previous verdict when a new capture or upload begins
    pub async fn begin_analysis(&self) {
        self.state.write().await.current_result = None;
    }

    /// Submit a user-selected audio file to the analysis service
    pub async fn submit_upload(&self, path: &Path) -> Result<AnalysisResult, SubmitError> {
        if !has_supported_extension(path) {
            warn!(
                "{} is not an advertised audio format, submitting anyway; the service decides",
                path.display()
            );
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| SubmitError::UnreadableFile {
                path: path.display().to_string(),
                source,
            })?;

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        self.submit(SubmissionKind::Upload { filename }, bytes).await
    }

    /// Submit a finalized live recording to the analysis service
    pub async fn submit_recording(
        &self,
        recording: Recording,
    ) -> Result<AnalysisResult, SubmitError> {
        self.submit(SubmissionKind::LiveRecording, recording.bytes)
            .await
    }

    /// Shared submission choreography for both sources
    ///
    /// Success stores the verdict and refreshes history/stats; failure
    /// leaves the previous verdict untouched. The processing flag is
    /// cleared on every completion path, including when the post-success
    /// refresh itself fails.
    async fn submit(
        &self,
        kind: SubmissionKind,
        bytes: Vec<u8>,
    ) -> Result<AnalysisResult, SubmitError> {
        if bytes.is_empty() {
            return Err(SubmitError::EmptyPayload);
        }

        // Single-slot guard: a new submission while one is outstanding is
        // rejected rather than racing for the result slot.
        if !self.try_begin_processing().await {
            return Err(SubmitError::Busy);
        }

        let outcome = match &kind {
            SubmissionKind::Upload { filename } => {
                info!("Submitting upload '{}' ({} bytes)", filename, bytes.len());
                self.client.upload_audio(filename, bytes).await
            }
            SubmissionKind::LiveRecording => {
                info!("Submitting live recording ({} bytes)", bytes.len());
                self.client.process_live_recording(bytes).await
            }
        };

        let result = match outcome {
            Ok(result) => {
                self.state.write().await.current_result = Some(result.clone());
                self.refresh().await;
                Ok(result)
            }
            Err(e) => Err(SubmitError::Api(e)),
        };

        self.end_processing().await;
        result
    }

    /// Re-fetch history and stats so aggregate state reflects server truth
    ///
    /// The two fetches run concurrently with no ordering dependency. A
    /// fetch failure is logged and leaves the previous value in place:
    /// stale but available beats failing loudly.
    pub async fn refresh(&self) {
        let (history, stats) = futures::join!(self.client.get_history(), self.client.stats());

        let mut state = self.state.write().await;
        match history {
            Ok(history) => state.history = history,
            Err(e) => warn!("History refresh failed, keeping previous data: {}", e),
        }
        match stats {
            Ok(stats) => state.stats = Some(stats),
            Err(e) => warn!("Stats refresh failed, keeping previous data: {}", e),
        }
    }

    /// Clear all server-side history
    ///
    /// Destructive: callers must obtain explicit user confirmation before
    /// invoking this. If the server call fails, local history and stats
    /// are left untouched.
    pub async fn clear_history(&self) -> Result<(), ActionError> {
        if !self.try_begin_processing().await {
            return Err(ActionError::Busy);
        }

        let outcome = match self.client.clear_history().await {
            Ok(()) => {
                info!("History cleared");
                self.refresh().await;
                Ok(())
            }
            Err(e) => Err(ActionError::Api(e)),
        };

        self.end_processing().await;
        outcome
    }

    /// Trigger a model training run and report its metrics
    pub async fn train_model(&self) -> Result<TrainingOutcome, ActionError> {
        if !self.try_begin_processing().await {
            return Err(ActionError::Busy);
        }

        let outcome = match self.client.train_model().await {
            Ok(training) => {
                info!(
                    "Model trained, accuracy {:.2}%",
                    training.metrics.accuracy * 100.0
                );
                self.refresh().await;
                Ok(training)
            }
            Err(e) => Err(ActionError::Api(e)),
        };

        self.end_processing().await;
        outcome
    }

    async fn try_begin_processing(&self) -> bool {
        let mut state = self.state.write().await;
        if state.is_processing {
            return false;
        }
        state.is_processing = true;
        true
    }

    async fn end_processing(&self) {
        self.state.write().await.is_processing = false;
    }
}

/// Whether a path carries one of the advertised upload extensions
pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            SUPPORTED_UPLOAD_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}
