use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use super::types::{AnalysisResult, HistoryEntry, HistoryResponse, StatsSummary, TrainingOutcome};

/// Wire filename for live-recording submissions; the service keys on this
/// name regardless of the actual container
pub const LIVE_RECORDING_FILENAME: &str = "recording.mp3";

/// Errors from the analysis service boundary
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

/// HTTP client for the fraud-call analysis service
///
/// One method per endpoint, no automatic retries: every retry is a manual
/// user-initiated repeat of the action.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    /// Create a client for the given service root
    ///
    /// No request timeout is set: the contract enforces none client-side,
    /// and a slow analysis simply holds the processing flag until the call
    /// resolves.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST /upload-audio: analyze a user-selected audio file
    pub async fn upload_audio(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<AnalysisResult, ApiError> {
        self.post_audio("/upload-audio", filename, bytes).await
    }

    /// POST /process-live-recording: analyze a finalized live capture
    pub async fn process_live_recording(
        &self,
        bytes: Vec<u8>,
    ) -> Result<AnalysisResult, ApiError> {
        self.post_audio("/process-live-recording", LIVE_RECORDING_FILENAME, bytes)
            .await
    }

    async fn post_audio(
        &self,
        path: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<AnalysisResult, ApiError> {
        debug!("POST {} ({} bytes as {})", path, bytes.len(), filename);

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_for(filename))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self.client.post(self.url(path)).multipart(form).send().await?;
        Self::decode(response).await
    }

    /// GET /get-history: full server-side analysis history
    pub async fn get_history(&self) -> Result<Vec<HistoryEntry>, ApiError> {
        let response = self.client.get(self.url("/get-history")).send().await?;
        let envelope: HistoryResponse = Self::decode(response).await?;
        Ok(envelope.history)
    }

    /// GET /stats: service-side counters
    pub async fn stats(&self) -> Result<StatsSummary, ApiError> {
        let response = self.client.get(self.url("/stats")).send().await?;
        Self::decode(response).await
    }

    /// DELETE /clear-history: body ignored, 2xx is success
    pub async fn clear_history(&self) -> Result<(), ApiError> {
        let response = self.client.delete(self.url("/clear-history")).send().await?;
        Self::check_status(response).await.map(|_| ())
    }

    /// POST /train-model
    pub async fn train_model(&self) -> Result<TrainingOutcome, ApiError> {
        let response = self.client.post(self.url("/train-model")).send().await?;
        Self::decode(response).await
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(ApiError::Server { status, message })
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let response = Self::check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

/// Content type for an audio filename, falling back to a generic binary
/// type for anything unrecognized
fn mime_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit('.')
        .next()
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_for_known_extensions() {
        assert_eq!(mime_for("call.mp3"), "audio/mpeg");
        assert_eq!(mime_for("CALL.WAV"), "audio/wav");
        assert_eq!(mime_for("a.b.flac"), "audio/flac");
        assert_eq!(mime_for("voicemail.m4a"), "audio/mp4");
        assert_eq!(mime_for("mystery.ogg"), "application/octet-stream");
        assert_eq!(mime_for("noextension"), "application/octet-stream");
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let client = ApiClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/stats"), "http://localhost:8000/stats");
    }
}
