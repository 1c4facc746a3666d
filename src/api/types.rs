use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fraud verdict attached to an analysis when transcription succeeded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudDetection {
    pub is_fraud: bool,

    /// Classifier confidence in [0, 1]
    pub confidence: f64,

    pub risk_level: RiskLevel,

    /// Phrases or patterns the classifier flagged
    #[serde(default)]
    pub fraud_indicators: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        };
        write!(f, "{}", name)
    }
}

/// Analysis verdict returned per submission
///
/// A result with an empty transcript and no fraud verdict is a valid
/// terminal outcome (transcription failed upstream); no cross-field
/// invariant is enforced between `transcript` and `transcription_error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub transcript: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription_error: Option<String>,

    /// Absent only when transcription failed upstream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fraud_detection: Option<FraudDetection>,
}

/// A past analysis as stored by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub filename: String,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub transcript: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription_error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fraud_detection: Option<FraudDetection>,
}

/// Envelope for GET /get-history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Service-side counters from GET /stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSummary {
    pub audio_files: u64,
    pub transcripts: u64,
    pub history_records: u64,
    pub model_trained: bool,
}

/// Response from POST /train-model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub metrics: TrainingMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Model accuracy in [0, 1]
    pub accuracy: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_result_deserialization() {
        let json = r#"{
            "transcript": "hello",
            "fraud_detection": {
                "is_fraud": true,
                "confidence": 0.92,
                "risk_level": "HIGH",
                "fraud_indicators": ["urgency"]
            }
        }"#;

        let result: AnalysisResult = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(result.transcript, "hello");
        assert!(result.transcription_error.is_none());

        let fd = result.fraud_detection.expect("fraud_detection present");
        assert!(fd.is_fraud);
        assert!((fd.confidence - 0.92).abs() < f64::EPSILON);
        assert_eq!(fd.risk_level, RiskLevel::High);
        assert_eq!(fd.fraud_indicators, vec!["urgency".to_string()]);
    }

    #[test]
    fn test_analysis_result_transcription_failure() {
        // Failed transcription: no verdict, error message instead
        let json = r#"{"transcript": "", "transcription_error": "no speech detected"}"#;

        let result: AnalysisResult = serde_json::from_str(json).expect("Failed to deserialize");
        assert!(result.transcript.is_empty());
        assert_eq!(
            result.transcription_error.as_deref(),
            Some("no speech detected")
        );
        assert!(result.fraud_detection.is_none());
    }

    #[test]
    fn test_risk_level_wire_names() {
        assert_eq!(
            serde_json::to_string(&RiskLevel::Medium).unwrap(),
            r#""MEDIUM""#
        );
        let level: RiskLevel = serde_json::from_str(r#""LOW""#).unwrap();
        assert_eq!(level, RiskLevel::Low);
    }

    #[test]
    fn test_history_response_envelope() {
        let json = r#"{
            "history": [{
                "filename": "call-017.mp3",
                "timestamp": "2025-11-03T14:22:05Z",
                "transcript": "please wire the funds today",
                "fraud_detection": {
                    "is_fraud": true,
                    "confidence": 0.88,
                    "risk_level": "MEDIUM",
                    "fraud_indicators": []
                }
            }]
        }"#;

        let response: HistoryResponse = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(response.history.len(), 1);
        assert_eq!(response.history[0].filename, "call-017.mp3");
        assert_eq!(
            response.history[0].timestamp,
            "2025-11-03T14:22:05Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn test_empty_history_envelope() {
        let response: HistoryResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(response.history.is_empty());
    }

    #[test]
    fn test_stats_summary_deserialization() {
        let json = r#"{
            "audio_files": 12,
            "transcripts": 11,
            "history_records": 12,
            "model_trained": false
        }"#;

        let stats: StatsSummary = serde_json::from_str(json).unwrap();
        assert_eq!(stats.audio_files, 12);
        assert_eq!(stats.transcripts, 11);
        assert_eq!(stats.history_records, 12);
        assert!(!stats.model_trained);
    }

    #[test]
    fn test_training_outcome_ignores_extra_metrics() {
        let json = r#"{"metrics": {"accuracy": 0.97, "f1": 0.95}}"#;
        let outcome: TrainingOutcome = serde_json::from_str(json).unwrap();
        assert!((outcome.metrics.accuracy - 0.97).abs() < f64::EPSILON);
    }
}
