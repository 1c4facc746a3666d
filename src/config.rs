use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Root URL of the analysis service
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Preferred microphone sample rate in Hz
    pub sample_rate: u32,
    /// Duration of each captured chunk in milliseconds
    pub chunk_duration_ms: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                base_url: "http://localhost:8000".to_string(),
            },
            capture: CaptureConfig {
                sample_rate: 16000,
                chunk_duration_ms: 250,
            },
        }
    }
}
