//! Configuration for the speech backends

use std::path::PathBuf;

use pricing::AzureTier;
use serde::{Deserialize, Serialize};

/// Configuration for the baseline local engine (eSpeak NG)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Explicit engine executable; auto-detected when unset
    #[serde(default)]
    pub command: Option<PathBuf>,

    /// Default voice when neither the request nor the manager selects one
    #[serde(default)]
    pub default_voice: Option<String>,

    /// Base speaking rate in words per minute
    #[serde(default = "default_rate_wpm")]
    pub rate_wpm: u32,
}

const fn default_rate_wpm() -> u32 {
    175
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            command: None,
            default_voice: None,
            rate_wpm: default_rate_wpm(),
        }
    }
}

impl SystemConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        // eSpeak NG clamps outside this range; reject instead of surprising
        if !(80..=450).contains(&self.rate_wpm) {
            return Err(format!(
                "rate_wpm must be between 80 and 450, got {}",
                self.rate_wpm
            ));
        }
        Ok(())
    }
}

/// Configuration for the Google Cloud Text-to-Speech backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL (overridable for custom endpoints and tests)
    #[serde(default = "default_google_base_url")]
    pub base_url: String,

    /// Default voice for synthesis
    #[serde(default = "default_google_voice")]
    pub default_voice: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_google_base_url() -> String {
    "https://texttospeech.googleapis.com/v1".to_string()
}

fn default_google_voice() -> String {
    "en-US-Standard-C".to_string()
}

const fn default_timeout_ms() -> u64 {
    30000 // 30 seconds
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_google_base_url(),
            default_voice: default_google_voice(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl GoogleConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.as_deref().is_some_and(str::is_empty) {
            return Err("API key must not be empty".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Configuration for the Azure Cognitive Services Speech backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    /// Subscription key
    #[serde(default)]
    pub subscription_key: Option<String>,

    /// Service region (e.g. "eastus", "westeurope")
    #[serde(default = "default_azure_region")]
    pub region: String,

    /// Endpoint override; when unset the endpoint is derived from the region
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Default voice for synthesis
    #[serde(default = "default_azure_voice")]
    pub default_voice: String,

    /// Output format passed via `X-Microsoft-OutputFormat`
    #[serde(default = "default_azure_output_format")]
    pub output_format: String,

    /// Subscription pricing tier, which decides the billing rule
    #[serde(default)]
    pub tier: AzureTier,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_azure_region() -> String {
    "eastus".to_string()
}

fn default_azure_voice() -> String {
    "en-US-JennyNeural".to_string()
}

fn default_azure_output_format() -> String {
    "audio-24khz-48kbitrate-mono-mp3".to_string()
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            subscription_key: None,
            region: default_azure_region(),
            endpoint: None,
            default_voice: default_azure_voice(),
            output_format: default_azure_output_format(),
            tier: AzureTier::default(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AzureConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.subscription_key.as_deref().is_some_and(str::is_empty) {
            return Err("Subscription key must not be empty".to_string());
        }
        if self.region.is_empty() && self.endpoint.is_none() {
            return Err("Either a region or an explicit endpoint is required".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Base of the Cognitive Services endpoints for this subscription
    #[must_use]
    pub fn endpoint_base(&self) -> String {
        self.endpoint.clone().unwrap_or_else(|| {
            format!(
                "https://{}.tts.speech.microsoft.com/cognitiveservices",
                self.region
            )
        })
    }

    /// Synthesis endpoint URL
    #[must_use]
    pub fn synthesis_url(&self) -> String {
        format!("{}/v1", self.endpoint_base())
    }

    /// Voice inventory endpoint URL
    #[must_use]
    pub fn voices_url(&self) -> String {
        format!("{}/voices/list", self.endpoint_base())
    }
}
