//! Synthesis request resolution
//!
//! Every field resolves as: explicit override, then stored options, then
//! stored config, then the compiled-in default.

use super::layered::{float_or_default, resolve_first, LayeredSettings, SettingsLayer};
use super::payload::SynthesisPayload;
use crate::config::SynthesisConfig;

pub const CONF_API_URL: &str = "url";
pub const CONF_VOICE: &str = "voice";
pub const CONF_TEMPERATURE: &str = "temperature";
pub const CONF_REPETITION_PENALTY: &str = "repetition_penalty";
pub const CONF_STREAMING: &str = "streaming";

pub const DEFAULT_URL: &str = "http://localhost:8080/v1/tts";
pub const DEFAULT_VOICE: &str = "cyn2";
pub const DEFAULT_TEMPERATURE: f64 = 0.95;
pub const DEFAULT_REPETITION_PENALTY: f64 = 1.1;
pub const DEFAULT_STREAMING: bool = false;

/// Fully resolved parameters for one text-to-audio conversion
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    text: String,
    voice: String,
    temperature: f64,
    repetition_penalty: f64,
    streaming: bool,
    endpoint_url: String,
}

impl SynthesisRequest {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn repetition_penalty(&self) -> f64 {
        self.repetition_penalty
    }

    pub fn streaming(&self) -> bool {
        self.streaming
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// Upstream JSON payload for this request
    pub fn payload(&self) -> SynthesisPayload<'_> {
        SynthesisPayload::new(
            &self.text,
            &self.voice,
            self.temperature,
            self.repetition_penalty,
            self.streaming,
        )
    }
}

/// Per-call overrides; `None` defers to the stored layers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisOverrides {
    pub voice: Option<String>,
    pub temperature: Option<f64>,
    pub repetition_penalty: Option<f64>,
    pub streaming: Option<bool>,
    pub endpoint_url: Option<String>,
}

impl SynthesisOverrides {
    pub fn streaming(streaming: bool) -> Self {
        Self {
            streaming: Some(streaming),
            ..Self::default()
        }
    }
}

/// Builds [`SynthesisRequest`]s against the stored options/config layers
#[derive(Debug, Clone)]
pub struct RequestBuilder<'a> {
    settings: LayeredSettings<'a>,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(options: &'a SettingsLayer, config: &'a SettingsLayer) -> Self {
        Self {
            settings: LayeredSettings::new(vec![options, config]),
        }
    }

    pub fn from_config(synthesis: &'a SynthesisConfig) -> Self {
        Self::new(&synthesis.options, &synthesis.config)
    }

    /// Resolve all parameters for `text`. Never fails.
    ///
    /// The text is used verbatim, including when empty.
    pub fn build(&self, text: impl Into<String>, overrides: &SynthesisOverrides) -> SynthesisRequest {
        let voice = resolve_first(
            [non_empty(overrides.voice.as_deref())],
            self.settings.string(CONF_VOICE, DEFAULT_VOICE),
        );
        let temperature = resolve_first(
            [overrides
                .temperature
                .map(|t| float_or_default(t, DEFAULT_TEMPERATURE))],
            self.settings.float(CONF_TEMPERATURE, DEFAULT_TEMPERATURE),
        );
        let repetition_penalty = resolve_first(
            [overrides
                .repetition_penalty
                .map(|p| float_or_default(p, DEFAULT_REPETITION_PENALTY))],
            self.settings
                .float(CONF_REPETITION_PENALTY, DEFAULT_REPETITION_PENALTY),
        );
        let streaming = resolve_first(
            [overrides.streaming],
            self.settings.flag(CONF_STREAMING, DEFAULT_STREAMING),
        );
        let endpoint_url = resolve_first(
            [non_empty(overrides.endpoint_url.as_deref()).map(|url| endpoint_or_default(&url))],
            endpoint_or_default(&self.settings.string(CONF_API_URL, DEFAULT_URL)),
        );

        SynthesisRequest {
            text: text.into(),
            voice,
            temperature,
            repetition_penalty,
            streaming,
            endpoint_url,
        }
    }

    /// Parameters an empty call would resolve to
    pub fn defaults(&self) -> SynthesisRequest {
        self.build(String::new(), &SynthesisOverrides::default())
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Absolute http(s) URL, or the default endpoint
fn endpoint_or_default(candidate: &str) -> String {
    match url::Url::parse(candidate) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
            candidate.to_string()
        }
        _ => {
            tracing::debug!(endpoint = %candidate, "Ignoring unusable endpoint URL, using default");
            DEFAULT_URL.to_string()
        }
    }
}
