//! Session and engine configuration, loaded from camelCase JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KeysongError, Result};
use crate::instrument::InstrumentId;

/// Per-session options supplied by the surrounding UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub selected_instruments: Vec<InstrumentId>,
    pub enable_instrumental_sounds: bool,
    pub accessibility_mode: bool,
    pub throttle_rapid_typing: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            selected_instruments: vec![InstrumentId::Piano],
            enable_instrumental_sounds: true,
            accessibility_mode: false,
            throttle_rapid_typing: false,
        }
    }
}

/// Wire shape: instrument ids stay strings until validated so unknown ids
/// surface as `UnknownInstrument` rather than a generic parse error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSessionConfig {
    selected_instruments: Vec<String>,
    enable_instrumental_sounds: bool,
    accessibility_mode: bool,
    throttle_rapid_typing: bool,
}

impl Default for RawSessionConfig {
    fn default() -> Self {
        let d = SessionConfig::default();
        RawSessionConfig {
            selected_instruments: d
                .selected_instruments
                .iter()
                .map(|id| id.as_str().to_string())
                .collect(),
            enable_instrumental_sounds: d.enable_instrumental_sounds,
            accessibility_mode: d.accessibility_mode,
            throttle_rapid_typing: d.throttle_rapid_typing,
        }
    }
}

impl TryFrom<RawSessionConfig> for SessionConfig {
    type Error = KeysongError;

    fn try_from(raw: RawSessionConfig) -> Result<Self> {
        let selected_instruments = raw
            .selected_instruments
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<InstrumentId>>>()?;
        Ok(SessionConfig {
            selected_instruments,
            enable_instrumental_sounds: raw.enable_instrumental_sounds,
            accessibility_mode: raw.accessibility_mode,
            throttle_rapid_typing: raw.throttle_rapid_typing,
        })
    }
}

impl<'de> Deserialize<'de> for SessionConfig {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = RawSessionConfig::deserialize(d)?;
        SessionConfig::try_from(raw).map_err(serde::de::Error::custom)
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawSessionConfig = serde_json::from_str(json)?;
        SessionConfig::try_from(raw)
    }
}

/// Rendering options for the audio engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    /// Frames per render quantum; timers fire at block boundaries.
    pub block_size: usize,
    /// Cap on simultaneously sounding note oscillators.
    pub max_voices: usize,
    pub reverb_mix: f64,
    /// Seed for noise and drum randomness.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: 44_100,
            block_size: 128,
            max_voices: 64,
            reverb_mix: 0.25,
            seed: 0x6b65_7973,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        EngineConfig {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Err(KeysongError::invalid_config(format!(
                "sampleRate {} outside 8000..=192000",
                self.sample_rate
            )));
        }
        if self.block_size == 0 || self.block_size > 8_192 {
            return Err(KeysongError::invalid_config(format!(
                "blockSize {} outside 1..=8192",
                self.block_size
            )));
        }
        if self.max_voices == 0 {
            return Err(KeysongError::invalid_config("maxVoices must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.reverb_mix) {
            return Err(KeysongError::invalid_config(format!(
                "reverbMix {} outside 0..=1",
                self.reverb_mix
            )));
        }
        Ok(())
    }
}

/// Config file for the renderer: `{"session": {...}, "engine": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.engine.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
