pub mod binding;
pub mod config;
pub mod dsp;
pub mod error;
pub mod input;
pub mod instrument;
pub mod mood;
pub mod rhythm;
pub mod sequencer;
pub mod session;
pub mod timer;
pub mod wasm;

pub use config::{AppConfig, EngineConfig, SessionConfig};
pub use dsp::engine::{AudioEngine, EngineState, EngineStatus, NoteRequest, PlayedNote};
pub use error::{KeysongError, Result};
pub use instrument::InstrumentId;
pub use mood::Mood;
pub use rhythm::RhythmSnapshot;
pub use session::RhythmSession;

use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the keysong-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: the supported mood ids.
#[wasm_bindgen]
pub fn mood_ids() -> Vec<String> {
    Mood::ALL.iter().map(|m| m.as_str().to_string()).collect()
}

/// WASM-exposed: the catalogued instrument ids.
#[wasm_bindgen]
pub fn instrument_ids() -> Vec<String> {
    InstrumentId::ALL
        .iter()
        .map(|i| i.as_str().to_string())
        .collect()
}
