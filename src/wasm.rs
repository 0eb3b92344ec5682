//! Browser surface: one engine plus one rhythm session behind a
//! `wasm-bindgen` object, driven by an AudioWorklet host.
//!
//! Host timestamps arrive as `performance.now()` milliseconds.

use wasm_bindgen::prelude::*;

use crate::config::{EngineConfig, SessionConfig};
use crate::dsp::engine::AudioEngine;
use crate::dsp::renderer;
use crate::input::InputKind;
use crate::session::{InputOutcome, RhythmSession};

fn js_err<E: std::fmt::Display>(e: E) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(js_err)
}

fn millis(now_ms: f64) -> u64 {
    if now_ms.is_finite() { now_ms.max(0.0) as u64 } else { 0 }
}

#[wasm_bindgen]
pub struct KeysongSession {
    engine: AudioEngine,
    session: RhythmSession,
}

#[wasm_bindgen]
impl KeysongSession {
    /// `config_json` is a session config (`selectedInstruments`, ...); pass
    /// `"{}"` for defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: u32, config_json: &str) -> Result<KeysongSession, JsValue> {
        let session = SessionConfig::from_json(config_json).map_err(js_err)?;
        let engine = AudioEngine::new(EngineConfig::with_sample_rate(sample_rate)).map_err(js_err)?;
        Ok(KeysongSession {
            engine,
            session: RhythmSession::new(session),
        })
    }

    pub fn start(&mut self, mood: &str) -> Result<(), JsValue> {
        self.engine.start(mood).map_err(js_err)
    }

    pub fn stop(&mut self) {
        self.engine.stop();
    }

    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&mut self, volume: f64) {
        self.engine.set_volume(volume);
    }

    /// `{isPlaying, mood, volume, state}`.
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> Result<JsValue, JsValue> {
        to_js(&self.engine.get_state())
    }

    #[wasm_bindgen(js_name = updateConfig)]
    pub fn update_config(&mut self, config_json: &str) -> Result<(), JsValue> {
        let config = SessionConfig::from_json(config_json).map_err(js_err)?;
        self.session.set_config(config);
        Ok(())
    }

    #[wasm_bindgen(js_name = setActive)]
    pub fn set_active(&mut self, active: bool, now_ms: f64) {
        self.session.set_active(active, millis(now_ms));
    }

    /// Returns `{update, note}`.
    #[wasm_bindgen(js_name = keyDown)]
    pub fn key_down(&mut self, now_ms: f64) -> Result<JsValue, JsValue> {
        let outcome = self.input(InputKind::Keystroke, now_ms);
        to_js(&outcome)
    }

    pub fn click(&mut self, now_ms: f64) {
        self.input(InputKind::Click, now_ms);
    }

    #[wasm_bindgen(js_name = mouseMove)]
    pub fn mouse_move(&mut self, now_ms: f64) {
        self.input(InputKind::Move, now_ms);
    }

    /// Advance the host clock; returns the rhythm update or `undefined`.
    pub fn tick(&mut self, now_ms: f64) -> Result<JsValue, JsValue> {
        match self.session.advance(millis(now_ms), &mut self.engine) {
            Some(update) => to_js(&update),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    /// Render the next `frames` mono samples.
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        self.engine.render_frames(frames)
    }

    /// Render `seconds` of output as WAV bytes.
    #[wasm_bindgen(js_name = renderWav)]
    pub fn render_wav(&mut self, seconds: f64) -> Result<Vec<u8>, JsValue> {
        let samples = renderer::render_seconds(&mut self.engine, seconds);
        renderer::encode_wav(&samples, self.engine.config().sample_rate).map_err(js_err)
    }
}

impl KeysongSession {
    fn input(&mut self, kind: InputKind, now_ms: f64) -> InputOutcome {
        self.session.on_input(kind, millis(now_ms), &mut self.engine)
    }
}
