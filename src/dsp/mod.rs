//! DSP Engine: Pure Rust audio synthesis for the ambient bed and the
//! keystroke notes.
//!
//! The same code powers both the browser (AudioWorklet + WASM) and the CLI
//! renderer (offline WAV export).

pub mod drums;
pub mod engine;
pub mod envelope;
pub mod filter;
pub mod graph;
pub mod mixer;
pub mod noise;
pub mod oscillator;
pub mod param;
pub mod pitch;
pub mod renderer;
pub mod reverb;
pub mod voice;
