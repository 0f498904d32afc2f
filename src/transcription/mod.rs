//! # Transcription Module
//!
//! Speech-to-text with Whisper models via the candle framework, in pure Rust
//! (no whisper.cpp bindings).
//!
//! ## Whisper Model Sizes (multilingual checkpoints):
//! - **openai/whisper-tiny**: ~39MB, fastest but least accurate
//! - **openai/whisper-base**: ~74MB, the default
//! - **openai/whisper-small**: ~244MB, better accuracy
//! - **openai/whisper-medium**: ~769MB, good for noisy or accented speech
//! - **openai/whisper-large-v3**: ~1550MB, best accuracy but slowest

pub mod engine;  // Recognizer trait, segments, Whisper-backed engine
pub mod model;   // candle model loading and decoding

pub use engine::{join_segments, Segment, SpeechRecognizer, WhisperEngine};
