//! # Audio Acquisition
//!
//! Everything that happens to the audio before it reaches the model:
//! download it, normalize it with ffmpeg, and read the normalized PCM back.
//!
//! ## Audio Format Produced:
//! - **Sample Rate**: 16kHz (16,000 Hz)
//! - **Bit Depth**: 16-bit PCM
//! - **Channels**: Mono (1 channel)
//!
//! All files live inside a [`RequestWorkspace`], which removes them when the
//! request finishes, whatever the outcome.

pub mod fetcher;     // HTTP download of the source audio
pub mod transcoder;  // ffmpeg invocation
pub mod waveform;    // WAV → f32 samples
pub mod workspace;   // Request-scoped temporary directory

pub use fetcher::AudioFetcher;
pub use transcoder::Transcoder;
pub use waveform::read_waveform;
pub use workspace::RequestWorkspace;
