//! # Whisper Model
//!
//! Loads a Whisper checkpoint from the Hugging Face hub and runs greedy
//! decoding over 30-second windows of 16kHz mono audio with candle.
//!
//! ## Model Loading Process:
//! 1. Resolve `config.json`, `tokenizer.json` and `model.safetensors` through
//!    the local hub cache (downloading on first use)
//! 2. Build the mel filter bank for the checkpoint's mel bin count
//! 3. Memory-map the weights onto the selected device
//!
//! ## Decoding:
//! Each window is encoded once, then decoded token by token with the prompt
//! `<|startoftranscript|> <|lang|> <|transcribe|> <|notimestamps|>` until
//! end-of-text, the token budget, or a repetition loop.

use crate::transcription::engine::Segment;
use anyhow::{anyhow, Result};
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use hf_hub::api::tokio::ApiBuilder;
use hf_hub::{Repo, RepoType};
use tokenizers::Tokenizer;

/// A loaded Whisper model ready for transcription.
///
/// Decoding mutates the decoder's key/value cache, so callers need `&mut`
/// access; the engine serializes calls through a mutex.
pub struct WhisperModel {
    model: m::model::Whisper,
    config: Config,
    device: Device,
    tokenizer: Tokenizer,
    mel_filters: Vec<f32>,
}

impl WhisperModel {
    /// Load a Whisper model from the Hugging Face hub.
    ///
    /// ## Environment Variables honoured:
    /// - `HF_TOKEN`: Access token for gated or private repositories
    /// - `HF_HUB_CACHE` / `HF_HOME`: Where downloaded files are cached
    pub async fn load(repo_id: &str, revision: &str, device: Device) -> Result<Self> {
        tracing::info!(repo = %repo_id, revision = %revision, "Loading Whisper model...");
        let start_time = std::time::Instant::now();

        let mut builder = ApiBuilder::new()
            .with_progress(false)
            .with_token(std::env::var("HF_TOKEN").ok());
        if let Ok(cache_dir) = std::env::var("HF_HUB_CACHE") {
            builder = builder.with_cache_dir(cache_dir.into());
        } else if let Ok(hf_home) = std::env::var("HF_HOME") {
            builder = builder.with_cache_dir(std::path::PathBuf::from(hf_home).join("hub"));
        }
        let api = builder.build()?;

        let repo = api.repo(Repo::with_revision(
            repo_id.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));

        let config_filename = repo
            .get("config.json")
            .await
            .map_err(|e| anyhow!("Failed to download config.json from {}: {}", repo_id, e))?;
        let tokenizer_filename = repo
            .get("tokenizer.json")
            .await
            .map_err(|e| anyhow!("Failed to download tokenizer.json from {}: {}", repo_id, e))?;
        let model_filename = repo
            .get("model.safetensors")
            .await
            .map_err(|e| anyhow!("Failed to download model.safetensors from {}: {}", repo_id, e))?;

        let config: Config = serde_json::from_reader(std::fs::File::open(config_filename)?)?;
        tracing::debug!("Model config: {:?}", config);

        let tokenizer = Tokenizer::from_file(tokenizer_filename)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        let mel_filters = mel_filter_bank(m::SAMPLE_RATE, m::N_FFT, config.num_mel_bins);

        // SAFETY: the safetensors file is memory-mapped read-only and not modified while loaded
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[model_filename], m::DTYPE, &device)? };
        let model = m::model::Whisper::load(&vb, config.clone())?;

        tracing::info!(
            repo = %repo_id,
            mel_bins = config.num_mel_bins,
            "Whisper model loaded in {:.2}s",
            start_time.elapsed().as_secs_f64()
        );

        Ok(Self {
            model,
            config,
            device,
            tokenizer,
            mel_filters,
        })
    }

    /// Transcribe 16kHz mono samples into time-ordered segments.
    ///
    /// One segment is produced per 30-second window; its bounds are the window
    /// bounds clipped to the audio length.
    pub fn transcribe(&mut self, pcm: &[f32], language: &str) -> Result<Vec<Segment>> {
        let prompt = self.prompt_tokens(language)?;
        let start_time = std::time::Instant::now();
        let n_mels = self.config.num_mel_bins;
        let mut segments = Vec::new();

        for window in audio_windows(pcm) {
            // The encoder only accepts full 30s inputs; a short tail is padded
            // with silence before the mel transform.
            let mel = m::audio::pcm_to_mel(&self.config, &window.samples, &self.mel_filters);
            let mel_len = mel.len();
            let mel = Tensor::from_vec(mel, (1, n_mels, mel_len / n_mels), &self.device)?
                .narrow(2, 0, m::N_FRAMES)?;
            let text = self.decode_window(&mel, &prompt)?;

            let segment = Segment {
                start: samples_to_seconds(window.start),
                end: samples_to_seconds(window.end),
                text,
            };
            tracing::debug!(
                start = segment.start,
                end = segment.end,
                "Decoded segment: '{}'",
                segment.text
            );
            segments.push(segment);
        }

        tracing::debug!(
            "Transcribed {:.2}s of audio in {:.2}s",
            samples_to_seconds(pcm.len()),
            start_time.elapsed().as_secs_f64()
        );

        Ok(segments)
    }

    /// Greedy decode of one mel window.
    fn decode_window(&mut self, mel: &Tensor, prompt: &[u32]) -> Result<String> {
        let eot_token = self.token_id(m::EOT_TOKEN)?;
        let max_tokens = self.config.max_target_positions / 2;

        let audio_features = self.model.encoder.forward(mel, true)?;

        let mut tokens = prompt.to_vec();
        let mut output_tokens = Vec::new();

        for i in 0..max_tokens {
            let token_tensor = Tensor::new(tokens.as_slice(), &self.device)?.unsqueeze(0)?;
            let ys = self.model.decoder.forward(&token_tensor, &audio_features, i == 0)?;

            let (_, seq_len, _) = ys.dims3()?;
            let logits = self
                .model
                .decoder
                .final_linear(&ys.i((..1, seq_len - 1..))?)?
                .i(0)?
                .i(0)?;
            let next_token = logits.argmax(0)?.to_scalar::<u32>()?;

            if next_token == eot_token || is_repetitive(&output_tokens, next_token) {
                break;
            }

            tokens.push(next_token);
            output_tokens.push(next_token);
        }

        self.model.reset_kv_cache();

        let text = self
            .tokenizer
            .decode(&output_tokens, true)
            .map_err(|e| anyhow!("Tokenizer decode error: {}", e))?;
        Ok(text.trim().to_string())
    }

    /// Decoder prompt for a language hint.
    fn prompt_tokens(&self, language: &str) -> Result<Vec<u32>> {
        let language_token = self.token_id(&language_token(language)?)?;

        Ok(vec![
            self.token_id(m::SOT_TOKEN)?,
            language_token,
            self.token_id(m::TRANSCRIBE_TOKEN)?,
            self.token_id(m::NO_TIMESTAMPS_TOKEN)?,
        ])
    }

    fn token_id(&self, token: &str) -> Result<u32> {
        self.tokenizer
            .token_to_id(token)
            .ok_or_else(|| anyhow!("token not found in tokenizer: {}", token))
    }
}

/// Language codes Whisper was trained on, in tokenizer order.
const LANGUAGES: &[&str] = &[
    "en", "zh", "de", "es", "ru", "ko", "fr", "ja", "pt", "tr", "pl", "ca", "nl", "ar", "sv",
    "it", "id", "hi", "fi", "vi", "he", "uk", "el", "ms", "cs", "ro", "da", "hu", "ta", "no",
    "th", "ur", "hr", "bg", "lt", "la", "mi", "ml", "cy", "sk", "te", "fa", "lv", "bn", "sr",
    "az", "sl", "kn", "et", "mk", "br", "eu", "is", "hy", "ne", "mn", "bs", "kk", "sq", "sw",
    "gl", "mr", "pa", "si", "km", "sn", "yo", "so", "af", "oc", "ka", "be", "tg", "sd", "gu",
    "am", "yi", "lo", "uz", "fo", "ht", "ps", "tk", "nn", "mt", "sa", "lb", "my", "bo", "tl",
    "mg", "as", "tt", "haw", "ln", "ha", "ba", "jw", "su", "yue",
];

/// Special token naming a language, e.g. `<|he|>` for "he".
///
/// Other special tokens share the `<|...|>` form, so the code is checked
/// against the language table rather than the tokenizer vocabulary.
fn language_token(language: &str) -> Result<String> {
    let code = language.trim().to_lowercase();
    if !LANGUAGES.contains(&code.as_str()) {
        return Err(anyhow!("unsupported language code '{}'", language));
    }
    Ok(format!("<|{}|>", code))
}

/// A 30-second slice of the input, padded with silence to full length.
struct AudioWindow {
    /// First sample of the slice
    start: usize,
    /// One past the last real (unpadded) sample
    end: usize,
    samples: Vec<f32>,
}

fn audio_windows(pcm: &[f32]) -> impl Iterator<Item = AudioWindow> + '_ {
    pcm.chunks(m::N_SAMPLES).enumerate().map(|(i, chunk)| {
        let start = i * m::N_SAMPLES;
        let mut samples = chunk.to_vec();
        samples.resize(m::N_SAMPLES, 0.0);
        AudioWindow {
            start,
            end: start + chunk.len(),
            samples,
        }
    })
}

fn samples_to_seconds(samples: usize) -> f64 {
    samples as f64 / m::SAMPLE_RATE as f64
}

/// Check if the token sequence has fallen into a loop.
///
/// Catches the same token four times in a row, or the last three tokens
/// repeating the three before them.
fn is_repetitive(tokens: &[u32], new_token: u32) -> bool {
    let len = tokens.len();

    if len >= 3 && tokens[len - 3..].iter().all(|&t| t == new_token) {
        return true;
    }

    if len >= 5 {
        let candidate = [tokens[len - 2], tokens[len - 1], new_token];
        if tokens[len - 5..len - 2] == candidate {
            return true;
        }
    }

    false
}

fn hz_to_mel(freq: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f64.ln() / 27.0;

    if freq >= MIN_LOG_HZ {
        min_log_mel + (freq / MIN_LOG_HZ).ln() / logstep
    } else {
        freq / F_SP
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f64.ln() / 27.0;

    if mel >= min_log_mel {
        MIN_LOG_HZ * (logstep * (mel - min_log_mel)).exp()
    } else {
        F_SP * mel
    }
}

/// Slaney-style mel filter bank, laid out as `n_mels` rows of `n_fft / 2 + 1`
/// frequency bins.
///
/// Matches the filters Whisper was trained with (librosa defaults with area
/// normalization), so no pre-computed filter file is needed.
pub fn mel_filter_bank(sample_rate: usize, n_fft: usize, n_mels: usize) -> Vec<f32> {
    let n_freqs = n_fft / 2 + 1;
    let fft_freqs: Vec<f64> = (0..n_freqs)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect();

    let min_mel = hz_to_mel(0.0);
    let max_mel = hz_to_mel(sample_rate as f64 / 2.0);
    let mel_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(min_mel + (max_mel - min_mel) * i as f64 / (n_mels + 1) as f64))
        .collect();

    let mut filters = vec![0.0f32; n_mels * n_freqs];
    for m_idx in 0..n_mels {
        let (lower, center, upper) = (mel_points[m_idx], mel_points[m_idx + 1], mel_points[m_idx + 2]);
        let enorm = 2.0 / (upper - lower);

        for (k, &freq) in fft_freqs.iter().enumerate() {
            let rising = (freq - lower) / (center - lower);
            let falling = (upper - freq) / (upper - center);
            let weight = rising.min(falling).max(0.0);
            filters[m_idx * n_freqs + k] = (weight * enorm) as f32;
        }
    }

    filters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_filter_bank_shape_and_values() {
        let filters = mel_filter_bank(16_000, 400, 80);
        assert_eq!(filters.len(), 80 * 201);
        assert!(filters.iter().all(|&w| w >= 0.0 && w.is_finite()));

        // Every filter covers at least one frequency bin
        for row in filters.chunks(201) {
            assert!(row.iter().any(|&w| w > 0.0));
        }
    }

    #[test]
    fn test_mel_filter_bank_supports_128_bins() {
        let filters = mel_filter_bank(16_000, 400, 128);
        assert_eq!(filters.len(), 128 * 201);
    }

    #[test]
    fn test_mel_scale_round_trip() {
        for hz in [0.0, 440.0, 1000.0, 4000.0, 8000.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
        // Linear below 1kHz, logarithmic above
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_repetition_detection() {
        assert!(!is_repetitive(&[], 7));
        assert!(!is_repetitive(&[1, 2, 3], 4));
        assert!(is_repetitive(&[5, 7, 7, 7], 7));
        assert!(is_repetitive(&[1, 2, 3, 1, 2], 3));
        assert!(!is_repetitive(&[1, 2, 3, 4, 5], 6));
    }

    #[test]
    fn test_language_token_format() {
        assert_eq!(language_token("he").unwrap(), "<|he|>");
        assert_eq!(language_token(" EN ").unwrap(), "<|en|>");
        assert_eq!(language_token("haw").unwrap(), "<|haw|>");
    }

    #[test]
    fn test_special_tokens_are_not_languages() {
        for code in ["transcribe", "translate", "endoftext", "notimestamps", "0.00", "xx", ""] {
            let err = language_token(code).unwrap_err();
            assert!(err.to_string().contains("unsupported language code"), "{}", code);
        }
    }

    #[test]
    fn test_short_audio_is_padded_to_a_full_window() {
        let pcm = vec![0.1f32; 3 * m::SAMPLE_RATE];
        let windows: Vec<_> = audio_windows(&pcm).collect();

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].samples.len(), m::N_SAMPLES);
        assert_eq!(windows[0].samples[pcm.len() - 1], 0.1);
        assert_eq!(windows[0].samples[pcm.len()], 0.0);
        assert_eq!(samples_to_seconds(windows[0].end), 3.0);
    }

    #[test]
    fn test_long_audio_is_split_into_windows() {
        let pcm = vec![0.0f32; m::N_SAMPLES + 5 * m::SAMPLE_RATE];
        let windows: Vec<_> = audio_windows(&pcm).collect();

        assert_eq!(windows.len(), 2);
        assert!(windows.iter().all(|w| w.samples.len() == m::N_SAMPLES));
        assert_eq!(samples_to_seconds(windows[0].end), 30.0);
        assert_eq!(samples_to_seconds(windows[1].start), 30.0);
        assert_eq!(samples_to_seconds(windows[1].end), 35.0);
    }
}
