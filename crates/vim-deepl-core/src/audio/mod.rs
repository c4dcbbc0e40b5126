//! Merriam-Webster pronunciation audio: cache, prefetch, single-worker playback

pub mod cache;
pub mod worker;

pub use cache::{AudioCache, Prefetcher};
pub use worker::AudioWorker;

/// MW audio subdirectory for an audio id, per the provider's URL scheme:
/// `bix*` and `gg*` have dedicated directories, ids starting with a digit or
/// underscore live under `number`, everything else under its first letter.
pub fn audio_subdir(audio_id: &str) -> String {
    if audio_id.starts_with("bix") {
        return "bix".to_string();
    }
    if audio_id.starts_with("gg") {
        return "gg".to_string();
    }
    match audio_id.chars().next() {
        Some(c) if c.is_ascii_digit() || c == '_' => "number".to_string(),
        Some(c) => c.to_lowercase().to_string(),
        None => String::new(),
    }
}

/// Deterministic MW pronunciation URL for an audio id.
pub fn audio_url(audio_id: &str) -> String {
    format!(
        "https://media.merriam-webster.com/audio/prons/en/us/mp3/{}/{}.mp3",
        audio_subdir(audio_id),
        audio_id
    )
}
