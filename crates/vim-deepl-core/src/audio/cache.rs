//! Audio download cache
//!
//! Files land as `<audio_id>.mp3` under the cache directory. Downloads are
//! atomic: the body is written to a `.<id>.mp3.tmp` sibling and renamed into
//! place. Prefetch is decoupled and best-effort; an in-flight set prevents
//! duplicate concurrent downloads of the same id.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{AppError, Result};

use super::audio_url;

/// On-disk cache of MW pronunciation files
pub struct AudioCache {
    dir: PathBuf,
    client: reqwest::Client,
}

impl AudioCache {
    pub fn new(dir: PathBuf, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { dir, client }
    }

    /// Local path an audio id maps to (whether or not it is cached yet).
    pub fn path_for(&self, audio_id: &str) -> PathBuf {
        self.dir.join(format!("{audio_id}.mp3"))
    }

    /// Download the clip if missing; returns the local file path.
    pub async fn ensure_cached(&self, audio_id: &str) -> Result<PathBuf> {
        let dst = self.path_for(audio_id);

        if let Ok(meta) = tokio::fs::metadata(&dst).await {
            if meta.len() > 0 {
                debug!(audio_id, path = %dst.display(), size = meta.len(), "audio cache hit");
                return Ok(dst);
            }
        }

        tokio::fs::create_dir_all(&self.dir).await?;

        let url = audio_url(audio_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Provider(format!("audio download failed: {e}")))?;

        // Guard against HTML error pages served instead of mp3.
        if let Some(ctype) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            let ok = ctype.contains("audio") || ctype.contains("mpeg") || ctype.contains("mp3");
            if !ok {
                return Err(AppError::Provider(format!(
                    "audio download failed: unexpected content-type {ctype}"
                )));
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::Provider(format!("audio download failed: {e}")))?;
        if body.is_empty() {
            return Err(AppError::Provider("audio download failed: empty body".to_string()));
        }

        let tmp = self.dir.join(format!(".{audio_id}.mp3.tmp"));
        if let Err(e) = tokio::fs::write(&tmp, &body).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tokio::fs::rename(&tmp, &dst).await?;

        debug!(audio_id, path = %dst.display(), size = body.len(), "audio downloaded");
        Ok(dst)
    }
}

/// Best-effort background prefetcher keyed by audio id
#[derive(Clone)]
pub struct Prefetcher {
    cache: Arc<AudioCache>,
    inflight: Arc<Mutex<HashSet<String>>>,
}

impl Prefetcher {
    pub fn new(cache: Arc<AudioCache>) -> Self {
        Self {
            cache,
            inflight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Schedule a download unless one for this id is already running.
    /// Prefetch only caches; playback is always an explicit user action.
    pub fn spawn(&self, audio_id: Option<&str>) {
        let Some(aid) = audio_id.map(str::trim).filter(|a| !a.is_empty()) else {
            return;
        };
        let aid = aid.to_string();

        {
            let Ok(mut inflight) = self.inflight.lock() else {
                return;
            };
            if !inflight.insert(aid.clone()) {
                return;
            }
        }

        let cache = self.cache.clone();
        let inflight = self.inflight.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.ensure_cached(&aid).await {
                warn!(audio_id = %aid, "audio prefetch failed: {e}");
            }
            if let Ok(mut set) = inflight.lock() {
                set.remove(&aid);
            }
        });
    }
}
