//! Single-worker audio playback
//!
//! One long-lived task owns all playback, so two clips can never overlap.
//! Requests carry a monotonically increasing token; publishing a new request
//! bumps the token, and the worker compares its token against the current one
//! before each phase, after each phase, and every 50 ms while a child process
//! runs or the inter-play gap elapses. The newest request therefore wins
//! within one poll interval plus one OS signal.
//!
//! Every request plays the clip twice with a configurable gap. Players are
//! spawned in their own process group; cancellation sends SIGTERM to the
//! group, waits briefly, then SIGKILLs.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, warn};

/// Token/child poll interval; bounds cancellation latency.
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Oversized or wedged files are killed after this long.
const PLAYBACK_TIMEOUT: Duration = Duration::from_secs(10);
/// Grace between SIGTERM and SIGKILL.
const TERM_GRACE: Duration = Duration::from_millis(500);
/// Bound on the pactl sink-input volume probe.
const VOLUME_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

struct PlayRequest {
    token: u64,
    player: Vec<String>,
    path: PathBuf,
    gap: Duration,
}

struct Shared {
    token: AtomicU64,
    pending: Mutex<Option<PlayRequest>>,
    notify: Notify,
}

/// Handle to the playback worker task
#[derive(Clone)]
pub struct AudioWorker {
    shared: Arc<Shared>,
}

impl AudioWorker {
    /// Spawn the worker task. Call once at composition time.
    pub fn spawn() -> Self {
        let shared = Arc::new(Shared {
            token: AtomicU64::new(0),
            pending: Mutex::new(None),
            notify: Notify::new(),
        });
        let worker_shared = shared.clone();
        tokio::spawn(async move {
            worker_loop(worker_shared).await;
        });
        Self { shared }
    }

    /// Queue a double play of `path`, cancelling any in-flight playback.
    ///
    /// Returns a short description of the queued player, or `None` when no
    /// media player is installed (the caller reports `cached_only`).
    pub fn play_twice(&self, path: PathBuf, gap: Duration) -> Option<String> {
        let player = pick_player()?;
        let label = format!("queued: {}", player.join(" "));

        let token = self.shared.token.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut pending) = self.shared.pending.lock() {
            *pending = Some(PlayRequest {
                token,
                player,
                path,
                gap,
            });
        }
        self.shared.notify.notify_one();
        Some(label)
    }
}

/// Probe for an installed player, preferring mplayer.
fn pick_player() -> Option<Vec<String>> {
    const CANDIDATES: &[&[&str]] = &[
        &["mplayer", "-really-quiet", "-nolirc", "-noconsolecontrols"],
        &["mpv", "--no-terminal"],
        &["ffplay", "-nodisp", "-autoexit", "-loglevel", "quiet"],
    ];
    for cmd in CANDIDATES {
        if find_in_path(cmd[0]) {
            return Some(cmd.iter().map(|s| s.to_string()).collect());
        }
    }
    None
}

fn find_in_path(bin: &str) -> bool {
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| dir.join(bin).is_file())
}

async fn worker_loop(shared: Arc<Shared>) {
    loop {
        let req = loop {
            let taken = shared.pending.lock().ok().and_then(|mut p| p.take());
            match taken {
                Some(req) => break req,
                None => shared.notify.notified().await,
            }
        };

        // A newer request may already have superseded this one.
        if req.token != shared.token.load(Ordering::SeqCst) {
            continue;
        }
        debug!(token = req.token, file = %req.path.display(), "playback request");
        run_request(&shared, req).await;
    }
}

fn is_cancelled(shared: &Shared, token: u64) -> bool {
    token != shared.token.load(Ordering::SeqCst)
}

async fn run_request(shared: &Shared, req: PlayRequest) {
    for phase in 0..2 {
        if is_cancelled(shared, req.token) {
            return;
        }

        let mut cmd = std::process::Command::new(&req.player[0]);
        cmd.args(&req.player[1..])
            .arg(&req.path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(player = %req.player[0], "failed to spawn player: {e}");
                return;
            }
        };

        spawn_volume_probe(child.id());

        // Poll the child so a newer token can interrupt mid-clip.
        let deadline = tokio::time::Instant::now() + PLAYBACK_TIMEOUT;
        loop {
            if is_cancelled(shared, req.token) {
                stop_process_group(&mut child).await;
                return;
            }
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(token = req.token, ?status, "playback phase {phase} done");
                    break;
                }
                Ok(None) => {
                    if tokio::time::Instant::now() >= deadline {
                        warn!(file = %req.path.display(), "playback timed out, killing player");
                        stop_process_group(&mut child).await;
                        break;
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(e) => {
                    warn!("player wait failed: {e}");
                    stop_process_group(&mut child).await;
                    break;
                }
            }
        }

        if is_cancelled(shared, req.token) {
            return;
        }

        // Gap before the second play, polled so cancellation stays responsive.
        if phase == 0 {
            let gap_end = tokio::time::Instant::now() + req.gap;
            while tokio::time::Instant::now() < gap_end {
                if is_cancelled(shared, req.token) {
                    return;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}

/// SIGTERM the player's process group, wait briefly, then SIGKILL.
async fn stop_process_group(child: &mut std::process::Child) {
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }

    #[cfg(unix)]
    {
        let pgid = child.id() as i32;
        unsafe {
            libc::killpg(pgid, libc::SIGTERM);
        }
        let deadline = tokio::time::Instant::now() + TERM_GRACE;
        while tokio::time::Instant::now() < deadline {
            if let Ok(Some(_)) = child.try_wait() {
                return;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child.kill();
    }
    let _ = child.wait();
}

/// Best-effort: find the PulseAudio sink input created by this pid and set
/// its volume to 100%, unmuted. Works with PipeWire's compatibility layer.
fn spawn_volume_probe(pid: u32) {
    tokio::spawn(async move {
        let result = tokio::time::timeout(VOLUME_PROBE_TIMEOUT, set_sink_input_volume(pid)).await;
        if result.is_err() {
            debug!(pid, "sink-input volume probe timed out");
        }
    });
}

async fn set_sink_input_volume(pid: u32) {
    let deadline = tokio::time::Instant::now() + VOLUME_PROBE_TIMEOUT;
    let pid_line = format!("application.process.id = \"{pid}\"");

    let sink_id = loop {
        let output = tokio::process::Command::new("pactl")
            .args(["list", "sink-inputs"])
            .stdin(Stdio::null())
            .output()
            .await;
        let Ok(output) = output else {
            return;
        };
        let text = String::from_utf8_lossy(&output.stdout).to_string();

        if let Some(id) = find_sink_input(&text, &pid_line) {
            break id;
        }
        if tokio::time::Instant::now() >= deadline {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };

    let _ = tokio::process::Command::new("pactl")
        .args(["set-sink-input-volume", &sink_id, "100%"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    let _ = tokio::process::Command::new("pactl")
        .args(["set-sink-input-mute", &sink_id, "0"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
}

/// Parse `pactl list sink-inputs` output: blocks start with `Sink Input #N`
/// and carry an `application.process.id = "<pid>"` property line.
fn find_sink_input(text: &str, pid_line: &str) -> Option<String> {
    let mut current: Option<String> = None;
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("Sink Input #") {
            current = Some(rest.trim().to_string());
        } else if trimmed == pid_line {
            if let Some(id) = current {
                return Some(id);
            }
        }
    }
    None
}
