use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
    },
    thread,
    time::Duration,
};

use crate::{
    assets::asset::AssetKey,
    encoding::profile::EncodingProfile,
    foundation::error::{EditError, EditResult},
};

/// Shared cancellation flag for a proxy batch.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Fresh, not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Suspension point handed to a [`ProxyTranscoder`].
///
/// Transcoders call [`ProxyCheckpoint::check`] between chunks of work; it blocks
/// while the batch is paused and fails with [`EditError::Cancelled`] once the
/// batch is cancelled.
#[derive(Clone, Debug)]
pub struct ProxyCheckpoint {
    token: CancellationToken,
    paused: Arc<AtomicBool>,
    poll: Duration,
}

impl ProxyCheckpoint {
    pub(crate) fn new(token: CancellationToken, paused: Arc<AtomicBool>, poll: Duration) -> Self {
        Self {
            token,
            paused,
            poll,
        }
    }

    /// Wait out a pause, then fail if the batch was cancelled.
    pub fn check(&self) -> EditResult<()> {
        loop {
            if self.token.is_cancelled() {
                return Err(EditError::cancelled("proxy creation cancelled"));
            }
            if !self.paused.load(Ordering::SeqCst) {
                return Ok(());
            }
            thread::sleep(self.poll);
        }
    }

    /// Non-blocking cancellation probe.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Produces a proxy for one source reference.
///
/// Runs on the proxy batch thread. Returns the URI of the finished proxy; an
/// interrupted transcode must clean up after itself and return
/// [`EditError::Cancelled`].
pub trait ProxyTranscoder: Send + Sync {
    /// Transcode `source_uri` according to `profile`.
    fn transcode(
        &self,
        source_uri: &str,
        profile: &EncodingProfile,
        checkpoint: &ProxyCheckpoint,
    ) -> EditResult<String>;
}

/// One source of a batch: cache key and the reference actually resolved for it.
#[derive(Clone, Debug)]
pub(crate) struct ProxyItem {
    pub key: AssetKey,
    pub source_uri: String,
}

/// Batch thread → control thread reports.
#[derive(Debug)]
pub(crate) enum ProxyMsg {
    ItemDone {
        batch: u64,
        key: AssetKey,
        result: EditResult<String>,
    },
    Finished {
        batch: u64,
        cancelled: bool,
    },
}

/// Control-side handle of a running batch.
#[derive(Debug)]
pub(crate) struct ProxyBatch {
    pub id: u64,
    pub token: CancellationToken,
    paused: Arc<AtomicBool>,
}

impl ProxyBatch {
    pub(crate) fn set_paused(&self, paused: bool) -> bool {
        self.paused.swap(paused, Ordering::SeqCst) != paused
    }
}

/// Start the batch thread. Items are processed in order; per-item failures
/// are reported and the batch moves on.
pub(crate) fn spawn_batch<M>(
    id: u64,
    items: Vec<ProxyItem>,
    profile: EncodingProfile,
    transcoder: Arc<dyn ProxyTranscoder>,
    token: CancellationToken,
    poll: Duration,
    tx: Sender<M>,
) -> EditResult<ProxyBatch>
where
    M: From<ProxyMsg> + Send + 'static,
{
    let paused = Arc::new(AtomicBool::new(false));
    let checkpoint = ProxyCheckpoint::new(token.clone(), Arc::clone(&paused), poll);
    thread::Builder::new()
        .name(format!("cutlist-proxy-{id}"))
        .spawn(move || run_batch(id, items, &profile, transcoder.as_ref(), &checkpoint, &tx))
        .map_err(|e| EditError::Other(anyhow::anyhow!("failed to spawn proxy thread: {e}")))?;
    Ok(ProxyBatch { id, token, paused })
}

#[tracing::instrument(level = "debug", skip_all, fields(batch = id, items = items.len()))]
fn run_batch<M: From<ProxyMsg>>(
    id: u64,
    items: Vec<ProxyItem>,
    profile: &EncodingProfile,
    transcoder: &dyn ProxyTranscoder,
    checkpoint: &ProxyCheckpoint,
    tx: &Sender<M>,
) {
    let mut cancelled = false;
    for item in items {
        if checkpoint.check().is_err() {
            cancelled = true;
            break;
        }
        let result = transcoder.transcode(&item.source_uri, profile, checkpoint);
        // A transcode that finished after cancellation is not a completed proxy.
        if matches!(result, Err(EditError::Cancelled(_))) || checkpoint.is_cancelled() {
            cancelled = true;
            break;
        }
        let msg = ProxyMsg::ItemDone {
            batch: id,
            key: item.key,
            result,
        };
        if tx.send(msg.into()).is_err() {
            return;
        }
    }
    let cancelled = cancelled || checkpoint.is_cancelled();
    tracing::debug!(cancelled, "proxy batch finished");
    let _ = tx.send(ProxyMsg::Finished { batch: id, cancelled }.into());
}

/// Transcoding through the `ffmpeg` executable.
///
/// Proxies are written next to their source as `<name>.proxy.<ext>`.
#[cfg(feature = "media-ffmpeg")]
#[derive(Clone, Debug)]
pub struct FfmpegTranscoder {
    poll: Duration,
}

#[cfg(feature = "media-ffmpeg")]
impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(50),
        }
    }
}

#[cfg(feature = "media-ffmpeg")]
impl FfmpegTranscoder {
    fn codec_args(profile: &EncodingProfile) -> (&'static str, Vec<&'static str>) {
        let ext = match profile.format.as_str() {
            "video/webm" => "webm",
            "video/quicktime" => "mov",
            _ => "mkv",
        };
        let mut args = Vec::new();
        for sub in profile.sub_profiles() {
            match sub.format.as_str() {
                "video/x-vp8" => args.extend(["-c:v", "libvpx"]),
                "video/x-vp9" => args.extend(["-c:v", "libvpx-vp9"]),
                "video/x-h264" => args.extend(["-c:v", "libx264"]),
                "video/x-prores" => args.extend(["-c:v", "prores_ks"]),
                "audio/x-vorbis" => args.extend(["-c:a", "libvorbis"]),
                "audio/x-opus" => args.extend(["-c:a", "libopus"]),
                "audio/x-raw" => args.extend(["-c:a", "pcm_s16le"]),
                _ => {}
            }
        }
        (ext, args)
    }
}

#[cfg(feature = "media-ffmpeg")]
impl ProxyTranscoder for FfmpegTranscoder {
    fn transcode(
        &self,
        source_uri: &str,
        profile: &EncodingProfile,
        checkpoint: &ProxyCheckpoint,
    ) -> EditResult<String> {
        use std::process::{Command, Stdio};

        use crate::assets::media::{path_to_uri, uri_to_path};

        let source = uri_to_path(source_uri);
        let (ext, codec) = Self::codec_args(profile);
        let out = source.with_extension(format!("proxy.{ext}"));

        let mut child = Command::new("ffmpeg")
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(&source)
            .args(codec)
            .arg(&out)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                EditError::resolution(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;

        loop {
            if let Err(err) = checkpoint.check() {
                let _ = child.kill();
                let _ = child.wait();
                let _ = std::fs::remove_file(&out);
                return Err(err);
            }
            if let Some(status) = child.try_wait()? {
                if status.success() {
                    return Ok(path_to_uri(&out));
                }
                let output = child.wait_with_output()?;
                let _ = std::fs::remove_file(&out);
                return Err(EditError::resolution(format!(
                    "ffmpeg exited with status {status}: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
            thread::sleep(self.poll);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/proxy.rs"]
mod tests;
