use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

use crate::{
    assets::asset::StreamInfo,
    foundation::error::{EditError, EditResult},
};

/// Media discovery backend.
///
/// Called from loader worker threads, so implementations must be `Send + Sync`.
pub trait MediaInfoProvider: Send + Sync {
    /// Describe the streams behind `uri`, or fail with a resolution error when the
    /// reference cannot be opened.
    fn discover(&self, uri: &str) -> EditResult<StreamInfo>;
}

/// Filesystem path behind a `file://` URI; other strings are taken as paths.
pub fn uri_to_path(uri: &str) -> PathBuf {
    PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
}

/// `file://` URI for a filesystem path.
pub fn path_to_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// In-memory discovery table, keyed by URI.
#[derive(Debug, Default)]
pub struct StaticMediaInfo {
    entries: RwLock<HashMap<String, StreamInfo>>,
}

impl StaticMediaInfo {
    /// Empty table: every lookup fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`StaticMediaInfo::insert`].
    pub fn with(self, uri: impl Into<String>, info: StreamInfo) -> Self {
        self.insert(uri, info);
        self
    }

    /// Register (or replace) the description of `uri`.
    pub fn insert(&self, uri: impl Into<String>, info: StreamInfo) {
        let mut entries = match self.entries.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(uri.into(), info);
    }

    /// Forget `uri`.
    pub fn remove(&self, uri: &str) -> Option<StreamInfo> {
        let mut entries = match self.entries.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.remove(uri)
    }

    /// Load a JSON manifest mapping URIs to stream descriptions.
    pub fn from_manifest(path: &Path) -> EditResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let entries: HashMap<String, StreamInfo> = serde_json::from_str(&text).map_err(|e| {
            EditError::validation(format!(
                "media manifest '{}' is not valid: {e}",
                path.display()
            ))
        })?;
        Ok(Self {
            entries: RwLock::new(entries),
        })
    }
}

impl MediaInfoProvider for StaticMediaInfo {
    fn discover(&self, uri: &str) -> EditResult<StreamInfo> {
        let entries = match self.entries.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries
            .get(uri)
            .cloned()
            .ok_or_else(|| EditError::resolution(format!("could not open media '{uri}'")))
    }
}

/// Discovery through the `ffprobe` executable.
#[cfg(feature = "media-ffmpeg")]
#[derive(Clone, Debug, Default)]
pub struct FfprobeMediaInfo;

#[cfg(feature = "media-ffmpeg")]
impl MediaInfoProvider for FfprobeMediaInfo {
    #[tracing::instrument(level = "debug", skip(self))]
    fn discover(&self, uri: &str) -> EditResult<StreamInfo> {
        use crate::{
            assets::asset::{AudioStreamInfo, VideoStreamInfo},
            foundation::core::ClockTime,
        };

        #[derive(serde::Deserialize)]
        struct ProbeStream {
            codec_type: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            r_frame_rate: Option<String>,
            channels: Option<u16>,
            sample_rate: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeOut {
            streams: Vec<ProbeStream>,
            format: Option<ProbeFormat>,
        }

        let path = uri_to_path(uri);
        if !path.exists() {
            return Err(EditError::resolution(format!(
                "media '{uri}' does not exist"
            )));
        }
        let out = std::process::Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(&path)
            .output()
            .map_err(|e| EditError::resolution(format!("failed to run ffprobe: {e}")))?;
        if !out.status.success() {
            return Err(EditError::resolution(format!(
                "ffprobe failed for '{uri}': {}",
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
            .map_err(|e| EditError::resolution(format!("ffprobe json parse failed: {e}")))?;
        let video = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .and_then(|s| {
                let (fps_num, fps_den) =
                    parse_ff_ratio(s.r_frame_rate.as_deref().unwrap_or("0/1"))?;
                Some(VideoStreamInfo {
                    width: s.width?,
                    height: s.height?,
                    fps_num,
                    fps_den,
                })
            });
        let audio = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("audio"))
            .map(|s| AudioStreamInfo {
                channels: s.channels.unwrap_or(2),
                sample_rate: s
                    .sample_rate
                    .as_deref()
                    .and_then(|r| r.parse().ok())
                    .unwrap_or(48_000),
            });
        if video.is_none() && audio.is_none() {
            return Err(EditError::resolution(format!(
                "'{uri}' has no audio or video stream"
            )));
        }
        let duration_sec = parsed
            .format
            .as_ref()
            .and_then(|f| f.duration.as_ref())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);

        Ok(StreamInfo {
            duration: ClockTime((duration_sec.max(0.0) * ClockTime::SECOND.0 as f64) as u64),
            video,
            audio,
        })
    }
}

#[cfg_attr(not(feature = "media-ffmpeg"), allow(dead_code))]
fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/media.rs"]
mod tests;
