use std::{cell::RefCell, rc::Rc};

use crate::{
    foundation::core::ClockTime,
    foundation::error::{EditError, EditResult},
    timeline::track::TrackType,
};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
/// What an asset id refers to; selects how it is resolved and extracted.
pub enum AssetKind {
    /// A persisted project (extracts to a [`crate::Timeline`]).
    Project,
    /// Media referenced by URI (extracts to a source clip).
    UriClip,
    /// Generated test pattern + tone (extracts to a source clip).
    TestClip,
    /// Named effect (extracts to effect elements).
    Effect,
    /// Named transition (extracts to transition elements).
    Transition,
    /// Project formatter.
    Formatter,
}

impl AssetKind {
    /// Whether assets of this kind can back a source clip on a layer.
    pub fn is_clip_source(self) -> bool {
        matches!(self, Self::UriClip | Self::TestClip)
    }

    /// Stable lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::UriClip => "uri_clip",
            Self::TestClip => "test_clip",
            Self::Effect => "effect",
            Self::Transition => "transition",
            Self::Formatter => "formatter",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
/// Resolution state of an asset.
pub enum AssetStatus {
    /// Created, nothing dispatched yet.
    Init,
    /// Resolution in flight.
    Started,
    /// Resolved; `info` is available.
    Loaded,
    /// Resolution failed.
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Cache key of an asset.
pub struct AssetKey {
    /// Asset kind.
    pub kind: AssetKind,
    /// Asset id as requested.
    pub id: String,
}

impl AssetKey {
    /// Build a key.
    pub fn new(id: impl Into<String>, kind: AssetKind) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// Video stream description returned by discovery.
pub struct VideoStreamInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frame rate numerator.
    pub fps_num: u32,
    /// Frame rate denominator.
    pub fps_den: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// Audio stream description returned by discovery.
pub struct AudioStreamInfo {
    /// Channel count.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Stream layout of a media reference.
pub struct StreamInfo {
    /// Total media duration.
    pub duration: ClockTime,
    /// First video stream, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoStreamInfo>,
    /// First audio stream, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioStreamInfo>,
}

impl StreamInfo {
    /// Track types this media can feed.
    pub fn track_types(&self) -> Vec<TrackType> {
        let mut out = Vec::new();
        if self.audio.is_some() {
            out.push(TrackType::Audio);
        }
        if self.video.is_some() {
            out.push(TrackType::Video);
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Kind-specific data produced by a successful resolution.
pub enum AssetInfo {
    /// Discovered media.
    Media(StreamInfo),
    /// Generated test source (audio + video, unbounded).
    TestClip,
    /// Known effect and the medium it applies to.
    Effect {
        /// Medium the effect processes.
        track_type: TrackType,
    },
    /// Known transition.
    Transition,
    /// Registered formatter.
    Formatter,
}

impl AssetInfo {
    /// Track types a clip extracted from this asset can feed.
    pub fn track_types(&self) -> Vec<TrackType> {
        match self {
            Self::Media(info) => info.track_types(),
            Self::TestClip | Self::Transition => vec![TrackType::Audio, TrackType::Video],
            Self::Effect { track_type } => vec![*track_type],
            Self::Formatter => Vec::new(),
        }
    }

    /// Natural duration of the content, when bounded.
    pub fn duration(&self) -> Option<ClockTime> {
        match self {
            Self::Media(info) => Some(info.duration),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct AssetState {
    status: AssetStatus,
    target_id: String,
    proxy_target: Option<String>,
    info: Option<AssetInfo>,
    error: Option<String>,
    tried_ids: Vec<String>,
    generation: u64,
}

#[derive(Debug)]
struct AssetInner {
    key: AssetKey,
    state: RefCell<AssetState>,
}

/// Shared handle to a cached asset.
///
/// Clones refer to the same instance; compare identities with [`Asset::same_instance`].
/// Status changes are applied by the owning [`crate::Context`] only.
#[derive(Clone, Debug)]
pub struct Asset {
    inner: Rc<AssetInner>,
}

impl Asset {
    pub(crate) fn new(key: AssetKey) -> Self {
        let target_id = key.id.clone();
        Self {
            inner: Rc::new(AssetInner {
                key,
                state: RefCell::new(AssetState {
                    status: AssetStatus::Init,
                    target_id,
                    proxy_target: None,
                    info: None,
                    error: None,
                    tried_ids: Vec::new(),
                    generation: 0,
                }),
            }),
        }
    }

    /// Asset id as requested.
    pub fn id(&self) -> &str {
        &self.inner.key.id
    }

    /// Asset kind.
    pub fn kind(&self) -> AssetKind {
        self.inner.key.kind
    }

    /// Cache key.
    pub fn key(&self) -> &AssetKey {
        &self.inner.key
    }

    /// Current status.
    pub fn status(&self) -> AssetStatus {
        self.inner.state.borrow().status
    }

    /// Id actually resolved: the requested id, or the replacement supplied
    /// through a missing-reference round-trip.
    pub fn target_id(&self) -> String {
        self.inner.state.borrow().target_id.clone()
    }

    /// Id of the proxy asset substituted for editing, if any.
    pub fn proxy_target(&self) -> Option<String> {
        self.inner.state.borrow().proxy_target.clone()
    }

    /// Resolution result, once loaded.
    pub fn info(&self) -> Option<AssetInfo> {
        self.inner.state.borrow().info.clone()
    }

    /// Message of the last resolution failure.
    pub fn error_message(&self) -> Option<String> {
        self.inner.state.borrow().error.clone()
    }

    /// Whether both handles point at the same cached instance.
    pub fn same_instance(&self, other: &Asset) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live handles (cache included).
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.inner.state.borrow().generation
    }

    pub(crate) fn was_tried(&self, id: &str) -> bool {
        self.inner.state.borrow().tried_ids.iter().any(|t| t == id)
    }

    /// Init → Started, or Error → Started with a corrected id.
    pub(crate) fn begin_resolution(&self, target_id: &str) -> EditResult<u64> {
        let mut st = self.inner.state.borrow_mut();
        match st.status {
            AssetStatus::Init => {}
            AssetStatus::Error if !st.tried_ids.iter().any(|t| t == target_id) => {}
            other => {
                return Err(EditError::consistency(format!(
                    "asset '{}' cannot start resolving '{target_id}' from {other:?}",
                    self.inner.key.id
                )));
            }
        }
        st.status = AssetStatus::Started;
        st.target_id = target_id.to_string();
        st.tried_ids.push(target_id.to_string());
        st.error = None;
        st.generation += 1;
        Ok(st.generation)
    }

    pub(crate) fn finish_loaded(&self, info: AssetInfo) {
        let mut st = self.inner.state.borrow_mut();
        debug_assert_eq!(st.status, AssetStatus::Started);
        st.status = AssetStatus::Loaded;
        st.info = Some(info);
    }

    pub(crate) fn finish_error(&self, message: String) {
        let mut st = self.inner.state.borrow_mut();
        debug_assert_eq!(st.status, AssetStatus::Started);
        st.status = AssetStatus::Error;
        st.error = Some(message);
    }

    pub(crate) fn set_proxy_target(&self, proxy: Option<String>) {
        self.inner.state.borrow_mut().proxy_target = proxy;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/asset.rs"]
mod tests;
