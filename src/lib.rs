//! cutlist models a non-linear editing project: which asset plays when, on which
//! track and at what compositing priority, and how that description is saved
//! and restored.
//!
//! # Model overview
//!
//! 1. **Assets**: `(id, kind)` references resolved in the background by a
//!    [`Context`] and shared through its cache. Failed media references can be
//!    repaired through [`ProjectObserver::missing_reference`]; loaded media can
//!    be swapped for transcoded proxies.
//! 2. **Timeline**: layers of [`Clip`]s, flattened into per-medium [`Track`]s
//!    of prioritized [`TrackElement`]s. Overlapping clips on a layer with
//!    auto-transitions enabled get a transition clip over the overlap.
//! 3. **Keyframes**: [`ControlSource`] curves bound to element properties.
//! 4. **Persistence**: a [`Project`] saves to and loads from a versioned
//!    [`ProjectDoc`] (JSON by default).
//!
//! Everything except resolution and proxy transcoding runs on the thread that
//! owns the [`Context`]; worker results are applied when the owner calls
//! [`Context::iterate`] or [`Context::run_until`].
//!
//! No decoding or rendering happens here. Stream discovery is delegated to a
//! [`MediaInfoProvider`] and transcoding to a [`ProxyTranscoder`].
#![forbid(unsafe_code)]

mod assets;
mod encoding;
mod foundation;
mod project;
mod serialize;
mod timeline;

pub use assets::asset::{
    Asset, AssetInfo, AssetKey, AssetKind, AssetStatus, AudioStreamInfo, StreamInfo,
    VideoStreamInfo,
};
pub use assets::cache::AssetCache;
pub use assets::loader::MAX_ATTEMPTS;
#[cfg(feature = "media-ffmpeg")]
pub use assets::media::FfprobeMediaInfo;
pub use assets::media::{MediaInfoProvider, StaticMediaInfo, path_to_uri, uri_to_path};
#[cfg(feature = "media-ffmpeg")]
pub use assets::proxy::FfmpegTranscoder;
pub use assets::proxy::{CancellationToken, ProxyCheckpoint, ProxyTranscoder};
pub use assets::registry::{
    AUDIO_EFFECTS, DEFAULT_TRANSITION, FORMATTERS, TRANSITIONS, VIDEO_EFFECTS,
    effect_track_type, is_transition,
};
pub use encoding::profile::{EncodingProfile, ProfileKind};
pub use foundation::core::{
    CLIP_STRIDE, ClockTime, LAYER_HEIGHT, MAX_CLIP_PRIORITY, MAX_EFFECTS_PER_CLIP,
    MIN_ELEMENT_PRIORITY, TimeSpan, clip_band_base,
};
pub use foundation::error::{EditError, EditResult};
pub use foundation::meta::{MetaContainer, MetaValue};
pub use project::context::{Context, ContextConfig};
pub use project::events::{AssetEvent, ProjectEvent, ProjectObserver};
pub use project::project::{Project, ProjectState};
pub use serialize::document::{
    AssetDoc, BindingDoc, ClipDoc, ElementDoc, FORMAT_VERSION, LayerDoc, ProjectDoc,
    SUPPORTED_MAJOR, TimelineDoc, TrackDoc, TrimDoc,
};
pub use serialize::formatter::{
    Formatter, JsonFormatter, formatter_for, load_document, save_document,
};
pub use timeline::clip::{Clip, ClipBuilder, ClipKind, EffectSlot};
pub use timeline::control::{
    BindingMode, ControlBinding, ControlSource, InterpolationMode, TimedValue,
};
pub use timeline::element::{ClipId, ElementId, ElementKind, LayerId, TrackElement, TrackId};
pub use timeline::layer::Layer;
pub use timeline::timeline::{MAX_LAYER_PRIORITY, Timeline};
pub use timeline::track::{Track, TrackType};
