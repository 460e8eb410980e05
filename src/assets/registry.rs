//! Closed `{kind → constructor}` table used by the loader.

use crate::{
    assets::asset::{AssetInfo, AssetKind},
    assets::media::MediaInfoProvider,
    foundation::error::{EditError, EditResult},
    timeline::track::TrackType,
};

/// Known video effects.
pub const VIDEO_EFFECTS: &[&str] = &[
    "agingtv",
    "alpha",
    "edgetv",
    "gaussianblur",
    "quarktv",
    "radioactv",
    "rippletv",
    "videobalance",
    "videoflip",
];

/// Known audio effects.
pub const AUDIO_EFFECTS: &[&str] = &[
    "audioamplify",
    "audioecho",
    "audiopanorama",
    "equalizer-10bands",
    "volume",
];

/// Transition kinds understood by the rendering engine.
pub const TRANSITIONS: &[&str] = &[
    "crossfade",
    "bar-wipe-lr",
    "bar-wipe-tb",
    "box-wipe-tl",
    "iris-rect",
];

/// Transition used for automatic transitions.
pub const DEFAULT_TRANSITION: &str = "crossfade";

/// Formatters understood by [`crate::formatter_for`].
pub const FORMATTERS: &[&str] = &["json"];

/// Medium processed by a known effect, `None` when the name is unknown.
///
/// Names are matched case-insensitively after trimming; an effect id may carry
/// trailing properties (`"videobalance saturation=0.5"`), only the first word is
/// the element name.
pub fn effect_track_type(name: &str) -> Option<TrackType> {
    let element = name.split_whitespace().next()?.to_ascii_lowercase();
    if VIDEO_EFFECTS.contains(&element.as_str()) {
        Some(TrackType::Video)
    } else if AUDIO_EFFECTS.contains(&element.as_str()) {
        Some(TrackType::Audio)
    } else {
        None
    }
}

/// Whether `name` is a known transition.
pub fn is_transition(name: &str) -> bool {
    TRANSITIONS.contains(&name.trim())
}

/// Resolve `(kind, id)` into kind-specific info.
///
/// Runs on loader worker threads; must not touch control-thread state.
pub(crate) fn resolve(
    kind: AssetKind,
    id: &str,
    media: &dyn MediaInfoProvider,
) -> EditResult<AssetInfo> {
    if id.trim().is_empty() && kind != AssetKind::TestClip {
        return Err(EditError::resolution(format!("{kind} id must be non-empty")));
    }
    match kind {
        AssetKind::UriClip => media.discover(id).map(AssetInfo::Media),
        AssetKind::TestClip => Ok(AssetInfo::TestClip),
        AssetKind::Effect => effect_track_type(id)
            .map(|track_type| AssetInfo::Effect { track_type })
            .ok_or_else(|| EditError::resolution(format!("no such element '{id}'"))),
        AssetKind::Transition => {
            if is_transition(id) {
                Ok(AssetInfo::Transition)
            } else {
                Err(EditError::resolution(format!("unknown transition '{id}'")))
            }
        }
        AssetKind::Formatter => {
            if FORMATTERS.contains(&id) {
                Ok(AssetInfo::Formatter)
            } else {
                Err(EditError::resolution(format!("unknown formatter '{id}'")))
            }
        }
        AssetKind::Project => Err(EditError::resolution(
            "projects are opened through Context::project, not resolved",
        )),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/registry.rs"]
mod tests;
