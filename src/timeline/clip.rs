use crate::{
    assets::asset::{Asset, AssetKind, AssetStatus},
    foundation::{
        core::{ClockTime, TimeSpan},
        error::{EditError, EditResult},
    },
    timeline::{
        element::{ClipId, ElementId, LayerId},
        track::TrackType,
    },
};

/// What a clip places on its layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipKind {
    /// Media or generated content.
    Source,
    /// Automatic transition over the overlap of two source clips.
    Transition,
}

/// Effect stacked on a clip, with its per-track elements.
#[derive(Clone, Debug)]
pub struct EffectSlot {
    pub(crate) asset: String,
    pub(crate) track_type: TrackType,
    pub(crate) elements: Vec<ElementId>,
}

impl EffectSlot {
    /// Effect name.
    pub fn asset(&self) -> &str {
        &self.asset
    }

    /// Medium the effect processes.
    pub fn track_type(&self) -> TrackType {
        self.track_type
    }

    /// Elements instantiated on tracks of that medium.
    pub fn elements(&self) -> &[ElementId] {
        &self.elements
    }
}

/// Layer-level placement of an asset.
///
/// Snapshot type: read through [`crate::Timeline::clip`], edit through the
/// [`crate::Timeline`] methods.
#[derive(Clone, Debug)]
pub struct Clip {
    pub(crate) id: ClipId,
    pub(crate) layer: LayerId,
    pub(crate) kind: ClipKind,
    pub(crate) asset_id: String,
    pub(crate) asset_kind: AssetKind,
    pub(crate) start: ClockTime,
    pub(crate) duration: ClockTime,
    pub(crate) in_point: ClockTime,
    pub(crate) max_duration: Option<ClockTime>,
    pub(crate) priority: u32,
    pub(crate) explicit_priority: bool,
    pub(crate) track_types: Vec<TrackType>,
    pub(crate) sources: Vec<ElementId>,
    pub(crate) effects: Vec<EffectSlot>,
    pub(crate) pair: Option<(ClipId, ClipId)>,
}

impl Clip {
    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn kind(&self) -> ClipKind {
        self.kind
    }

    /// Id of the referenced asset (the reference actually resolved).
    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn asset_kind(&self) -> AssetKind {
        self.asset_kind
    }

    pub fn start(&self) -> ClockTime {
        self.start
    }

    pub fn duration(&self) -> ClockTime {
        self.duration
    }

    pub fn in_point(&self) -> ClockTime {
        self.in_point
    }

    /// Length of the underlying media, when bounded.
    pub fn max_duration(&self) -> Option<ClockTime> {
        self.max_duration
    }

    /// `[start, start + duration)`.
    pub fn span(&self) -> TimeSpan {
        TimeSpan {
            start: self.start,
            duration: self.duration,
        }
    }

    /// Priority inside the layer; lower is drawn on top.
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Whether the priority was set explicitly and is kept on moves.
    pub fn is_priority_pinned(&self) -> bool {
        self.explicit_priority
    }

    /// Track types this clip feeds.
    pub fn track_types(&self) -> &[TrackType] {
        &self.track_types
    }

    /// Source (or transition) elements, one per compatible track.
    pub fn source_elements(&self) -> &[ElementId] {
        &self.sources
    }

    /// Effects in insertion order.
    pub fn effects(&self) -> &[EffectSlot] {
        &self.effects
    }

    /// The two clips an auto-transition blends.
    pub fn transition_pair(&self) -> Option<(ClipId, ClipId)> {
        self.pair
    }

    /// Every element owned by this clip.
    pub fn elements(&self) -> Vec<ElementId> {
        self.sources
            .iter()
            .chain(self.effects.iter().flat_map(|e| e.elements.iter()))
            .copied()
            .collect()
    }

    pub(crate) fn involves(&self, other: ClipId) -> bool {
        self.pair.is_some_and(|(a, b)| a == other || b == other)
    }
}

/// Parameters of a clip about to be added to a layer.
#[derive(Clone, Debug)]
pub struct ClipBuilder {
    pub(crate) asset_id: String,
    pub(crate) asset_kind: AssetKind,
    pub(crate) start: ClockTime,
    pub(crate) duration: Option<ClockTime>,
    pub(crate) in_point: ClockTime,
    pub(crate) max_duration: Option<ClockTime>,
    pub(crate) priority: Option<u32>,
    pub(crate) pinned: bool,
    pub(crate) track_types: Vec<TrackType>,
}

impl ClipBuilder {
    /// Clip for a loaded source asset; duration defaults to the media length.
    ///
    /// A proxied asset is placed through its proxy.
    pub fn from_asset(asset: &Asset) -> EditResult<Self> {
        if !asset.kind().is_clip_source() {
            return Err(EditError::consistency(format!(
                "{} asset '{}' cannot back a clip",
                asset.kind(),
                asset.id()
            )));
        }
        if asset.status() != AssetStatus::Loaded {
            return Err(EditError::resolution(format!(
                "asset '{}' is {:?}, not loaded",
                asset.id(),
                asset.status()
            )));
        }
        let info = asset
            .info()
            .ok_or_else(|| EditError::resolution(format!("asset '{}' has no info", asset.id())))?;
        Ok(Self {
            asset_id: asset.proxy_target().unwrap_or_else(|| asset.target_id()),
            asset_kind: asset.kind(),
            start: ClockTime::ZERO,
            duration: info.duration(),
            in_point: ClockTime::ZERO,
            max_duration: info.duration(),
            priority: None,
            pinned: false,
            track_types: info.track_types(),
        })
    }

    /// Clip for an asset known only by id.
    pub fn new(
        asset_id: impl Into<String>,
        asset_kind: AssetKind,
        track_types: Vec<TrackType>,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            asset_kind,
            start: ClockTime::ZERO,
            duration: None,
            in_point: ClockTime::ZERO,
            max_duration: None,
            priority: None,
            pinned: false,
            track_types,
        }
    }

    pub fn start(mut self, start: ClockTime) -> Self {
        self.start = start;
        self
    }

    pub fn duration(mut self, duration: ClockTime) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn in_point(mut self, in_point: ClockTime) -> Self {
        self.in_point = in_point;
        self
    }

    /// Explicit priority; a collision with an overlapping clip is then an error
    /// instead of being resolved automatically.
    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self.pinned = true;
        self
    }

    /// Place at a saved priority, pinned or not.
    pub(crate) fn restored_priority(mut self, priority: u32, pinned: bool) -> Self {
        self.priority = Some(priority);
        self.pinned = pinned;
        self
    }

    pub(crate) fn validate(&self) -> EditResult<ClockTime> {
        if !self.asset_kind.is_clip_source() {
            return Err(EditError::consistency(format!(
                "{} asset '{}' cannot back a clip",
                self.asset_kind, self.asset_id
            )));
        }
        let duration = self.duration.ok_or_else(|| {
            EditError::validation(format!("clip of '{}' needs a duration", self.asset_id))
        })?;
        check_extent(self.in_point, duration, self.max_duration)?;
        TimeSpan::new(self.start, duration)?;
        Ok(duration)
    }
}

/// Duration must be positive and `in_point + duration` must fit the media.
pub(crate) fn check_extent(
    in_point: ClockTime,
    duration: ClockTime,
    max_duration: Option<ClockTime>,
) -> EditResult<()> {
    if duration == ClockTime::ZERO {
        return Err(EditError::validation("clip duration must be > 0"));
    }
    if let Some(max) = max_duration
        && in_point.saturating_add(duration) > max
    {
        return Err(EditError::validation(format!(
            "in-point {in_point} + duration {duration} exceeds media length {max}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/clip.rs"]
mod tests;
