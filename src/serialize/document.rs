//! Persisted project document.
//!
//! The document is the structural contract of a saved project; formatters only
//! decide its byte encoding. Auto-transitions are not stored: they are rebuilt
//! from the clip layout and the `auto_transition` flags on load.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    assets::asset::{Asset, AssetKind},
    encoding::profile::EncodingProfile,
    foundation::{
        core::ClockTime,
        error::{EditError, EditResult},
        meta::{MetaContainer, MetaValue},
    },
    timeline::{
        clip::{ClipBuilder, ClipKind},
        control::{BindingMode, ControlSource, InterpolationMode, TimedValue},
        element::{ClipId, ElementId, ElementKind, LayerId, TrackId},
        timeline::Timeline,
        track::{Track, TrackType},
    },
};

/// Version written by this crate.
pub const FORMAT_VERSION: &str = "1.0";

/// Major version this crate can read.
pub const SUPPORTED_MAJOR: u32 = 1;

fn default_true() -> bool {
    true
}

/// Root of a saved project.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProjectDoc {
    /// `major.minor`; the major must be [`SUPPORTED_MAJOR`].
    pub version: String,
    #[serde(default)]
    pub metadata: MetaContainer,
    #[serde(default)]
    pub encoding_profiles: Vec<EncodingProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_profile: Option<EncodingProfile>,
    /// Project membership.
    #[serde(default)]
    pub assets: Vec<AssetDoc>,
    pub timeline: TimelineDoc,
}

/// One member asset.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AssetDoc {
    pub id: String,
    pub kind: AssetKind,
    /// Proxy in use when the project was saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimelineDoc {
    #[serde(default)]
    pub auto_transition: bool,
    #[serde(default)]
    pub metadata: MetaContainer,
    #[serde(default)]
    pub tracks: Vec<TrackDoc>,
    #[serde(default)]
    pub layers: Vec<LayerDoc>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackDoc {
    pub medium: TrackType,
    /// Per-element state that does not follow from the clip layout.
    #[serde(default)]
    pub elements: Vec<ElementDoc>,
}

/// State of one clip-owned element.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ElementDoc {
    /// [`ClipDoc::id`] of the owner.
    pub clip: u64,
    /// `source` or `effect`.
    pub kind: ElementKind,
    /// Index into the owner's effects, for effect elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<usize>,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Own extent of a trimmed element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<TrimDoc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, MetaValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<BindingDoc>,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrimDoc {
    pub start: ClockTime,
    pub duration: ClockTime,
}

/// Keyframe curve bound to an element property.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BindingDoc {
    pub property: String,
    #[serde(default)]
    pub mode: BindingMode,
    #[serde(default)]
    pub interpolation: InterpolationMode,
    /// `(timestamp, value)` pairs in timestamp order.
    pub values: Vec<(ClockTime, f64)>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayerDoc {
    pub priority: u32,
    #[serde(default)]
    pub auto_transition: bool,
    #[serde(default)]
    pub metadata: MetaContainer,
    #[serde(default)]
    pub clips: Vec<ClipDoc>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClipDoc {
    /// Document-local id referenced by [`ElementDoc::clip`].
    pub id: u64,
    pub asset: String,
    pub kind: AssetKind,
    pub start: ClockTime,
    pub duration: ClockTime,
    #[serde(default)]
    pub in_point: ClockTime,
    pub priority: u32,
    /// Whether the priority was set explicitly.
    #[serde(default)]
    pub pinned: bool,
    /// Effect names in stacking order.
    #[serde(default)]
    pub effects: Vec<String>,
}

impl ProjectDoc {
    /// Empty document at the current version.
    pub fn new(timeline: TimelineDoc) -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            metadata: MetaContainer::new(),
            encoding_profiles: Vec::new(),
            proxy_profile: None,
            assets: Vec::new(),
            timeline,
        }
    }

    /// Structural checks run after parsing and before writing.
    pub fn validate(&self) -> EditResult<()> {
        let major = self
            .version
            .split('.')
            .next()
            .and_then(|m| m.trim().parse::<u32>().ok())
            .ok_or_else(|| {
                EditError::serialization(format!("malformed version '{}'", self.version))
            })?;
        if major != SUPPORTED_MAJOR {
            return Err(EditError::serialization(format!(
                "unsupported document version '{}' (expected {SUPPORTED_MAJOR}.x)",
                self.version
            )));
        }
        for profile in self.encoding_profiles.iter().chain(&self.proxy_profile) {
            profile
                .validate()
                .map_err(|e| EditError::serialization(format!("encoding profile: {e}")))?;
        }

        let mut layer_priorities = BTreeSet::new();
        let mut clips = BTreeMap::new();
        for layer in &self.timeline.layers {
            if !layer_priorities.insert(layer.priority) {
                return Err(EditError::serialization(format!(
                    "layer priority {} appears twice",
                    layer.priority
                )));
            }
            for clip in &layer.clips {
                if clips.insert(clip.id, clip).is_some() {
                    return Err(EditError::serialization(format!(
                        "clip id {} appears twice",
                        clip.id
                    )));
                }
                if clip.duration == ClockTime::ZERO {
                    return Err(EditError::serialization(format!(
                        "clip {} has a zero duration",
                        clip.id
                    )));
                }
            }
        }

        for track in &self.timeline.tracks {
            for el in &track.elements {
                let Some(clip) = clips.get(&el.clip) else {
                    return Err(EditError::serialization(format!(
                        "element refers to unknown clip {}",
                        el.clip
                    )));
                };
                match (el.kind, el.effect) {
                    (ElementKind::Source, None) => {}
                    (ElementKind::Effect, Some(i)) if i < clip.effects.len() => {}
                    _ => {
                        return Err(EditError::serialization(format!(
                            "bad element slot {:?}/{:?} for clip {}",
                            el.kind, el.effect, el.clip
                        )));
                    }
                }
                for binding in &el.bindings {
                    if binding.values.iter().any(|(_, v)| !v.is_finite()) {
                        return Err(EditError::serialization(format!(
                            "binding '{}' holds a non-finite value",
                            binding.property
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl TimelineDoc {
    /// Capture the structure of `timeline`.
    pub fn from_timeline(timeline: &Timeline) -> Self {
        let clips = timeline.clips();
        let layers = timeline
            .layers()
            .iter()
            .map(|layer| LayerDoc {
                priority: layer.priority(),
                auto_transition: layer.auto_transition(),
                metadata: layer.metadata().clone(),
                clips: layer
                    .clips()
                    .iter()
                    .filter_map(|id| clips.iter().find(|c| c.id() == *id))
                    .filter(|c| c.kind() == ClipKind::Source)
                    .map(|c| ClipDoc {
                        id: c.id().get(),
                        asset: c.asset_id().to_string(),
                        kind: c.asset_kind(),
                        start: c.start(),
                        duration: c.duration(),
                        in_point: c.in_point(),
                        priority: c.priority(),
                        pinned: c.is_priority_pinned(),
                        effects: c.effects().iter().map(|fx| fx.asset().to_string()).collect(),
                    })
                    .collect(),
            })
            .collect();

        let tracks = timeline
            .tracks()
            .iter()
            .map(|track| TrackDoc {
                medium: track.track_type(),
                elements: track
                    .elements()
                    .iter()
                    .filter(|el| el.kind() != ElementKind::Transition)
                    .filter_map(|el| {
                        let owner = clips.iter().find(|c| c.id() == el.owner())?;
                        let effect = owner
                            .effects()
                            .iter()
                            .position(|fx| fx.elements().contains(&el.id()));
                        Some(ElementDoc {
                            clip: owner.id().get(),
                            kind: el.kind(),
                            effect,
                            active: el.is_active(),
                            trim: (!el.is_locked()).then_some(TrimDoc {
                                start: el.start(),
                                duration: el.duration(),
                            }),
                            properties: el.child_properties().clone(),
                            bindings: el
                                .control_bindings()
                                .map(|b| BindingDoc {
                                    property: b.property().to_string(),
                                    mode: b.mode(),
                                    interpolation: b.source().mode(),
                                    values: b
                                        .source()
                                        .values()
                                        .iter()
                                        .map(|v| (v.timestamp, v.value))
                                        .collect(),
                                })
                                .collect(),
                        })
                    })
                    .filter(ElementDoc::carries_state)
                    .collect(),
            })
            .collect();

        Self {
            auto_transition: timeline.auto_transition(),
            metadata: timeline.metadata(),
            tracks,
            layers,
        }
    }

    /// Tracks, layers, flags and metadata; clips are added as their assets load.
    ///
    /// Returns the created track ids (document order) and the layer id per
    /// document layer priority.
    pub(crate) fn apply_skeleton(
        &self,
        timeline: &Timeline,
    ) -> EditResult<(Vec<TrackId>, BTreeMap<u32, LayerId>)> {
        timeline.set_auto_transition(self.auto_transition)?;
        for (key, value) in self.metadata.iter() {
            timeline.set_meta(key, value.clone())?;
        }
        let mut tracks = Vec::with_capacity(self.tracks.len());
        for track in &self.tracks {
            tracks.push(timeline.add_track(Track::new(track.medium))?);
        }
        let mut ordered: Vec<&LayerDoc> = self.layers.iter().collect();
        ordered.sort_by_key(|l| l.priority);
        let mut layers = BTreeMap::new();
        for doc in ordered {
            let id = timeline.insert_layer(doc.priority)?;
            timeline.set_layer_auto_transition(id, doc.auto_transition)?;
            for (key, value) in doc.metadata.iter() {
                timeline.set_layer_meta(id, key, value.clone())?;
            }
            layers.insert(doc.priority, id);
        }
        Ok((tracks, layers))
    }

    /// Element docs of the clip saved as `clip`, with their track position.
    pub(crate) fn elements_of(&self, clip: u64) -> Vec<(usize, &ElementDoc)> {
        self.tracks
            .iter()
            .enumerate()
            .flat_map(|(ti, t)| t.elements.iter().map(move |el| (ti, el)))
            .filter(|(_, el)| el.clip == clip)
            .collect()
    }
}

impl ElementDoc {
    fn carries_state(&self) -> bool {
        !self.active
            || self.trim.is_some()
            || !self.properties.is_empty()
            || !self.bindings.is_empty()
    }
}

impl ClipDoc {
    /// Builder placing this clip for a loaded `asset`.
    pub(crate) fn builder(&self, asset: &Asset) -> EditResult<ClipBuilder> {
        Ok(ClipBuilder::from_asset(asset)?
            .start(self.start)
            .duration(self.duration)
            .in_point(self.in_point)
            .restored_priority(self.priority, self.pinned))
    }
}

/// Re-add effects and per-element state of a restored clip.
pub(crate) fn restore_clip_state(
    timeline: &Timeline,
    clip: ClipId,
    doc: &ClipDoc,
    elements: &[(usize, &ElementDoc)],
    tracks: &[TrackId],
) -> EditResult<()> {
    for effect in &doc.effects {
        timeline.add_effect(clip, effect)?;
    }
    let Some(restored) = timeline.clip(clip) else {
        return Err(EditError::consistency(format!("{clip} vanished while restoring")));
    };
    for (ti, el_doc) in elements {
        let Some(track) = tracks.get(*ti) else {
            continue;
        };
        let candidates: Vec<ElementId> = match el_doc.effect {
            None => restored.source_elements().to_vec(),
            Some(i) => restored
                .effects()
                .get(i)
                .map(|fx| fx.elements().to_vec())
                .unwrap_or_default(),
        };
        let Some(el) = candidates
            .into_iter()
            .find(|e| timeline.element_track(*e) == Some(*track))
        else {
            tracing::warn!(clip = doc.id, track = ti, "saved element has no counterpart");
            continue;
        };
        for (name, value) in &el_doc.properties {
            timeline.set_child_property(el, name, value.clone())?;
        }
        for binding in &el_doc.bindings {
            let source = ControlSource::with_mode(binding.interpolation);
            let values: Vec<TimedValue> = binding
                .values
                .iter()
                .map(|(timestamp, value)| TimedValue {
                    timestamp: *timestamp,
                    value: *value,
                })
                .collect();
            source.set_from_list(&values)?;
            timeline.set_control_source(el, &source, &binding.property, binding.mode.as_str())?;
        }
        if let Some(trim) = el_doc.trim {
            timeline.trim_element(el, trim.start, trim.duration)?;
        }
        if !el_doc.active {
            timeline.set_element_active(el, false)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/serialize/document.rs"]
mod tests;
